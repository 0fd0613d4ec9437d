use std::fmt;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 8;

/// One criterion of the password strength policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRequirement {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
}

impl fmt::Display for PasswordRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordRequirement::MinLength => {
                write!(f, "must be at least {MIN_PASSWORD_LEN} characters long")
            }
            PasswordRequirement::Uppercase => f.write_str("must contain an uppercase letter"),
            PasswordRequirement::Lowercase => f.write_str("must contain a lowercase letter"),
            PasswordRequirement::Digit => f.write_str("must contain a digit"),
        }
    }
}

/// Criteria a rejected password failed, in policy order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordIssues(pub Vec<PasswordRequirement>);

impl fmt::Display for PasswordIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "password {issue}")?;
        }
        Ok(())
    }
}

pub fn check_strength(plain: &str) -> Result<(), PasswordIssues> {
    let mut issues = Vec::new();
    if plain.chars().count() < MIN_PASSWORD_LEN {
        issues.push(PasswordRequirement::MinLength);
    }
    if !plain.chars().any(char::is_uppercase) {
        issues.push(PasswordRequirement::Uppercase);
    }
    if !plain.chars().any(char::is_lowercase) {
        issues.push(PasswordRequirement::Lowercase);
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        issues.push(PasswordRequirement::Digit);
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(PasswordIssues(issues))
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Check `plain` against a stored digest.
///
/// New records are Argon2id PHC strings. Records written by earlier
/// deployments carry bcrypt (`$2a$`/`$2b$`/`$2y$`) or unsalted SHA-256 hex
/// digests and still verify. Anything else is an error.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    match DigestKind::of(hash) {
        DigestKind::Argon2 => {
            let parsed = PasswordHash::new(hash).map_err(|e| {
                error!(error = %e, "argon2 parse hash error");
                anyhow::anyhow!(e.to_string())
            })?;
            Ok(Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok())
        }
        DigestKind::Bcrypt => bcrypt::verify(plain, hash).map_err(|e| {
            error!(error = %e, "bcrypt parse hash error");
            anyhow::anyhow!(e)
        }),
        DigestKind::Sha256Hex => {
            let computed = hex::encode(Sha256::digest(plain.as_bytes()));
            Ok(computed.eq_ignore_ascii_case(hash))
        }
        DigestKind::Unknown => anyhow::bail!("unrecognised password digest format"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestKind {
    Argon2,
    Bcrypt,
    Sha256Hex,
    Unknown,
}

impl DigestKind {
    fn of(hash: &str) -> Self {
        if hash.starts_with("$argon2") {
            DigestKind::Argon2
        } else if ["$2a$", "$2b$", "$2y$"].iter().any(|p| hash.starts_with(p)) {
            DigestKind::Bcrypt
        } else if hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            DigestKind::Sha256Hex
        } else {
            DigestKind::Unknown
        }
    }
}

/// True for bcrypt or SHA-256 hex digests written by earlier deployments.
pub fn is_legacy_digest(hash: &str) -> bool {
    matches!(DigestKind::of(hash), DigestKind::Bcrypt | DigestKind::Sha256Hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "Correct-horse-battery-staple1";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("correct-horse-battery-staple1", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("Passw0rd").unwrap();
        let b = hash_password("Passw0rd").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn strong_password_passes() {
        assert!(check_strength("Passw0rd").is_ok());
        assert!(check_strength("Other1x!").is_ok());
    }

    #[test]
    fn each_missing_criterion_is_named() {
        let cases = [
            ("Passw0r", PasswordRequirement::MinLength),
            ("passw0rd", PasswordRequirement::Uppercase),
            ("PASSW0RD", PasswordRequirement::Lowercase),
            ("Password", PasswordRequirement::Digit),
        ];
        for (password, missing) in cases {
            let issues = check_strength(password).unwrap_err();
            assert_eq!(issues.0, vec![missing], "password {password:?}");
        }
    }

    #[test]
    fn issues_render_every_failure() {
        let issues = check_strength("abc").unwrap_err();
        assert_eq!(
            issues.0,
            vec![
                PasswordRequirement::MinLength,
                PasswordRequirement::Uppercase,
                PasswordRequirement::Digit
            ]
        );
        let text = issues.to_string();
        assert!(text.contains("at least 8 characters"));
        assert!(text.contains("uppercase"));
        assert!(text.contains("digit"));
        assert!(!text.contains("lowercase"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 8 chars, more than 8 bytes
        assert!(check_strength("Äbcdéf1ü").is_ok());
    }

    // sha256("Passw0rd"), as stored by the spreadsheet deployment
    const SHA256_PASSW0RD: &str = "ab38eadaeb746599f2c1ee90f8267f31f467347462764a24d71ac1843ee77fe3";

    #[test]
    fn sha256_hex_digest_verifies() {
        assert!(verify_password("Passw0rd", SHA256_PASSW0RD).unwrap());
        assert!(verify_password("Passw0rd", &SHA256_PASSW0RD.to_uppercase()).unwrap());
        assert!(!verify_password("passw0rd", SHA256_PASSW0RD).unwrap());
        assert!(is_legacy_digest(SHA256_PASSW0RD));
    }

    #[test]
    fn bcrypt_digest_verifies() {
        let hash = bcrypt::hash("Passw0rd", 4).unwrap();
        assert!(hash.starts_with("$2b$"));
        assert!(verify_password("Passw0rd", &hash).unwrap());
        assert!(!verify_password("Wr0ngpass", &hash).unwrap());
        assert!(is_legacy_digest(&hash));
    }

    #[test]
    fn digest_kind_detection() {
        let argon = hash_password("Passw0rd").unwrap();
        assert_eq!(DigestKind::of(&argon), DigestKind::Argon2);
        assert!(!is_legacy_digest(&argon));
        assert_eq!(DigestKind::of("$2y$04$abc"), DigestKind::Bcrypt);
        assert_eq!(DigestKind::of(&"g".repeat(64)), DigestKind::Unknown);
        assert_eq!(DigestKind::of("plaintext"), DigestKind::Unknown);
        assert!(verify_password("x", "plaintext").is_err());
    }
}
