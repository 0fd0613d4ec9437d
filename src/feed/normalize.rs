use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    /// Header spellings seen in merchant exports, keyed by their normalized form.
    static ref ALIASES: HashMap<&'static str, &'static str> = {
        let table: &[(&str, &[&str])] = &[
            ("title", &["name", "product_name", "product_title", "item_name", "item_title"]),
            ("description", &["desc", "product_description", "item_description", "long_description"]),
            ("price", &["cost", "regular_price", "product_price", "list_price"]),
            ("sale_price", &["discount_price", "special_price", "offer_price"]),
            ("availability", &["stock", "stock_status", "in_stock", "inventory_status"]),
            ("google_product_category", &["category", "google_category", "product_category", "gpc"]),
            ("product_type", &["type", "product_category_path"]),
            ("custom_label", &["label", "custom_labels"]),
            ("additional_image_link", &["additional_images", "additional_image", "extra_images", "more_images"]),
            ("image_link", &["image", "image_url", "main_image", "picture"]),
            ("link", &["url", "product_url", "product_link", "landing_page"]),
            ("condition", &["item_condition", "product_condition"]),
            ("id", &["sku", "product_id", "item_id", "offer_id"]),
            ("gtin", &["ean", "upc", "barcode", "isbn", "jan"]),
            ("brand", &["manufacturer", "vendor", "make"]),
            ("mpn", &["manufacturer_part_number", "part_number"]),
        ];
        table
            .iter()
            .flat_map(|(canonical, aliases)| aliases.iter().map(move |a| (*a, *canonical)))
            .collect()
    };
}

/// Lowercase, trim, and join the words of a header with single underscores.
///
/// Spaces and underscores are interchangeable: `" Product  Name "`,
/// `"product__name"` and `"PRODUCT_NAME"` all become `"product_name"`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Normalize a header and map known aliases onto their canonical field name.
/// Unknown headers pass through in normalized form.
pub fn canonical_header(raw: &str) -> String {
    let normalized = normalize_header(raw);
    match ALIASES.get(normalized.as_str()) {
        Some(canonical) => canonical.to_string(),
        None => normalized,
    }
}

pub fn canonical_headers<I, S>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    headers.into_iter().map(|h| canonical_header(h.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_space_and_underscores() {
        assert_eq!(normalize_header(" Product  Name "), "product_name");
        assert_eq!(normalize_header("product__name"), "product_name");
        assert_eq!(normalize_header("_Google Product_Category_"), "google_product_category");
        assert_eq!(normalize_header("\u{feff}ID"), "id");
        assert_eq!(normalize_header("   "), "");
    }

    #[test]
    fn maps_aliases_to_canonical_fields() {
        assert_eq!(
            canonical_headers(["Name", "Desc", "Price"]),
            vec!["title", "description", "price"]
        );
        assert_eq!(canonical_header("Product Name"), "title");
        assert_eq!(canonical_header("CATEGORY"), "google_product_category");
        assert_eq!(canonical_header("Image URL"), "image_link");
        assert_eq!(canonical_header("EAN"), "gtin");
        assert_eq!(canonical_header("SKU"), "id");
    }

    #[test]
    fn unknown_headers_pass_through_normalized() {
        assert_eq!(canonical_header("Shipping Weight"), "shipping_weight");
        assert_eq!(canonical_header("custom_label_0"), "custom_label_0");
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = [
            "Name", " DESC", "Price ", "google product category", "Custom Label 0",
            "Additional Images", "link", "Weird__Header  X", "id",
        ];
        let once = canonical_headers(raw);
        let twice = canonical_headers(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn no_canonical_name_is_itself_an_alias() {
        for canonical in ALIASES.values() {
            assert!(
                !ALIASES.contains_key(canonical),
                "{canonical} would be remapped on a second pass"
            );
        }
    }
}
