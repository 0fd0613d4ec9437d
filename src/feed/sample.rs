use rand::{seq::index, Rng};

use super::FeedTable;

/// Up to `n` distinct rows chosen uniformly at random, kept in feed order.
///
/// A table with `n` rows or fewer comes back whole.
pub fn sample(table: &FeedTable, n: usize) -> FeedTable {
    sample_with_rng(table, n, &mut rand::thread_rng())
}

pub fn sample_with_rng<R: Rng + ?Sized>(table: &FeedTable, n: usize, rng: &mut R) -> FeedTable {
    let total = table.row_count();
    if n >= total {
        return table.clone();
    }
    let mut picked = index::sample(rng, total, n).into_vec();
    picked.sort_unstable();
    table.select_rows(&picked)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn table(rows: usize) -> FeedTable {
        FeedTable::new(
            vec!["id".into(), "title".into()],
            (0..rows).map(|i| vec![i.to_string(), format!("item {i}")]).collect(),
        )
    }

    #[test]
    fn picks_n_distinct_rows_from_the_source() {
        let source = table(10);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let s = sample_with_rng(&source, 3, &mut rng);
            assert_eq!(s.row_count(), 3);
            assert_eq!(s.columns(), source.columns());

            let ids: Vec<usize> = (0..3)
                .map(|r| s.get(r, "id").unwrap().parse().unwrap())
                .collect();
            assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
            assert!(ids.windows(2).all(|w| w[0] < w[1]), "feed order kept: {ids:?}");
            assert!(s.rows().iter().all(|row| source.rows().contains(row)));
        }
    }

    #[test]
    fn small_tables_come_back_whole() {
        let source = table(2);
        assert_eq!(sample(&source, 3), source);
        assert_eq!(sample(&source, 2), source);
    }

    #[test]
    fn zero_sample_is_empty() {
        let s = sample(&table(5), 0);
        assert!(s.is_empty());
        assert_eq!(s.columns().len(), 2);
    }

    #[test]
    fn sampling_reaches_every_row() {
        let source = table(6);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let s = sample_with_rng(&source, 2, &mut rng);
            seen.extend(s.rows().iter().map(|r| r[0].clone()));
        }
        assert_eq!(seen.len(), 6);
    }
}
