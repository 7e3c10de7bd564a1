use std::cmp::Ordering;

use crate::models::CatalogEntry;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortKey {
    Rating,
    Votes,
}

impl SortKey {
    fn compare_desc(self, a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
        match self {
            SortKey::Rating => b.average_rating.total_cmp(&a.average_rating),
            SortKey::Votes => b.num_votes.cmp(&a.num_votes),
        }
    }
}

/// Rating first, then votes.
pub const RATING_THEN_VOTES: &[SortKey] = &[SortKey::Rating, SortKey::Votes];

/// Stable descending sort on `keys`, truncated to `limit`. A non-positive
/// limit yields nothing.
pub fn rank_and_limit<'a>(
    mut entries: Vec<&'a CatalogEntry>,
    keys: &[SortKey],
    limit: i64,
) -> Vec<&'a CatalogEntry> {
    let Ok(limit) = usize::try_from(limit) else {
        return Vec::new();
    };
    if limit == 0 {
        return Vec::new();
    }
    entries.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |ord, key| ord.then_with(|| key.compare_desc(a, b)))
    });
    entries.truncate(limit);
    entries
}

/// Vote count at `percentile` (0.0..=1.0), interpolating linearly between the
/// two nearest ranks. `None` for an empty catalog.
pub fn vote_percentile<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>, percentile: f64) -> Option<f64> {
    let mut votes: Vec<u64> = entries.into_iter().map(|e| e.num_votes).collect();
    if votes.is_empty() {
        return None;
    }
    votes.sort_unstable();

    let rank = percentile.clamp(0.0, 1.0) * (votes.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let low = votes[lower] as f64;
    let high = votes[upper] as f64;
    Some(low + (high - low) * (rank - lower as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RatingRecord, TitleKind, TitleRecord};

    fn entry(id: &str, rating: f64, votes: u64) -> CatalogEntry {
        let title = TitleRecord {
            id: id.to_string(),
            kind: TitleKind::Movie,
            primary_title: id.to_string(),
            original_title: id.to_string(),
            start_year: None,
            runtime_minutes: None,
            genres: vec![],
        };
        CatalogEntry::new(title, &RatingRecord { id: id.to_string(), average_rating: rating, num_votes: votes })
    }

    fn ids(entries: &[&CatalogEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn sorts_by_rating_then_votes_and_keeps_ties_stable() {
        let catalog = vec![
            entry("a", 7.0, 100),
            entry("b", 9.0, 10),
            entry("c", 7.0, 500),
            entry("d", 7.0, 100),
            entry("e", 9.0, 10),
        ];
        let ranked = rank_and_limit(catalog.iter().collect(), RATING_THEN_VOTES, 10);
        assert_eq!(ids(&ranked), vec!["b", "e", "c", "a", "d"]);

        for pair in ranked.windows(2) {
            assert!(
                (pair[0].average_rating, pair[0].num_votes) >= (pair[1].average_rating, pair[1].num_votes)
            );
        }
    }

    #[test]
    fn limit_truncates() {
        let catalog: Vec<_> = (0..5).map(|i| entry(&format!("t{i}"), 5.0, i)).collect();
        assert_eq!(rank_and_limit(catalog.iter().collect(), &[SortKey::Votes], 3).len(), 3);
        assert_eq!(rank_and_limit(catalog.iter().collect(), &[SortKey::Votes], 50).len(), 5);
        assert!(rank_and_limit(catalog.iter().collect(), &[SortKey::Votes], 0).is_empty());
        assert!(rank_and_limit(catalog.iter().collect(), &[SortKey::Votes], -4).is_empty());
    }

    #[test]
    fn percentile_interpolates() {
        let catalog: Vec<_> = [10, 20, 30, 40, 50].iter().map(|v| entry("x", 5.0, *v)).collect();
        let p80 = vote_percentile(&catalog, 0.8).unwrap();
        assert!((p80 - 42.0).abs() < 1e-9);
        assert_eq!(vote_percentile(&catalog, 1.0), Some(50.0));
        assert_eq!(vote_percentile(&catalog, 0.0), Some(10.0));
        assert_eq!(vote_percentile(&[] as &[CatalogEntry], 0.8), None);
    }
}
