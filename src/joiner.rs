use std::collections::HashMap;

use tracing::debug;

use crate::models::{CatalogEntry, RatingRecord, TitleRecord};

/// Inner join of titles and ratings on identifier.
///
/// Output follows title order; titles without a rating and ratings without a
/// title are dropped.
pub fn join(titles: Vec<TitleRecord>, ratings: &[RatingRecord]) -> Vec<CatalogEntry> {
    let by_id: HashMap<&str, &RatingRecord> = ratings.iter().map(|r| (r.id.as_str(), r)).collect();

    let title_count = titles.len();
    let entries: Vec<CatalogEntry> = titles
        .into_iter()
        .filter_map(|title| {
            let rating = *by_id.get(title.id.as_str())?;
            Some(CatalogEntry::new(title, rating))
        })
        .collect();

    debug!(titles = title_count, ratings = ratings.len(), joined = entries.len(), "joined catalog");
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TitleKind;

    fn title(id: &str) -> TitleRecord {
        TitleRecord {
            id: id.to_string(),
            kind: TitleKind::Movie,
            primary_title: format!("Title {id}"),
            original_title: format!("Title {id}"),
            start_year: Some(2000),
            runtime_minutes: Some(90),
            genres: vec!["Drama".to_string()],
        }
    }

    fn rating(id: &str, votes: u64) -> RatingRecord {
        RatingRecord { id: id.to_string(), average_rating: 7.0, num_votes: votes }
    }

    #[test]
    fn only_identifiers_on_both_sides_survive() {
        let titles = vec![title("tt3"), title("tt1"), title("tt2")];
        let ratings = vec![rating("tt1", 10), rating("tt3", 30), rating("tt9", 90)];

        let entries = join(titles, &ratings);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();

        assert_eq!(ids, vec!["tt3", "tt1"]);
        assert_eq!(entries[0].num_votes, 30);
        assert_eq!(entries[1].num_votes, 10);
    }

    #[test]
    fn empty_sides_yield_empty_catalog() {
        assert!(join(vec![], &[rating("tt1", 1)]).is_empty());
        assert!(join(vec![title("tt1")], &[]).is_empty());
    }
}
