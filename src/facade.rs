use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{info, warn};

use crate::{
    catalog::{Catalog, Snapshot, SnapshotStats},
    filter::{FilterConfig, GenreMatch, genre_matches, language_matches},
    language::{IndexStats, UNKNOWN_LANGUAGE},
    models::{CatalogEntry, GenreCount, LanguageCount, MovieSummary},
    ranking::{RATING_THEN_VOTES, SortKey, rank_and_limit, vote_percentile},
};

/// Share of the catalog, by vote count, that a title must reach to be
/// considered for the top-rated list.
pub const TOP_RATED_VOTE_PERCENTILE: f64 = 0.8;

/// Read-only queries over the current catalog snapshot.
///
/// Every call pins one snapshot for its whole duration, so a concurrent
/// reload never changes the data mid-query.
#[derive(Clone)]
pub struct QueryFacade {
    catalog: Arc<Catalog>,
}

impl QueryFacade {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Highest rated titles among those at or above the vote-count percentile.
    pub fn top_rated(&self, limit: i64) -> Vec<MovieSummary> {
        let snap = self.catalog.snapshot();
        let Some(threshold) = vote_percentile(snap.entries(), TOP_RATED_VOTE_PERCENTILE) else {
            return Vec::new();
        };
        let candidates = snap.entries().iter().filter(|e| e.num_votes as f64 >= threshold).collect();
        let out = summarize(&snap, rank_and_limit(candidates, RATING_THEN_VOTES, limit));
        info!(limit, vote_threshold = threshold, results = out.len(), "top rated");
        out
    }

    pub fn most_popular(&self, limit: i64, min_year: Option<i32>) -> Vec<MovieSummary> {
        let snap = self.catalog.snapshot();
        let filter = FilterConfig { min_year, ..Default::default() };
        let candidates = snap.entries().iter().filter(|e| filter.matches_fields(e)).collect();
        let out = summarize(&snap, rank_and_limit(candidates, &[SortKey::Votes], limit));
        info!(limit, min_year = ?min_year, results = out.len(), "most popular");
        out
    }

    /// Case-insensitive substring search over both titles and, when
    /// `match_genre` is set, the genre list.
    pub fn search(&self, query: &str, limit: i64, match_genre: bool) -> Vec<MovieSummary> {
        let snap = self.catalog.snapshot();
        let needle = query.trim().to_lowercase();
        let candidates = snap
            .entries()
            .iter()
            .filter(|e| {
                e.primary_title.to_lowercase().contains(&needle)
                    || e.original_title.to_lowercase().contains(&needle)
                    || (match_genre && e.genres.join(",").to_lowercase().contains(&needle))
            })
            .collect();
        let out = summarize(&snap, rank_and_limit(candidates, &[SortKey::Votes], limit));
        info!(query = %query, limit, match_genre, results = out.len(), "search");
        out
    }

    pub fn by_language(&self, code: &str, limit: i64) -> Vec<MovieSummary> {
        let snap = self.catalog.snapshot();
        let resolver = snap.languages();
        let candidates = snap.entries().iter().filter(|e| language_matches(e, code, resolver)).collect();
        let out = summarize(&snap, rank_and_limit(candidates, &[SortKey::Votes], limit));
        info!(language = %code, limit, results = out.len(), "by language");
        out
    }

    pub fn by_genres(&self, genres: &[String], match_all: bool, limit: i64) -> Vec<MovieSummary> {
        let snap = self.catalog.snapshot();
        let mode = if match_all { GenreMatch::All } else { GenreMatch::Any };
        let candidates = snap.entries().iter().filter(|e| genre_matches(e, genres, mode)).collect();
        let out = summarize(&snap, rank_and_limit(candidates, &[SortKey::Votes], limit));
        info!(genres = ?genres, match_all, limit, results = out.len(), "by genres");
        out
    }

    /// Full predicate composition, ranked by rating then votes.
    pub fn with_filters(&self, config: &FilterConfig, limit: i64) -> Vec<MovieSummary> {
        if config.is_contradictory() {
            warn!(filters = ?config, "filter bounds can never be satisfied");
            return Vec::new();
        }
        let snap = self.catalog.snapshot();
        let resolver = snap.languages();
        let candidates = snap.entries().iter().filter(|e| config.matches(e, resolver)).collect();
        let out = summarize(&snap, rank_and_limit(candidates, RATING_THEN_VOTES, limit));
        info!(filters = ?config, limit, results = out.len(), "with filters");
        out
    }

    /// Genre occurrence counts over the catalog, most common first.
    pub fn available_genres(&self) -> Vec<GenreCount> {
        let snap = self.catalog.snapshot();
        let counts = count_in_order(snap.entries().iter().flat_map(|e| e.genres.iter().map(String::as_str)));
        counts.into_iter().map(|(name, count)| GenreCount { name, count }).collect()
    }

    /// Resolved-language counts over the catalog, most common first. Titles
    /// with no known language are left out.
    pub fn available_languages(&self) -> Vec<LanguageCount> {
        let snap = self.catalog.snapshot();
        let index = snap.languages().index();
        let counts = count_in_order(
            snap.entries().iter().map(|e| index.resolve(&e.id)).filter(|code| *code != UNKNOWN_LANGUAGE),
        );
        counts.into_iter().map(|(code, count)| LanguageCount { code, count }).collect()
    }

    /// Half most popular, half top rated, without repeats.
    pub fn collect(&self, num_movies: i64) -> Vec<MovieSummary> {
        let half = num_movies / 2;
        let mut seen = HashSet::new();
        let out: Vec<MovieSummary> = self
            .most_popular(half, None)
            .into_iter()
            .chain(self.top_rated(half))
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        info!(requested = num_movies, collected = out.len(), "collected movies");
        out
    }

    pub fn stats(&self) -> SnapshotStats {
        self.catalog.snapshot().stats().clone()
    }

    /// Language index statistics, or `None` until the index has been built.
    pub fn language_stats(&self) -> Option<IndexStats> {
        self.catalog.snapshot().languages().ready().map(|index| index.stats().clone())
    }
}

/// Converts ranked entries to summaries. The language is only reported when
/// it is already known, so plain queries never trigger the language scan.
fn summarize(snap: &Snapshot, entries: Vec<&CatalogEntry>) -> Vec<MovieSummary> {
    let index = snap.languages().ready();
    entries
        .into_iter()
        .map(|e| {
            let language = e
                .language()
                .or_else(|| index.map(|i| i.resolve(&e.id)))
                .map(str::to_string);
            MovieSummary::from_entry(e, language)
        })
        .collect()
}

/// Occurrence counts sorted by count descending, ties in first-seen order.
fn count_in_order<'a>(items: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        match slots.get(item) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(item, counts.len());
                counts.push((item.to_string(), 1));
            },
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
