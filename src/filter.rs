use std::str::FromStr;

use serde::Deserialize;

use crate::{language::LanguageResolver, models::CatalogEntry};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub enum GenreMatch {
    /// Every requested genre must be present.
    #[default]
    All,
    /// At least one requested genre must be present.
    Any,
}

impl FromStr for GenreMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else if s.eq_ignore_ascii_case("any") {
            Ok(Self::Any)
        } else {
            Err(format!("unknown genre match `{s}`, expected all or any"))
        }
    }
}

impl TryFrom<String> for GenreMatch {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Optional predicates over a catalog entry. Unset fields do not constrain.
///
/// Bounds are inclusive. An entry without a year or runtime fails any bound
/// on that field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterConfig {
    pub genres: Option<Vec<String>>,
    pub genre_match: GenreMatch,
    pub min_rating: Option<f64>,
    pub min_votes: Option<u64>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub min_runtime: Option<u32>,
    pub max_runtime: Option<u32>,
    pub language: Option<String>,
}

impl FilterConfig {
    /// True when no entry can ever satisfy the bounds, e.g. `min_year > max_year`.
    pub fn is_contradictory(&self) -> bool {
        let inverted = |lo: Option<i64>, hi: Option<i64>| matches!((lo, hi), (Some(lo), Some(hi)) if lo > hi);
        inverted(self.min_year.map(i64::from), self.max_year.map(i64::from))
            || inverted(self.min_runtime.map(i64::from), self.max_runtime.map(i64::from))
            || self.min_rating.is_some_and(|r| r.is_nan() || r > 10.0)
    }

    /// Evaluates every predicate except language.
    pub fn matches_fields(&self, entry: &CatalogEntry) -> bool {
        if let Some(min) = self.min_rating {
            if entry.average_rating < min {
                return false;
            }
        }
        if let Some(min) = self.min_votes {
            if entry.num_votes < min {
                return false;
            }
        }
        if !in_range(entry.start_year, self.min_year, self.max_year) {
            return false;
        }
        if !in_range(entry.runtime_minutes, self.min_runtime, self.max_runtime) {
            return false;
        }
        match &self.genres {
            Some(genres) if !genres.is_empty() => genre_matches(entry, genres, self.genre_match),
            _ => true,
        }
    }

    /// Full predicate. The language check goes last since it is the only one
    /// that may consult the resolver.
    pub fn matches(&self, entry: &CatalogEntry, resolver: &LanguageResolver) -> bool {
        if !self.matches_fields(entry) {
            return false;
        }
        match &self.language {
            Some(code) => language_matches(entry, code, resolver),
            None => true,
        }
    }
}

fn in_range<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m)
}

/// Case-insensitive genre membership.
pub fn genre_matches(entry: &CatalogEntry, genres: &[String], mode: GenreMatch) -> bool {
    match mode {
        GenreMatch::All => genres.iter().all(|g| entry.has_genre(g)),
        GenreMatch::Any => genres.iter().any(|g| entry.has_genre(g)),
    }
}

/// Exact comparison against the resolved code.
pub fn language_matches(entry: &CatalogEntry, code: &str, resolver: &LanguageResolver) -> bool {
    entry.language_or_resolve(|id| resolver.resolve(id).to_string()) == code
}
