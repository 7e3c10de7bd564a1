use std::sync::OnceLock;

use serde::Serialize;

/// Title kind as spelled in the `titleType` column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TitleKind {
    Movie,
    Other(String),
}

impl TitleKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "movie" => TitleKind::Movie,
            other => TitleKind::Other(other.to_string()),
        }
    }

    pub fn is_movie(&self) -> bool {
        matches!(self, TitleKind::Movie)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TitleRecord {
    pub id: String,
    pub kind: TitleKind,
    pub primary_title: String,
    pub original_title: String,
    pub start_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RatingRecord {
    pub id: String,
    pub average_rating: f64,
    pub num_votes: u64,
}

/// One row of the alternate-titles file. Only lives for the duration of the
/// scan that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct AlternateTitleRecord {
    pub id: String,
    pub ordering: u32,
    pub region: Option<String>,
    pub language: Option<String>,
    pub is_original_title: bool,
}

/// A title joined with its rating.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub id: String,
    pub primary_title: String,
    pub original_title: String,
    pub start_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub average_rating: f64,
    pub num_votes: u64,
    language: OnceLock<String>,
}

impl CatalogEntry {
    pub fn new(title: TitleRecord, rating: &RatingRecord) -> Self {
        Self {
            id: title.id,
            primary_title: title.primary_title,
            original_title: title.original_title,
            start_year: title.start_year,
            runtime_minutes: title.runtime_minutes,
            genres: title.genres,
            average_rating: rating.average_rating,
            num_votes: rating.num_votes,
            language: OnceLock::new(),
        }
    }

    /// Language resolved so far, if any lookup has populated it.
    pub fn language(&self) -> Option<&str> {
        self.language.get().map(String::as_str)
    }

    /// Returns the cached language, resolving it with `resolve` on first use.
    pub fn language_or_resolve(&self, resolve: impl FnOnce(&str) -> String) -> &str {
        self.language.get_or_init(|| resolve(&self.id))
    }

    /// Case-insensitive membership, folded the same way as title search.
    pub fn has_genre(&self, genre: &str) -> bool {
        let wanted = genre.to_lowercase();
        self.genres.iter().any(|g| g.to_lowercase() == wanted)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: String,
    pub title: String,
    pub original_title: String,
    pub year: Option<i32>,
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub average_rating: f64,
    pub num_votes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MovieSummary {
    pub fn from_entry(entry: &CatalogEntry, language: Option<String>) -> Self {
        Self {
            id: entry.id.clone(),
            title: entry.primary_title.clone(),
            original_title: entry.original_title.clone(),
            year: entry.start_year,
            runtime: entry.runtime_minutes,
            genres: entry.genres.clone(),
            average_rating: entry.average_rating,
            num_votes: entry.num_votes,
            language,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct GenreCount {
    pub name: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LanguageCount {
    pub code: String,
    pub count: usize,
}
