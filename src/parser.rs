//! Row-level parsing of the tab-separated dataset files.
//!
//! Every file starts with a header row. A [`RowParser`] binds the columns a
//! record type needs to their positions in that header, so extra or reordered
//! columns are tolerated, then turns each following line into a typed record.

use std::{marker::PhantomData, str::FromStr};

use crate::{
    error::{CatalogError, Result},
    models::{AlternateTitleRecord, RatingRecord, TitleKind, TitleRecord},
};

/// Token the datasets use for a missing value.
pub const NULL_SENTINEL: &str = "\\N";

/// Separator inside multi-value columns such as `genres`.
pub const LIST_DELIMITER: char = ',';

const FIELD_DELIMITER: char = '\t';

/// A record type that can be built from one dataset row.
pub trait FromRow: Sized {
    /// Columns the record reads, by header name.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> Result<Self>;
}

/// A split line with its columns resolved against a bound header.
pub struct Row<'a> {
    line: u64,
    fields: Vec<&'a str>,
    columns: &'static [&'static str],
    positions: &'a [usize],
}

impl<'a> Row<'a> {
    pub fn line(&self) -> u64 {
        self.line
    }

    fn raw(&self, column: &str) -> Result<&'a str> {
        let slot = self
            .columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| CatalogError::malformed(self.line, format!("unknown column {column}")))?;
        self.fields.get(self.positions[slot]).copied().ok_or_else(|| {
            CatalogError::malformed(
                self.line,
                format!("expected column {column}, row has {} fields", self.fields.len()),
            )
        })
    }

    /// Required text; the null sentinel reads as an empty string.
    pub fn text(&self, column: &str) -> Result<String> {
        let raw = self.raw(column)?;
        Ok(if raw == NULL_SENTINEL { String::new() } else { raw.to_string() })
    }

    /// Required non-empty text, used for identifiers.
    pub fn key(&self, column: &str) -> Result<String> {
        let raw = self.raw(column)?;
        if raw.is_empty() || raw == NULL_SENTINEL {
            return Err(CatalogError::malformed(self.line, format!("empty {column}")));
        }
        Ok(raw.to_string())
    }

    /// Optional text: the null sentinel and the empty string are both absent.
    pub fn optional_text(&self, column: &str) -> Result<Option<String>> {
        let raw = self.raw(column)?;
        Ok((!raw.is_empty() && raw != NULL_SENTINEL).then(|| raw.to_string()))
    }

    /// Required number; a value that fails to parse fails the row.
    pub fn number<T: FromStr>(&self, column: &str) -> Result<T> {
        let raw = self.raw(column)?;
        raw.trim()
            .parse()
            .map_err(|_| CatalogError::malformed(self.line, format!("invalid {column}: {raw:?}")))
    }

    /// Optional number. Absent for the null sentinel, and also for values that
    /// do not parse, which the upstream data uses for unknown years and runtimes.
    pub fn optional_number<T: FromStr>(&self, column: &str) -> Result<Option<T>> {
        let raw = self.raw(column)?;
        if raw == NULL_SENTINEL {
            return Ok(None);
        }
        Ok(raw.trim().parse().ok())
    }

    /// Multi-value column split on [`LIST_DELIMITER`], order preserved.
    pub fn list(&self, column: &str) -> Result<Vec<String>> {
        let raw = self.raw(column)?;
        if raw.is_empty() || raw == NULL_SENTINEL {
            return Ok(Vec::new());
        }
        Ok(raw
            .split(LIST_DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// A `0`/`1` flag; the null sentinel reads as `false`.
    pub fn flag(&self, column: &str) -> Result<bool> {
        match self.raw(column)?.trim() {
            "1" => Ok(true),
            "0" | "" | NULL_SENTINEL => Ok(false),
            other => Err(CatalogError::malformed(self.line, format!("invalid {column}: {other:?}"))),
        }
    }
}

/// Parses rows of one file into `T`, after binding the header.
pub struct RowParser<T> {
    positions: Vec<usize>,
    _record: PhantomData<fn() -> T>,
}

impl<T: FromRow> RowParser<T> {
    /// Binds `T::COLUMNS` against the header row. A missing column is fatal for
    /// the whole file and is reported against line 1.
    pub fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = split_fields(header);
        let positions = T::COLUMNS
            .iter()
            .map(|column| {
                names.iter().position(|n| n == column).ok_or_else(|| {
                    CatalogError::malformed(1, format!("header is missing column {column}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { positions, _record: PhantomData })
    }

    /// Binds the columns in their declared order, for headerless input.
    pub fn positional() -> Self {
        Self { positions: (0..T::COLUMNS.len()).collect(), _record: PhantomData }
    }

    pub fn parse(&self, line: &str, line_no: u64) -> Result<T> {
        let row = Row {
            line: line_no,
            fields: split_fields(line),
            columns: T::COLUMNS,
            positions: &self.positions,
        };
        T::from_row(&row)
    }
}

fn split_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split(FIELD_DELIMITER).collect()
}

impl FromRow for TitleRecord {
    const COLUMNS: &'static [&'static str] = &[
        "tconst",
        "titleType",
        "primaryTitle",
        "originalTitle",
        "startYear",
        "runtimeMinutes",
        "genres",
    ];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(TitleRecord {
            id: row.key("tconst")?,
            kind: TitleKind::from_code(&row.text("titleType")?),
            primary_title: row.text("primaryTitle")?,
            original_title: row.text("originalTitle")?,
            start_year: row.optional_number("startYear")?,
            runtime_minutes: row.optional_number("runtimeMinutes")?,
            genres: row.list("genres")?,
        })
    }
}

impl FromRow for RatingRecord {
    const COLUMNS: &'static [&'static str] = &["tconst", "averageRating", "numVotes"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        let average_rating: f64 = row.number("averageRating")?;
        if !(0.0..=10.0).contains(&average_rating) {
            return Err(CatalogError::malformed(
                row.line(),
                format!("averageRating out of range: {average_rating}"),
            ));
        }
        Ok(RatingRecord { id: row.key("tconst")?, average_rating, num_votes: row.number("numVotes")? })
    }
}

impl FromRow for AlternateTitleRecord {
    const COLUMNS: &'static [&'static str] =
        &["titleId", "ordering", "region", "language", "isOriginalTitle"];

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(AlternateTitleRecord {
            id: row.key("titleId")?,
            ordering: row.number("ordering")?,
            region: row.optional_text("region")?,
            language: row.optional_text("language")?,
            is_original_title: row.flag("isOriginalTitle")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE_HEADER: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres";

    #[test]
    fn parses_title_with_sentinels() {
        let parser = RowParser::<TitleRecord>::from_header(TITLE_HEADER).unwrap();
        let title = parser
            .parse("tt0000001\tmovie\tCarmencita\tCarmencita\t0\t\\N\t\\N\t\\N\tDocumentary,Short", 2)
            .unwrap();

        assert_eq!(title.id, "tt0000001");
        assert!(title.kind.is_movie());
        assert_eq!(title.start_year, None);
        assert_eq!(title.runtime_minutes, None);
        assert_eq!(title.genres, vec!["Documentary", "Short"]);
    }

    #[test]
    fn null_genres_become_empty_list() {
        let parser = RowParser::<TitleRecord>::from_header(TITLE_HEADER).unwrap();
        let title = parser.parse("tt1\tmovie\tA\tA\t0\t1999\t\\N\t120\t\\N", 2).unwrap();
        assert!(title.genres.is_empty());
        assert_eq!(title.start_year, Some(1999));
        assert_eq!(title.runtime_minutes, Some(120));
    }

    #[test]
    fn header_binding_tolerates_reordered_columns() {
        let parser = RowParser::<RatingRecord>::from_header("numVotes\ttconst\taverageRating").unwrap();
        let rating = parser.parse("1500\ttt42\t7.3\r", 2).unwrap();
        assert_eq!(rating.id, "tt42");
        assert_eq!(rating.num_votes, 1500);
        assert!((rating.average_rating - 7.3).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_header_column_is_reported_on_line_one() {
        let err = RowParser::<RatingRecord>::from_header("tconst\taverageRating").err().unwrap();
        assert!(matches!(err, CatalogError::MalformedRow { line: 1, .. }));
    }

    #[test]
    fn bad_required_number_fails_the_row() {
        let parser = RowParser::<RatingRecord>::positional();
        let err = parser.parse("tt1\tn/a\t10", 7).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedRow { line: 7, .. }));

        assert!(parser.parse("tt1\t11.5\t10", 8).is_err());
        assert!(parser.parse("tt1\t5.0", 9).is_err());
    }

    #[test]
    fn parses_alternate_title_flags() {
        let parser = RowParser::<AlternateTitleRecord>::from_header(
            "titleId\tordering\ttitle\tregion\tlanguage\ttypes\tattributes\tisOriginalTitle",
        )
        .unwrap();

        let original = parser.parse("tt9\t1\tLe Film\t\\N\tfr\toriginal\t\\N\t1", 2).unwrap();
        assert!(original.is_original_title);
        assert_eq!(original.language.as_deref(), Some("fr"));
        assert_eq!(original.region, None);

        let alt = parser.parse("tt9\t2\tThe Film\tUS\t\\N\t\\N\t\\N\t0", 3).unwrap();
        assert!(!alt.is_original_title);
        assert_eq!(alt.language, None);

        assert!(parser.parse("tt9\t3\tX\tUS\ten\t\\N\t\\N\tyes", 4).is_err());
    }
}
