use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader, Cursor},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{CatalogError, Result},
    models::{RatingRecord, TitleRecord},
    parser::{FromRow, RowParser},
};

/// Where the catalog's base tables and language data come from.
///
/// Flat files are the usual origin, but anything that can yield title- and
/// rating-shaped records works.
pub trait RecordSource: Send + Sync {
    fn titles(&self) -> Result<Loaded<TitleRecord>>;

    fn ratings(&self) -> Result<Loaded<RatingRecord>>;

    /// Opens the alternate-titles table, header row included.
    fn open_alternate_titles(&self) -> io::Result<Box<dyn BufRead + Send>>;

    /// Human-readable location of the alternate-titles table, for diagnostics.
    fn alternate_titles_location(&self) -> PathBuf;
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: u64,
    pub kept: u64,
    pub filtered: u64,
    pub skipped: u64,
    pub duplicates: u64,
}

#[derive(Debug)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub stats: LoadStats,
}

trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for TitleRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for RatingRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Accumulates records, collapsing repeated identifiers. The later record
/// replaces the earlier one in the earlier one's position.
struct Collector<T> {
    records: Vec<T>,
    positions: HashMap<String, usize>,
    stats: LoadStats,
}

impl<T: Keyed> Collector<T> {
    fn new() -> Self {
        Self { records: Vec::new(), positions: HashMap::new(), stats: LoadStats::default() }
    }

    fn push(&mut self, record: T) {
        match self.positions.get(record.key()) {
            Some(&idx) => {
                self.stats.duplicates += 1;
                self.records[idx] = record;
            },
            None => {
                self.positions.insert(record.key().to_string(), self.records.len());
                self.records.push(record);
            },
        }
    }

    fn finish(mut self) -> Loaded<T> {
        self.stats.kept = self.records.len() as u64;
        Loaded { records: self.records, stats: self.stats }
    }
}

/// Reads the title table, keeping movies only.
pub fn load_titles(path: &Path) -> Result<Loaded<TitleRecord>> {
    let loaded = read_table(path, |t: &TitleRecord| t.kind.is_movie())?;
    info!(
        path = %path.display(),
        rows = loaded.stats.rows,
        movies = loaded.stats.kept,
        filtered = loaded.stats.filtered,
        "loaded titles"
    );
    Ok(loaded)
}

pub fn load_ratings(path: &Path) -> Result<Loaded<RatingRecord>> {
    let loaded = read_table(path, |_: &RatingRecord| true)?;
    info!(path = %path.display(), rows = loaded.stats.rows, kept = loaded.stats.kept, "loaded ratings");
    Ok(loaded)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => CatalogError::DatasetNotFound { path: path.to_path_buf() },
        _ => CatalogError::Io(err),
    })
}

fn read_table<T, F>(path: &Path, keep: F) -> Result<Loaded<T>>
where
    T: FromRow + Keyed,
    F: Fn(&T) -> bool,
{
    let mut lines = TsvLines::new(BufReader::new(open(path)?));

    let Some((_, header)) = lines.next_line()? else {
        warn!(path = %path.display(), "dataset is empty");
        return Ok(Collector::new().finish());
    };
    let parser = RowParser::<T>::from_header(&header?)?;

    let mut collector = Collector::new();
    while let Some((line_no, line)) = lines.next_line()? {
        collector.stats.rows += 1;
        match line.and_then(|l| parser.parse(&l, line_no)) {
            Ok(record) if keep(&record) => collector.push(record),
            Ok(_) => collector.stats.filtered += 1,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping malformed row");
                collector.stats.skipped += 1;
            },
        }
    }

    if collector.stats.skipped > 0 {
        warn!(path = %path.display(), skipped = collector.stats.skipped, "skipped malformed rows");
    }
    if collector.stats.duplicates > 0 {
        debug!(path = %path.display(), duplicates = collector.stats.duplicates, "collapsed duplicate identifiers");
    }

    Ok(collector.finish())
}

/// Line reader that survives invalid UTF-8: a bad line is reported as a
/// malformed row instead of ending the scan.
pub(crate) struct TsvLines<R> {
    reader: R,
    line_no: u64,
    buf: Vec<u8>,
}

impl<R: BufRead> TsvLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self { reader, line_no: 0, buf: Vec::new() }
    }

    /// Returns the next 1-based line number and its text. Only I/O failures
    /// are surfaced as the outer error.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<(u64, Result<String>)>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        let text = String::from_utf8(std::mem::take(&mut self.buf))
            .map_err(|_| CatalogError::malformed(self.line_no, "invalid UTF-8"));
        Ok(Some((self.line_no, text)))
    }
}

/// The three dataset files on disk.
#[derive(Clone, Debug)]
pub struct FlatFileSource {
    pub titles: PathBuf,
    pub ratings: PathBuf,
    pub alternate_titles: PathBuf,
}

impl FlatFileSource {
    pub fn new(titles: PathBuf, ratings: PathBuf, alternate_titles: PathBuf) -> Self {
        Self { titles, ratings, alternate_titles }
    }

    /// Uses the standard dataset file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            dir.join("title.basics.tsv"),
            dir.join("title.ratings.tsv"),
            dir.join("title.akas.tsv"),
        )
    }
}

impl RecordSource for FlatFileSource {
    fn titles(&self) -> Result<Loaded<TitleRecord>> {
        load_titles(&self.titles)
    }

    fn ratings(&self) -> Result<Loaded<RatingRecord>> {
        load_ratings(&self.ratings)
    }

    fn open_alternate_titles(&self) -> io::Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(BufReader::new(File::open(&self.alternate_titles)?)))
    }

    fn alternate_titles_location(&self) -> PathBuf {
        self.alternate_titles.clone()
    }
}

/// Records already in memory, e.g. produced by an external collector.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    pub titles: Vec<TitleRecord>,
    pub ratings: Vec<RatingRecord>,
    /// Alternate-titles table as TSV text, header row included.
    pub alternate_titles: Option<String>,
}

impl RecordSource for MemorySource {
    fn titles(&self) -> Result<Loaded<TitleRecord>> {
        let mut collector = Collector::new();
        for title in &self.titles {
            collector.stats.rows += 1;
            if title.kind.is_movie() {
                collector.push(title.clone());
            } else {
                collector.stats.filtered += 1;
            }
        }
        Ok(collector.finish())
    }

    fn ratings(&self) -> Result<Loaded<RatingRecord>> {
        let mut collector = Collector::new();
        for rating in &self.ratings {
            collector.stats.rows += 1;
            collector.push(rating.clone());
        }
        Ok(collector.finish())
    }

    fn open_alternate_titles(&self) -> io::Result<Box<dyn BufRead + Send>> {
        match &self.alternate_titles {
            Some(text) => Ok(Box::new(Cursor::new(text.clone().into_bytes()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no alternate titles in memory")),
        }
    }

    fn alternate_titles_location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::models::TitleKind;

    const TITLE_HEADER: &str = "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres\n";

    #[test]
    fn missing_file_is_dataset_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_titles(&dir.path().join("nope.tsv")).unwrap_err();
        assert!(matches!(err, CatalogError::DatasetNotFound { .. }));
    }

    #[test]
    fn keeps_movies_and_skips_malformed_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("title.basics.tsv");
        let body = format!(
            "{TITLE_HEADER}\
             tt1\tmovie\tOne\tOne\t0\t2001\t\\N\t100\tDrama\n\
             tt2\ttvSeries\tShow\tShow\t0\t2002\t\\N\t30\tComedy\n\
             tt3\tmovie\tBroken\n\
             tt4\tmovie\tFour\tFour\t0\t\\N\t\\N\t\\N\t\\N\n"
        );
        fs::write(&path, body).unwrap();

        let loaded = load_titles(&path).unwrap();
        let ids: Vec<_> = loaded.records.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["tt1", "tt4"]);
        assert_eq!(loaded.stats.rows, 4);
        assert_eq!(loaded.stats.filtered, 1);
        assert_eq!(loaded.stats.skipped, 1);
        assert_eq!(loaded.stats.kept, 2);
    }

    #[test]
    fn duplicate_identifiers_keep_last_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("title.ratings.tsv");
        fs::write(
            &path,
            "tconst\taverageRating\tnumVotes\ntt1\t5.0\t10\ntt2\t6.0\t20\ntt1\t7.5\t30\n",
        )
        .unwrap();

        let loaded = load_ratings(&path).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[0].id, "tt1");
        assert_eq!(loaded.records[0].num_votes, 30);
        assert_eq!(loaded.stats.duplicates, 1);
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("title.ratings.tsv");
        let mut bytes = b"tconst\taverageRating\tnumVotes\n".to_vec();
        bytes.extend_from_slice(b"tt\xff\t5.0\t10\n");
        bytes.extend_from_slice(b"tt2\t6.0\t20\n");
        fs::write(&path, bytes).unwrap();

        let loaded = load_ratings(&path).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.stats.skipped, 1);
    }

    #[test]
    fn memory_source_applies_movie_filter() {
        let title = |id: &str, kind: TitleKind| TitleRecord {
            id: id.to_string(),
            kind,
            primary_title: id.to_string(),
            original_title: id.to_string(),
            start_year: None,
            runtime_minutes: None,
            genres: vec![],
        };
        let source = MemorySource {
            titles: vec![title("tt1", TitleKind::Movie), title("tt2", TitleKind::from_code("short"))],
            ..Default::default()
        };

        let loaded = source.titles().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.stats.filtered, 1);
        assert!(source.open_alternate_titles().is_err());
    }
}
