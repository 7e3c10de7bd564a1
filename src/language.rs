//! Primary-language resolution from the alternate-titles table.
//!
//! The table is far larger than the title and rating tables, so it is never
//! held in memory. A single pass groups its rows by identifier into one small
//! accumulator per title; every later lookup is a hash probe.
//!
//! Resolution rule for one identifier:
//! 1. the first row flagged as the original title that carries a language;
//! 2. otherwise the most frequent language over all of its rows, ties going
//!    to the language seen first;
//! 3. otherwise [`UNKNOWN_LANGUAGE`].

use std::{
    collections::{HashMap, HashSet},
    io::{self, BufRead},
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Instant,
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    error::{CatalogError, Result},
    loader::{RecordSource, TsvLines},
    models::AlternateTitleRecord,
    parser::RowParser,
};

pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Rows handed to one grouping task.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

#[derive(Clone, Copy, Debug)]
pub struct ScanOptions {
    pub chunk_size: usize,
    /// Chunks grouped concurrently per read batch.
    pub parallel_chunks: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, parallel_chunks: rayon::current_num_threads() }
    }
}

#[derive(Clone, Debug)]
struct Tally {
    code: String,
    count: u64,
    first_seen: u64,
}

/// Everything the resolution rule needs to know about one identifier.
/// `seq` values are file line numbers, so chunks can be merged in any order.
#[derive(Clone, Debug, Default)]
struct Accumulator {
    original: Option<(u64, String)>,
    tallies: Vec<Tally>,
}

impl Accumulator {
    fn observe(&mut self, seq: u64, row: AlternateTitleRecord) {
        let Some(code) = row.language.filter(|c| !c.is_empty()) else {
            return;
        };
        if row.is_original_title && self.original.as_ref().is_none_or(|(s, _)| seq < *s) {
            self.original = Some((seq, code.clone()));
        }
        self.tally(code, 1, seq);
    }

    fn tally(&mut self, code: String, count: u64, seen: u64) {
        match self.tallies.iter_mut().find(|t| t.code == code) {
            Some(t) => {
                t.count += count;
                t.first_seen = t.first_seen.min(seen);
            },
            None => self.tallies.push(Tally { code, count, first_seen: seen }),
        }
    }

    fn merge(&mut self, other: Accumulator) {
        if let Some((seq, code)) = other.original {
            if self.original.as_ref().is_none_or(|(s, _)| seq < *s) {
                self.original = Some((seq, code));
            }
        }
        for t in other.tallies {
            self.tally(t.code, t.count, t.first_seen);
        }
    }

    fn resolve(&self) -> Option<&str> {
        if let Some((_, code)) = &self.original {
            return Some(code);
        }
        self.tallies
            .iter()
            .max_by(|a, b| a.count.cmp(&b.count).then(b.first_seen.cmp(&a.first_seen)))
            .map(|t| t.code.as_str())
    }
}

#[derive(Default)]
struct ChunkGroups {
    groups: HashMap<String, Accumulator>,
    rows: u64,
    skipped: u64,
}

fn group_chunk(
    parser: &RowParser<AlternateTitleRecord>,
    chunk: &[(u64, Result<String>)],
    wanted: Option<&HashSet<String>>,
) -> ChunkGroups {
    let mut out = ChunkGroups::default();
    for (line_no, line) in chunk {
        out.rows += 1;
        let record = match line {
            Ok(text) => parser.parse(text, *line_no),
            Err(_) => Err(CatalogError::malformed(*line_no, "unreadable line")),
        };
        match record {
            Ok(record) => {
                if wanted.is_some_and(|w| !w.contains(&record.id)) {
                    continue;
                }
                out.groups.entry(record.id.clone()).or_default().observe(*line_no, record);
            },
            Err(_) => out.skipped += 1,
        }
    }
    out
}

/// Per-identifier accumulators, addressed through `slots`.
#[derive(Default)]
struct Arena {
    slots: HashMap<String, usize>,
    accumulators: Vec<Accumulator>,
}

impl Arena {
    fn absorb(&mut self, chunk: ChunkGroups) {
        for (id, acc) in chunk.groups {
            match self.slots.get(&id) {
                Some(&slot) => self.accumulators[slot].merge(acc),
                None => {
                    self.slots.insert(id, self.accumulators.len());
                    self.accumulators.push(acc);
                },
            }
        }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct IndexStats {
    pub rows: u64,
    pub skipped: u64,
    pub identifiers: usize,
    pub resolved: usize,
    /// False when the scan stopped early on an I/O failure.
    pub complete: bool,
}

/// Identifier to language mapping built in one pass over the alternate titles.
#[derive(Debug, Default)]
pub struct LanguageIndex {
    languages: HashMap<String, String>,
    stats: IndexStats,
}

impl LanguageIndex {
    /// Scans `reader` once. When `wanted` is given, rows for other identifiers
    /// are dropped while grouping.
    ///
    /// A read failure part-way through does not fail the build: identifiers
    /// already settled by an original-title row keep their language, the rest
    /// resolve to [`UNKNOWN_LANGUAGE`]. Errors are only returned when the
    /// header cannot be read or bound.
    pub fn build<R: BufRead>(
        reader: R,
        options: ScanOptions,
        wanted: Option<&HashSet<String>>,
    ) -> Result<Self> {
        let chunk_size = options.chunk_size.max(1);
        let batch_len = chunk_size * options.parallel_chunks.max(1);

        let mut lines = TsvLines::new(reader);
        let Some((_, header)) = lines.next_line()? else {
            return Ok(Self { stats: IndexStats { complete: true, ..Default::default() }, ..Default::default() });
        };
        let parser = RowParser::<AlternateTitleRecord>::from_header(&header?)?;

        let mut arena = Arena::default();
        let mut stats = IndexStats::default();
        let mut failure: Option<io::Error> = None;
        let mut eof = false;

        while !eof && failure.is_none() {
            let mut batch = Vec::with_capacity(batch_len);
            while batch.len() < batch_len {
                match lines.next_line() {
                    Ok(Some(line)) => batch.push(line),
                    Ok(None) => {
                        eof = true;
                        break;
                    },
                    Err(err) => {
                        failure = Some(err);
                        break;
                    },
                }
            }

            let grouped: Vec<ChunkGroups> = batch
                .par_chunks(chunk_size)
                .map(|chunk| group_chunk(&parser, chunk, wanted))
                .collect();
            for chunk in grouped {
                stats.rows += chunk.rows;
                stats.skipped += chunk.skipped;
                arena.absorb(chunk);
            }
        }

        stats.identifiers = arena.accumulators.len();
        stats.complete = failure.is_none();
        if let Some(err) = failure {
            warn!(error = %err, rows = stats.rows, "language scan interrupted, keeping original-title matches only");
        }

        let languages: HashMap<String, String> = arena
            .slots
            .into_iter()
            .filter_map(|(id, slot)| {
                let acc = &arena.accumulators[slot];
                let code = if stats.complete {
                    acc.resolve()
                } else {
                    acc.original.as_ref().map(|(_, c)| c.as_str())
                };
                code.map(|c| (id, c.to_string()))
            })
            .collect();
        stats.resolved = languages.len();

        Ok(Self { languages, stats })
    }

    pub fn resolve(&self, id: &str) -> &str {
        self.languages.get(id).map(String::as_str).unwrap_or(UNKNOWN_LANGUAGE)
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

/// Lazily built language index for one catalog snapshot.
pub struct LanguageResolver {
    source: Arc<dyn RecordSource>,
    options: ScanOptions,
    wanted: HashSet<String>,
    index: OnceLock<LanguageIndex>,
}

impl LanguageResolver {
    pub fn new(source: Arc<dyn RecordSource>, options: ScanOptions, wanted: HashSet<String>) -> Self {
        Self { source, options, wanted, index: OnceLock::new() }
    }

    /// Builds the index on first call; later calls and concurrent callers
    /// share the same one.
    pub fn index(&self) -> &LanguageIndex {
        self.index.get_or_init(|| self.build())
    }

    /// The index, if it has been built already.
    pub fn ready(&self) -> Option<&LanguageIndex> {
        self.index.get()
    }

    pub fn resolve(&self, id: &str) -> &str {
        self.index().resolve(id)
    }

    fn build(&self) -> LanguageIndex {
        let started = Instant::now();
        let location: PathBuf = self.source.alternate_titles_location();
        debug!(path = %location.display(), chunk_size = self.options.chunk_size, "building language index");

        let result = self
            .source
            .open_alternate_titles()
            .map_err(|source| CatalogError::ResolutionUnavailable { path: location.clone(), source })
            .and_then(|reader| LanguageIndex::build(reader, self.options, Some(&self.wanted)));

        match result {
            Ok(index) => {
                info!(
                    path = %location.display(),
                    rows = index.stats.rows,
                    resolved = index.stats.resolved,
                    skipped = index.stats.skipped,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "built language index"
                );
                index
            },
            Err(err) => {
                warn!(error = %err, "language index unavailable, every title resolves to unknown");
                LanguageIndex::default()
            },
        }
    }
}
