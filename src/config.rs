use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

use crate::{
    language::{DEFAULT_CHUNK_SIZE, ScanOptions},
    loader::FlatFileSource,
};

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub titles_file: String,
    pub ratings_file: String,
    pub akas_file: String,
    pub akas_chunk_size: usize,
    pub eager_language_index: bool,
    pub reload_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let data_dir = PathBuf::from(std::env::var("IMDB_DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        let titles_file = std::env::var("TITLES_FILE").unwrap_or_else(|_| "title.basics.tsv".to_string());
        let ratings_file = std::env::var("RATINGS_FILE").unwrap_or_else(|_| "title.ratings.tsv".to_string());
        let akas_file = std::env::var("AKAS_FILE").unwrap_or_else(|_| "title.akas.tsv".to_string());

        let akas_chunk_size: usize = std::env::var("AKAS_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let eager_language_index = std::env::var("EAGER_LANGUAGE_INDEX")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let reload_interval = match std::env::var("RELOAD_INTERVAL_SECS") {
            Ok(s) => {
                let secs: u64 = s.trim().parse().context("RELOAD_INTERVAL_SECS")?;
                (secs > 0).then(|| Duration::from_secs(secs))
            },
            Err(_) => None,
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            data_dir,
            titles_file,
            ratings_file,
            akas_file,
            akas_chunk_size,
            eager_language_index,
            reload_interval,
        })
    }

    pub fn source(&self) -> FlatFileSource {
        FlatFileSource::new(
            self.data_dir.join(&self.titles_file),
            self.data_dir.join(&self.ratings_file),
            self.data_dir.join(&self.akas_file),
        )
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions { chunk_size: self.akas_chunk_size, ..ScanOptions::default() }
    }
}
