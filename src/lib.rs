//! In-memory movie catalog built from the IMDb title, rating and
//! alternate-title datasets, with the filtering and ranking queries served by
//! the HTTP layer.

pub mod catalog;
pub mod config;
pub mod error;
pub mod facade;
pub mod filter;
pub mod joiner;
pub mod language;
pub mod loader;
pub mod models;
pub mod parser;
pub mod ranking;
pub mod routes;

pub use catalog::{Catalog, Snapshot};
pub use error::{CatalogError, Result};
pub use facade::QueryFacade;
pub use filter::{FilterConfig, GenreMatch};
pub use loader::{FlatFileSource, MemorySource, RecordSource};
