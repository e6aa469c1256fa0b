//! Item source backed by an HTTP extraction sidecar (the headless-browser layer).

mod config;
mod error;
mod source;

pub use config::{DEFAULT_SOURCE_URL, HttpSourceConfig};
pub use error::{HttpSourceError, HttpSourceResult};
pub use source::HttpItemSource;
