//! Album suggestions from a photo library's embeddings, timestamps and GPS.

pub mod additions;
pub mod assets;
pub mod clustering;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;

pub use clustering::{cluster_rows, find_album_candidates, AlbumCandidate, ClusteringReport};
pub use config::Config;
pub use error::{ClusterError, ClusterResult, ConfigError, RecordError};
