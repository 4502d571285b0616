//! eco-sorter: region-aware waste-sorting assistant
//!
//! Answers sorting questions from the official guide of the selected region
//! (retrieval-augmented generation restricted to that region's chunks) and
//! classifies photos of waste items into material categories that feed a
//! follow-up question back into the same pipeline.

pub mod agent;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod region;
pub mod retrieval;
pub mod server;
pub mod types;
pub mod vision;

pub use agent::Assistant;
pub use config::EcoConfig;
pub use error::{Error, Result};
pub use region::Region;
pub use types::{AskRequest, AskResponse, Chunk, Document, FileType, Metrics};
pub use vision::{Prediction, WasteCategory};
