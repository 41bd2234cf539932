//! Configuration loading, parsing, and validation.
//!
//! # Example
//!
//! ```no_run
//! use sumi_tarama::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.json")).unwrap();
//! println!("chunk_size: {}", config.crawler.chunk_size);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, FailReasonWeights, MaxWorkerConfig, SystemConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
