#![forbid(unsafe_code)]

pub use config::{Config, QueueKind, DEFAULT_CAPACITY};
pub use error::Error;

pub mod config;
pub mod error;
