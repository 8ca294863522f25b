pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod network;
pub mod parse;
pub mod pca;
pub mod scaling;
pub mod split;
pub mod statistics;

pub use error::{Error, Result};
