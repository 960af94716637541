//! Links Chicago crime incidents to community areas, census block groups and
//! American Community Survey demographics, and summarises the result.

pub mod analytics;
pub mod cache;
pub mod chicago;
pub mod config;
pub mod demographics;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod getter;
pub mod join;
pub mod pipeline;
pub mod records;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Datasets, Pipeline, Request, Source};
