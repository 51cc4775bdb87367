pub mod types;
pub mod error;
pub mod config;
pub mod utils;
pub mod feed;
pub mod analytics;
pub mod service;
pub mod api;

pub use types::*;
pub use error::{Result, StatsError};
pub use service::StatsService;
