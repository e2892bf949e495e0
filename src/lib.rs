#![forbid(unsafe_code)]

pub mod analyze;
pub mod build;
pub mod chapters;
pub mod cli;
pub mod config;
pub mod epub;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod orchestrator;
pub mod page;
pub mod rate_limit;
pub mod registry;
pub mod sanitize;
pub mod strategy;
pub mod urls;
