pub mod apis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod types;
