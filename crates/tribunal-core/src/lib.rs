pub mod config;
pub mod engine;
pub mod errors;
pub mod ingest;
pub mod judge;
pub mod model;
pub mod providers;
pub mod report;
pub mod stats;
pub mod storage;
