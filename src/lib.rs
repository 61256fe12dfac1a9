pub mod config;
pub mod db;
pub mod ingest;
pub mod pipeline;
pub mod process;
pub mod schema;
