pub mod analytics;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod models;
pub mod report;
pub mod server;
