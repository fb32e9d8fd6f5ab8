pub mod config;
pub mod dataset;
pub mod fixtures;
pub mod fpl_feed;
pub mod http_client;
pub mod ingest;
pub mod match_stats;
pub mod metrics;
pub mod page;
pub mod reconcile;
pub mod store;
