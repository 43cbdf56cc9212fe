pub mod aggregator;
pub mod assignment;
pub mod boundary_store;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod extract;
pub mod geometry;
pub mod history;
pub mod metrics;
pub mod states;
pub mod store;
pub mod types;
