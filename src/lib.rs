pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod records;
pub mod state;
pub mod stats;
pub mod store;
