pub mod config;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod models;
pub mod observability;
pub mod store;
