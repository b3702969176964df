#![deny(clippy::unwrap_used)]

pub mod api;
pub mod bulk;
pub mod coerce;
pub mod config;
pub mod export;
pub mod import;
pub mod mapping;
pub mod pricing;
pub mod upload;
