//! Snowflake-backed URL shortener.
//!
//! Short codes are six base62 symbols derived from time-ordered 64-bit
//! identifiers. Codes are checked against the codes already known for the
//! request and, finally, against the storage unique key.

pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod types;
pub mod utils;
pub mod validations;
