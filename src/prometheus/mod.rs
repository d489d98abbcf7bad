//! `/metrics` HTTP exposition: an axum server exposing the supplier's
//! Prometheus registry as text, independent of the core crate.

pub mod config;
pub mod server;
