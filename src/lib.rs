//! Library crate for scoreline-sync, exposing modules for binaries and integration tests.

pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod source;
pub mod state;
