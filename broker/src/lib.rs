//! CI build-agent broker library — exposes modules for integration testing.

pub mod api;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infra;
