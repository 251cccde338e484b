//! Unit tests for the agent broker.
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod mocks;
