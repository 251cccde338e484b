//! Application services — lifecycle use-cases over injected ports.

pub mod provisioning;
