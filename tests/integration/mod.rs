//! tests/integration/mod.rs
//!
//! End-to-end scenarios, grouped by theme.

mod churn;
mod cluster;
mod relay;
