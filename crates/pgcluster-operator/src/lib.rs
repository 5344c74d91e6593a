//! Postgres cluster operator
//!
//! Watches `Postgresql` resources and hands each one to the reconcile driver,
//! writing the outcome of every pass back into the resource status.

#![deny(missing_docs)]

/// Operator configuration from flags and environment
pub mod config;
/// Controller reconcile and error policy
pub mod controller;
/// Controller construction
pub mod runner;
/// Startup tasks (CRD install)
pub mod startup;
