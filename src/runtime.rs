//! Runtime glue: validated configuration, tracing bootstrap, and the pass
//! driver.

pub mod config;
pub mod runner;
pub mod telemetry;

pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use runner::{Resolver, RunSummary};
pub use telemetry::init_tracing;
