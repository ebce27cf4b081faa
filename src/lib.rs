pub mod glm;
pub mod proxy;
pub mod resolver;
pub mod runtime;
pub mod store;

pub use glm::client::{CellLookup, GlmClient};
pub use proxy::provider::{HttpProxySource, ProxySource};
pub use proxy::rotation::{EgressIdentity, EgressPool};
pub use resolver::backoff::BackoffController;
pub use resolver::outcome::{CellKey, CellRecord, LookupOutcome, OutcomeClass};
pub use resolver::pending::PendingSet;
pub use resolver::stats::{BatchTally, PassStats};
pub use runtime::config::{ResolverConfig, ResolverConfigBuilder};
pub use runtime::runner::{Resolver, RunSummary};
pub use runtime::telemetry::init_tracing;
pub use store::{CellStore, StoreUpdate};
