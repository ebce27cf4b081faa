//! Egress identity management: the rotating proxy working set and the
//! elite-proxy listing provider.

pub mod provider;
pub mod rotation;

pub use provider::{HttpProxySource, ProxySource};
pub use rotation::{EgressIdentity, EgressPool};
