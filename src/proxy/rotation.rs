//! Ordered working set of outbound egress identities.
//!
//! Identities that fail a request are moved to the back of the ring rather
//! than removed, so a soft-banned proxy cycles through all of its peers
//! before it is picked again. The pool is only mutated by the driver task
//! between batches, never during a batch's concurrent phase.

use std::collections::VecDeque;
use std::fmt;

/// How many consecutive rotations an identity sits out before it is retried:
/// proxy-mode batches take the first len/8 identities, so a penalized one
/// has eight batch rounds for an upstream soft-ban to expire.
const PROXY_BATCH_DIVISOR: usize = 8;

/// One outbound egress identity: the process's own address, or a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EgressIdentity {
    Direct,
    Proxy(String),
}

impl fmt::Display for EgressIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EgressIdentity::Direct => write!(f, "direct"),
            EgressIdentity::Proxy(endpoint) => write!(f, "{endpoint}"),
        }
    }
}

/// Rotating pool of egress identities with a direct/proxy mode flag.
#[derive(Debug)]
pub struct EgressPool {
    proxies: VecDeque<EgressIdentity>,
    direct_width: usize,
    proxy_mode: bool,
    batch_divisor: usize,
}

impl EgressPool {
    pub fn new(proxies: Vec<EgressIdentity>, direct_width: usize, proxy_mode: bool) -> Self {
        Self {
            proxies: proxies.into_iter().collect(),
            direct_width: direct_width.max(1),
            proxy_mode,
            batch_divisor: PROXY_BATCH_DIVISOR,
        }
    }

    pub fn proxy_mode(&self) -> bool {
        self.proxy_mode
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// One-way switch into proxy mode for the remainder of the pass.
    pub fn enable_proxies(&mut self) {
        self.proxy_mode = true;
    }

    /// Records to dispatch per batch in the current mode.
    pub fn batch_size(&self) -> usize {
        if self.proxy_mode {
            (self.proxies.len() / self.batch_divisor).max(1)
        } else {
            self.direct_width
        }
    }

    /// Returns `n` identities paired positionally with a batch of records.
    ///
    /// Direct mode hands out `n` copies of [`EgressIdentity::Direct`]. Proxy
    /// mode clones from the front of the ring, wrapping if `n` exceeds the
    /// ring length so every record always gets an identity. An empty ring
    /// also falls back to direct copies, so a pass that switched to proxies
    /// with none available still makes progress.
    pub fn assign(&self, n: usize) -> Vec<EgressIdentity> {
        if !self.proxy_mode || self.proxies.is_empty() {
            return vec![EgressIdentity::Direct; n];
        }
        self.proxies.iter().cycle().take(n).cloned().collect()
    }

    /// Moves `identity` to the back of the ring. Never removes; a no-op for
    /// the direct identity or an identity already rotated out this batch.
    pub fn penalize(&mut self, identity: &EgressIdentity) {
        if matches!(identity, EgressIdentity::Direct) {
            return;
        }
        if let Some(position) = self.proxies.iter().position(|p| p == identity) {
            if let Some(proxy) = self.proxies.remove(position) {
                self.proxies.push_back(proxy);
            }
        }
    }
}
