//! Wire protocol to the upstream geolocation service: binary codec, HTTP
//! client with outcome classification, and plausibility validation.

pub mod client;
pub mod codec;
pub mod validate;

pub use client::{CellLookup, GlmClient, DEFAULT_REQUEST_TIMEOUT};
pub use validate::haversine_km;
