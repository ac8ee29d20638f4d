//! Query cache for catalog data.
//!
//! Each cache maps a key to a single entry that moves through
//! `absent -> fetching -> fresh -> stale -> fetching -> fresh ...` and is
//! evicted after sitting idle. Policies (staleness, retention, retries) are
//! per cache; see [`CachePolicy`](crate::config::CachePolicy).

mod entry;
mod query;

pub use entry::{CacheRead, CacheStatus, InFlight};
pub use query::{CacheStats, QueryCache};
