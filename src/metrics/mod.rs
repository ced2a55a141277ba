//! The snapshot engine and the collectors it drives.
//!
//! [`Engine`] owns all baseline state (previous CPU ticks, byte counters,
//! per-process ticks and the DNS cache) and produces immutable [`Snapshot`]s.

mod disk;
mod engine;
mod enumerator;
mod model;
mod rates;
mod resolver;

pub use disk::disk_usage_percent;
pub use engine::{
    CPU_AVERAGE_WINDOW, Engine, EngineBuilder, MIN_COLLECTION_INTERVAL, NETWORK_AVERAGE_WINDOW,
};
pub use enumerator::{ConnectionCensus, ProcessCensus, ProcessEnumerator, census_connections};
pub use model::{DomainUsage, ProcessUsage, Snapshot};
pub use rates::{NetRate, NetRateTracker, RollingAverage};
pub use resolver::{DomainResolver, ReverseLookup, SystemLookup, UNRESOLVED, attribute};
