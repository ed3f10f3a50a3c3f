//! skyquery-core: distance math and area queries over live aircraft snapshots.
//!
//! No network I/O. The feed is an injected `SnapshotProvider`; this crate is
//! shared by the `skyquery` server/CLI and by tests that substitute a fixed
//! snapshot.

pub mod area;
pub mod config;
pub mod distance;
pub mod feed;
pub mod types;

// Re-export commonly used types at crate root
pub use area::{AircraftFilter, AreaQueryEngine};
pub use config::{Config, EngineConfig};
pub use distance::{great_circle_distance, Distance, DistanceUnit};
pub use feed::{FeedError, SnapshotProvider, SnapshotRequest, StaticSnapshot};
pub use types::*;
