//! User Interaction Events - engagement beacons for an analytics event queue
//!
//! A tracker counts mouse movement, touch, scroll, key and click events on a
//! page and pushes tagged objects into the page's analytics queue:
//!
//! - immediately on the first interaction (so visitors who leave early are
//!   still distinguished from bots that never interact),
//! - on every Enter key press,
//! - at fixed delays after page ready, labelled active or inactive depending on
//!   whether anything was counted since the previous push.
//!
//! Pipeline: host events → tracker → snapshot comparison → encoder → event sink

pub mod adapter;
pub mod baseline;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod schedule;
pub mod sink;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::TrackerConfig;
pub use error::TrackerError;
pub use pipeline::{activate, replay_to_json, HostEnvironment, LiveDriver, Replay, ReplayReport};
pub use schedule::{TimerSchedule, TimerTick, Variant};
pub use sink::{DataLayer, EventSink, HostQueue, QueuePolicy, RecordingSink};
pub use tracker::{InteractionTracker, TrackerState};
pub use types::{Classification, DataLayerEvent, InteractionEvent, InteractionKind};

/// Crate version
pub const TRACKER_VERSION: &str = env!("CARGO_PKG_VERSION");
