#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub)]

//! Single streaming session driven over a swarm client.
//!
//! Layout:
//! - `machine.rs`: pure reducer from inputs to effects.
//! - `worker.rs`: background task executing effects and polling the engine.
//! - `manager.rs`: cloneable [`TorrentSessionManager`] handle.
//! - `context.rs`: lazily constructed, process-wide swarm client.
//! - `telemetry.rs`: snapshot coalescing and progress subscriptions.
//! - `playback.rs`: the [`PlaybackSink`] seam and locator binding.
//! - `stub.rs`: scriptable in-memory client for tests and demo mode.
//! - `rqbit.rs`: `librqbit` adapter (feature `rqbit`).

mod command;
pub mod context;
pub mod error;
pub mod machine;
pub mod manager;
pub mod playback;
#[cfg(feature = "rqbit")]
pub mod rqbit;
pub mod stub;
pub mod telemetry;
mod worker;

pub use context::{EngineContext, SwarmClientFactory};
pub use error::{SessionError, SessionResult};
pub use machine::{SessionMachine, SessionPolicy, SessionSnapshot};
pub use manager::TorrentSessionManager;
pub use playback::{PlaybackSink, TracingSink};
#[cfg(feature = "rqbit")]
pub use rqbit::RqbitSwarmClient;
pub use stub::StubSwarmClient;
pub use telemetry::{ProgressSubscription, SessionTelemetryEmitter};
