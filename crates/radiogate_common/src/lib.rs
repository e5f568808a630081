//! Radiogate shared library.
//!
//! Holds the link-arbitration core: the data model, wired-link
//! classification, the `LinkArbiter` state machine, error types and the
//! configuration model. Nothing in here spawns processes or sleeps; the
//! daemon feeds it probe snapshots and instants.

pub mod arbiter;
pub mod classify;
pub mod config;
pub mod error;
pub mod types;

pub use arbiter::{ArbiterConfig, ArbiterState, LinkArbiter};
pub use classify::{aggregate, really_active, wired_candidates, CandidatePolicy, LinkReport};
pub use config::{Config, LogRotation, LogTarget, LoggingConfig};
pub use error::{ConfigError, ProbeError};
pub use types::{Action, Decision, HardwarePort, PollPhase, RadioState, Suppression, WiredCandidate};
