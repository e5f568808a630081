//! Radiogate daemon library
//!
//! OS probes and actuators, per-tick sampling, notifications, log setup,
//! the event journal and the poll loop that drives `radiogate_common::LinkArbiter`.

pub mod journal;
pub mod logging;
pub mod notifier;
pub mod poll_loop;
pub mod probe;
pub mod sampler;
pub mod signals;

pub use journal::{Journal, JournalEntry, JournalEvent};
pub use notifier::{DesktopNotifier, NotificationUrgency, Notifier, NullNotifier};
pub use poll_loop::{PollLoop, TickOutcome};
pub use probe::{Backends, RadioActuator, SignalProbe};
pub use sampler::{Sampler, Snapshot};
