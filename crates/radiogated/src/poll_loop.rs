//! Poll loop - sample, decide, act, report, sleep
//!
//! The only writer of the arbiter state. Ticks run strictly one at a time;
//! the tick and the sleep both race the shutdown channel.

use crate::journal::{Journal, JournalEntry};
use crate::notifier::Notifier;
use crate::probe::RadioActuator;
use crate::sampler::{Sampler, Snapshot};
use radiogate_common::{Decision, LinkArbiter, PollPhase, RadioState, Suppression};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What one tick saw and did
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub snapshot: Snapshot,
    pub decision: Decision,
    /// `Some(ok)` when an actuation was attempted
    pub actuated: Option<bool>,
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.snapshot;
        let d = &self.decision;
        writeln!(f, "wired_active: {}", s.wired_active)?;
        for report in &s.reports {
            let status = match (&report.error, report.is_really_active()) {
                (Some(e), _) => format!("error: {}", e),
                (None, true) => "active".to_string(),
                (None, false) if report.link_active => "link up, no routable address".to_string(),
                (None, false) => "link down".to_string(),
            };
            writeln!(f, "  {}: {}", report.candidate, status)?;
        }
        writeln!(f, "radio: {}", s.radio)?;
        writeln!(f, "network: {}", s.network.as_deref().unwrap_or("-"))?;
        writeln!(f, "phase: {}", d.phase.as_str())?;
        writeln!(f, "action: {}", d.action.as_str())?;
        if let Some(suppression) = &d.suppressed {
            writeln!(f, "suppressed: {}", describe_suppression(suppression))?;
        }
        if let Some(ok) = self.actuated {
            writeln!(f, "actuated: {}", if ok { "ok" } else { "failed" })?;
        }
        write!(f, "next_poll: {}s", d.next_poll_delay.as_secs())
    }
}

pub struct PollLoop {
    arbiter: LinkArbiter,
    sampler: Sampler,
    actuator: Arc<dyn RadioActuator>,
    notifier: Arc<dyn Notifier>,
    journal: Journal,
    last_phase: Option<PollPhase>,
    last_drift: Option<RadioState>,
}

impl PollLoop {
    pub fn new(
        arbiter: LinkArbiter,
        sampler: Sampler,
        actuator: Arc<dyn RadioActuator>,
        notifier: Arc<dyn Notifier>,
        journal: Journal,
    ) -> Self {
        Self {
            arbiter,
            sampler,
            actuator,
            notifier,
            journal,
            last_phase: None,
            last_drift: None,
        }
    }

    pub fn arbiter(&self) -> &LinkArbiter {
        &self.arbiter
    }

    /// One full cycle against the real clock
    pub async fn tick(&mut self) -> TickOutcome {
        let snapshot = self.sampler.sample().await;
        self.apply(snapshot, Instant::now()).await
    }

    /// Decide on `snapshot` as of `now`, then act and report
    pub async fn apply(&mut self, snapshot: Snapshot, now: Instant) -> TickOutcome {
        let decision = self.arbiter.evaluate(
            now,
            snapshot.wired_active,
            snapshot.radio,
            snapshot.network.as_deref(),
        );
        self.log_decision(&snapshot, &decision);

        let actuated = match decision.action.target() {
            Some(target) => Some(self.actuate(&snapshot, &decision, target, now).await),
            None => None,
        };

        TickOutcome {
            snapshot,
            decision,
            actuated,
        }
    }

    async fn actuate(
        &mut self,
        snapshot: &Snapshot,
        decision: &Decision,
        target: RadioState,
        now: Instant,
    ) -> bool {
        let on = target == RadioState::On;
        let reason = wired_summary(snapshot);
        info!(
            "Turning radio {} ({}{})",
            target,
            reason,
            if decision.recovery { ", recovery" } else { "" }
        );

        let ok = self.actuator.set_radio_power(on).await;
        self.arbiter.confirm_actuation(ok, target, now);

        if ok {
            info!("Radio is now {}", target);
            self.last_drift = None;
            self.notifier.radio_changed(on).await;
        } else {
            warn!("Failed to turn radio {}; will retry on the next eligible tick", target);
            self.notifier.actuation_failed(on).await;
        }

        self.journal
            .record(JournalEntry::actuation(decision.action, ok, reason))
            .await;
        ok
    }

    fn log_decision(&mut self, snapshot: &Snapshot, decision: &Decision) {
        debug!(
            "Tick: wired={} radio={} network={:?} phase={} action={} next={}s",
            snapshot.wired_active,
            snapshot.radio,
            snapshot.network,
            decision.phase.as_str(),
            decision.action.as_str(),
            decision.next_poll_delay.as_secs()
        );

        if self.last_phase != Some(decision.phase) {
            info!(
                "Phase: {} -> {}",
                self.last_phase.map_or("start", |p| p.as_str()),
                decision.phase.as_str()
            );
            self.last_phase = Some(decision.phase);
        }

        match &decision.suppressed {
            Some(s @ Suppression::Cooldown { .. }) => {
                info!("Radio change held back: {}", describe_suppression(s))
            }
            Some(s @ Suppression::Debounce { .. }) => {
                info!("Wired signal settling: {}", describe_suppression(s))
            }
            None => {}
        }

        if decision.drift != self.last_drift {
            if let Some(observed) = decision.drift {
                info!(
                    "Radio reads {} but was last set {}; leaving manual change alone",
                    observed,
                    self.arbiter.state().last_radio_state
                );
            }
            self.last_drift = decision.drift;
        }
    }

    /// Log, notify and journal the state seen at startup
    pub async fn announce_startup(&self, snapshot: &Snapshot) {
        let summary = format!("{}, radio {}", wired_summary(snapshot), snapshot.radio);
        info!("Radiogate started: {}", summary);
        if let Some(network) = &snapshot.network {
            let home = self.arbiter.config().is_home_network(Some(network));
            info!("Associated with {}{}", network, if home { " (home)" } else { "" });
        }
        self.notifier
            .startup(snapshot.wired_active, snapshot.radio.as_str())
            .await;
        self.journal.record(JournalEntry::startup(summary)).await;
    }

    /// First tick: announce the state as found, before anything is changed
    pub async fn start(&mut self) -> TickOutcome {
        let snapshot = self.sampler.sample().await;
        self.announce_startup(&snapshot).await;
        self.apply(snapshot, Instant::now()).await
    }

    /// Run until the shutdown channel flips to `true`
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut first = true;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = if first {
                first = false;
                tokio::select! {
                    outcome = self.start() => outcome,
                    _ = shutdown.changed() => break,
                }
            } else {
                tokio::select! {
                    outcome = self.tick() => outcome,
                    _ = shutdown.changed() => break,
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(outcome.decision.next_poll_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Poll loop stopped");
        self.journal.record(JournalEntry::shutdown()).await;
    }
}

fn wired_summary(snapshot: &Snapshot) -> String {
    let active = snapshot.active_devices();
    if active.is_empty() {
        "no wired link".to_string()
    } else {
        format!("wired link on {}", active.join(", "))
    }
}

fn describe_suppression(suppression: &Suppression) -> String {
    match suppression {
        Suppression::Debounce { remaining } => {
            format!("debounce, {:.1}s until stable", remaining.as_secs_f64())
        }
        Suppression::Cooldown { remaining } => {
            format!("cooldown, {:.1}s left", remaining.as_secs_f64())
        }
    }
}
