//! Link arbiter - the wired-vs-wireless decision engine
//!
//! One evaluation per poll tick, strictly in this order:
//!
//! 1. Debounce: a changed wired signal is not acted on until it has been
//!    stable for the debounce window.
//! 2. Recovery: wired gone while the confirmed radio state is Off is the
//!    canonical "turn it back on" case. Cooldown still applies.
//! 3. Desired state: radio on iff wired is not active.
//! 4. Cooldown: at most one successful actuation per cooldown window.
//! 5. Grace: emitting TurnOn opens (or extends) a fast-polling window.
//! 6. Home network: affects polling cadence only, never the on/off decision.
//! 7. Cadence: idle interval only when no cable, not home and not in grace.
//!
//! The arbiter has no clock and performs no I/O. Callers pass `now`, act on
//! the returned `Decision`, and report the outcome via `confirm_actuation`.

use crate::types::{Action, Decision, PollPhase, RadioState, Suppression};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// Timing rules and home networks, injected as plain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterConfig {
    pub debounce: Duration,
    pub cooldown: Duration,
    pub grace: Duration,
    pub fast_interval: Duration,
    pub idle_interval: Duration,
    pub home_networks: BTreeSet<String>,
    /// Treat the first observation after start as already stable.
    pub trust_initial_observation: bool,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            cooldown: Duration::from_secs(8),
            grace: Duration::from_secs(20),
            fast_interval: Duration::from_secs(2),
            idle_interval: Duration::from_secs(60),
            home_networks: BTreeSet::new(),
            trust_initial_observation: false,
        }
    }
}

impl ArbiterConfig {
    pub fn is_home_network(&self, network: Option<&str>) -> bool {
        match network {
            Some(name) if !name.is_empty() => self.home_networks.contains(name),
            _ => false,
        }
    }
}

/// Mutable timing state. `None` timestamps mean "long ago".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArbiterState {
    pub last_wired_active: Option<bool>,
    pub last_change_at: Option<Instant>,
    /// Only advanced by a confirmed successful actuation.
    pub last_radio_state: RadioState,
    /// Only advanced by a confirmed successful actuation.
    pub last_toggle_at: Option<Instant>,
    /// Only ever moves forward.
    pub grace_until: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct LinkArbiter {
    config: ArbiterConfig,
    state: ArbiterState,
}

impl LinkArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            state: ArbiterState::default(),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn state(&self) -> &ArbiterState {
        &self.state
    }

    /// Decide what to do this tick.
    ///
    /// `radio` is the probed power state; `associated_network` the current
    /// network name, if any.
    pub fn evaluate(
        &mut self,
        now: Instant,
        wired_active: bool,
        radio: RadioState,
        associated_network: Option<&str>,
    ) -> Decision {
        let drift = self.drift(radio);

        if self.state.last_wired_active != Some(wired_active) {
            let first = self.state.last_wired_active.is_none();
            self.state.last_wired_active = Some(wired_active);
            self.state.last_change_at = if first && self.config.trust_initial_observation {
                None
            } else {
                Some(now)
            };
            debug!(wired_active, first, "wired signal changed");
        }

        if let Some(remaining) = self.debounce_remaining(now) {
            return Decision {
                action: Action::None,
                next_poll_delay: self.config.fast_interval,
                phase: PollPhase::Debouncing,
                suppressed: Some(Suppression::Debounce { remaining }),
                recovery: false,
                drift,
            };
        }

        let recovery = !wired_active && self.state.last_radio_state == RadioState::Off;

        let desired = RadioState::from_power(!wired_active);
        let believed = if self.state.last_radio_state.is_known() {
            self.state.last_radio_state
        } else {
            radio
        };

        let mut action = Action::None;
        let mut suppressed = None;
        if believed != desired {
            match self.cooldown_remaining(now) {
                None => {
                    action = if desired == RadioState::On {
                        Action::TurnOn
                    } else {
                        Action::TurnOff
                    };
                }
                Some(remaining) => {
                    suppressed = Some(Suppression::Cooldown { remaining });
                }
            }
        }

        if action == Action::TurnOn {
            match now.checked_add(self.config.grace) {
                Some(until) if self.state.grace_until.map_or(true, |g| until > g) => {
                    self.state.grace_until = Some(until);
                }
                Some(_) => {}
                None => debug!("grace window past the clock range, not extended"),
            }
        }

        let in_home = self.config.is_home_network(associated_network);
        let in_grace = self.state.grace_until.map_or(false, |g| now < g);

        let (next_poll_delay, phase) = if !wired_active && !in_home && !in_grace {
            (self.config.idle_interval, PollPhase::IdleSleep)
        } else if in_grace {
            (self.config.fast_interval, PollPhase::Grace)
        } else {
            (self.config.fast_interval, PollPhase::WatchingFast)
        };

        Decision {
            action,
            next_poll_delay,
            phase,
            suppressed,
            recovery,
            drift,
        }
    }

    /// Report the outcome of an actuation requested by `evaluate`.
    ///
    /// A failure leaves the belief and the cooldown anchor untouched, so the
    /// next eligible tick retries.
    pub fn confirm_actuation(&mut self, succeeded: bool, observed: RadioState, now: Instant) {
        if !succeeded {
            debug!(observed = %observed, "actuation failed, state unchanged");
            return;
        }
        self.state.last_radio_state = observed;
        self.state.last_toggle_at = Some(now);
        debug!(radio = %observed, "actuation confirmed");
    }

    fn debounce_remaining(&self, now: Instant) -> Option<Duration> {
        let changed_at = self.state.last_change_at?;
        let stable_for = now.saturating_duration_since(changed_at);
        (stable_for < self.config.debounce).then(|| self.config.debounce - stable_for)
    }

    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let toggled_at = self.state.last_toggle_at?;
        let since = now.saturating_duration_since(toggled_at);
        (since < self.config.cooldown).then(|| self.config.cooldown - since)
    }

    fn drift(&self, probed: RadioState) -> Option<RadioState> {
        let believed = self.state.last_radio_state;
        (believed.is_known() && probed.is_known() && probed != believed).then_some(probed)
    }
}
