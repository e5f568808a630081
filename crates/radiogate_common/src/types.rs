//! Core data model shared by the arbiter and the daemon.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Wireless radio power as observed or believed.
///
/// `Unknown` is a first-class observation (the probe could not tell) and is
/// never coerced to `On` or `Off`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioState {
    On,
    Off,
    #[default]
    Unknown,
}

impl RadioState {
    pub fn from_power(on: bool) -> Self {
        if on {
            RadioState::On
        } else {
            RadioState::Off
        }
    }

    /// `Some(true)` for On, `Some(false)` for Off, `None` for Unknown.
    pub fn as_power(&self) -> Option<bool> {
        match self {
            RadioState::On => Some(true),
            RadioState::Off => Some(false),
            RadioState::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RadioState::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RadioState::On => "on",
            RadioState::Off => "off",
            RadioState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the OS hardware-port table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwarePort {
    /// Port identifier, e.g. "Thunderbolt Ethernet Slot 1" or "enp0s31f6".
    pub name: String,
    /// Device identifier, e.g. "en10".
    pub device: String,
    /// The probe knows this port is the wireless radio.
    pub wireless: bool,
}

impl HardwarePort {
    pub fn new(name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            wireless: false,
        }
    }

    pub fn wireless(name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            wireless: true,
            ..Self::new(name, device)
        }
    }
}

/// A port that passed the ignore/allow rules and may carry the wired link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiredCandidate {
    pub port: String,
    pub device: String,
}

impl fmt::Display for WiredCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.port, self.device)
    }
}

/// What the caller should do to the radio this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    None,
    TurnOn,
    TurnOff,
}

impl Action {
    /// Radio state the action drives towards.
    pub fn target(&self) -> Option<RadioState> {
        match self {
            Action::None => None,
            Action::TurnOn => Some(RadioState::On),
            Action::TurnOff => Some(RadioState::Off),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::TurnOn => "turn_on",
            Action::TurnOff => "turn_off",
        }
    }
}

/// Polling-cadence view of the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Cable present or home network: watch closely.
    WatchingFast,
    /// Wired signal changed recently and is not yet trusted.
    Debouncing,
    /// Radio was just turned on and is still associating.
    Grace,
    /// Away from base with no cable: poll slowly.
    IdleSleep,
}

impl PollPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollPhase::WatchingFast => "watching_fast",
            PollPhase::Debouncing => "debouncing",
            PollPhase::Grace => "grace",
            PollPhase::IdleSleep => "idle_sleep",
        }
    }
}

/// Why a wanted action was held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    Debounce { remaining: Duration },
    Cooldown { remaining: Duration },
}

/// Result of one arbiter evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub next_poll_delay: Duration,
    pub phase: PollPhase,
    pub suppressed: Option<Suppression>,
    /// Wired went away while the confirmed radio state is Off.
    pub recovery: bool,
    /// Probed radio state disagrees with the last confirmed one.
    pub drift: Option<RadioState>,
}

impl Decision {
    pub fn is_action(&self) -> bool {
        self.action != Action::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_state_power_mapping() {
        assert_eq!(RadioState::from_power(true), RadioState::On);
        assert_eq!(RadioState::from_power(false), RadioState::Off);
        assert_eq!(RadioState::On.as_power(), Some(true));
        assert_eq!(RadioState::Unknown.as_power(), None);
        assert!(!RadioState::default().is_known());
    }

    #[test]
    fn test_action_target() {
        assert_eq!(Action::TurnOn.target(), Some(RadioState::On));
        assert_eq!(Action::TurnOff.target(), Some(RadioState::Off));
        assert_eq!(Action::None.target(), None);
    }
}
