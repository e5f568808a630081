//! Signal probes and radio actuators
//!
//! The arbiter never touches the OS. Everything it needs arrives through
//! `SignalProbe`, and every radio change goes out through `RadioActuator`.
//! Backends:
//! - linux: /sys/class/net, ip, nmcli (rfkill fallback), iw
//! - macos: networksetup, ifconfig, ipconfig

pub mod command;
pub mod dry_run;
pub mod linux;
pub mod macos;

use async_trait::async_trait;
use radiogate_common::config::Platform;
use radiogate_common::{Config, HardwarePort, ProbeError, RadioState};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use dry_run::DryRunActuator;
pub use linux::LinuxBackend;
pub use macos::MacBackend;

/// Read-only view of link and radio signals
#[async_trait]
pub trait SignalProbe: Send + Sync {
    /// Hardware port table (port identifier to device identifier)
    async fn hardware_ports(&self) -> Result<Vec<HardwarePort>, ProbeError>;

    /// Link-layer carrier on `device`
    async fn is_link_active(&self, device: &str) -> Result<bool, ProbeError>;

    /// IPv4 address held by `device`, if any
    async fn ipv4_address(&self, device: &str) -> Result<Option<Ipv4Addr>, ProbeError>;

    /// Never fails: anything unreadable is `Unknown`
    async fn radio_power(&self) -> RadioState;

    /// Currently associated network name, if any
    async fn associated_network(&self) -> Option<String>;

    /// Wireless device the radio calls operate on
    fn wireless_device(&self) -> Option<&str>;
}

/// Turns the wireless radio on or off
#[async_trait]
pub trait RadioActuator: Send + Sync {
    /// True only when the change is confirmed by a fresh read
    async fn set_radio_power(&self, on: bool) -> bool;
}

/// Probe and actuator for the running platform
pub struct Backends {
    pub probe: Arc<dyn SignalProbe>,
    pub actuator: Arc<dyn RadioActuator>,
}

/// Build the backends selected by `config.platform`
pub async fn connect(config: &Config, dry_run: bool) -> Backends {
    let platform = config.platform.resolve();
    info!("Using {:?} backend", platform);

    let (probe, actuator): (Arc<dyn SignalProbe>, Arc<dyn RadioActuator>) = match platform {
        Platform::Macos => {
            let backend = Arc::new(MacBackend::connect(config).await);
            let probe: Arc<dyn SignalProbe> = backend.clone();
            let actuator: Arc<dyn RadioActuator> = backend;
            (probe, actuator)
        }
        _ => {
            let backend = Arc::new(LinuxBackend::new(config));
            let probe: Arc<dyn SignalProbe> = backend.clone();
            let actuator: Arc<dyn RadioActuator> = backend;
            (probe, actuator)
        }
    };

    if dry_run {
        info!("Dry run: radio changes will be logged, not performed");
        return Backends {
            actuator: Arc::new(DryRunActuator::new(probe.clone())),
            probe,
        };
    }

    Backends { probe, actuator }
}

/// Wait for the radio to settle, then confirm it reached the wanted state
pub(crate) async fn verify_power<P>(probe: &P, on: bool, settle: Duration) -> bool
where
    P: SignalProbe + ?Sized,
{
    tokio::time::sleep(settle).await;
    let expected = RadioState::from_power(on);
    let observed = probe.radio_power().await;
    if observed != expected {
        warn!(
            "Radio power set to {}, but it reads {}",
            expected, observed
        );
        return false;
    }
    true
}
