//! Wired-link classification.
//!
//! Decides which hardware ports may count as the wired link and whether a
//! probed candidate is really active: link up AND a routable IPv4 address.
//! A self-assigned address (169.254.0.0/16) means the port is physically up
//! but never reached DHCP, so it does not count.

use crate::types::{HardwarePort, WiredCandidate};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Static membership rules for wired candidates.
#[derive(Debug, Clone, Default)]
pub struct CandidatePolicy {
    /// Pseudo-interfaces that never carry real traffic.
    pub ignored_ports: BTreeSet<String>,
    /// When non-empty, only these ports are considered.
    pub allowed_ports: BTreeSet<String>,
    /// Configured wireless device, excluded even if the probe did not flag it.
    pub wireless_device: Option<String>,
}

impl CandidatePolicy {
    pub fn new<I, A, S>(ignored: I, allowed: A) -> Self
    where
        I: IntoIterator<Item = S>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_ports: ignored.into_iter().map(Into::into).collect(),
            allowed_ports: allowed.into_iter().map(Into::into).collect(),
            wireless_device: None,
        }
    }

    pub fn with_wireless_device(mut self, device: impl Into<String>) -> Self {
        self.wireless_device = Some(device.into());
        self
    }

    fn is_wireless(&self, port: &HardwarePort) -> bool {
        if port.wireless || is_wifi_port_name(&port.name) {
            return true;
        }
        self.wireless_device.as_deref() == Some(port.device.as_str())
    }

    /// Whether a single port qualifies as a wired candidate.
    pub fn admits(&self, port: &HardwarePort) -> bool {
        if self.ignored_ports.contains(&port.name) {
            return false;
        }
        if self.is_wireless(port) {
            return false;
        }
        self.allowed_ports.is_empty() || self.allowed_ports.contains(&port.name)
    }
}

/// "Wi-Fi", "wifi", "Wi-Fi 2" and the like.
pub fn is_wifi_port_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower.starts_with("wi-fi") || lower == "wifi" || lower == "airport"
}

/// Filter the port table down to wired candidates, preserving probe order.
pub fn wired_candidates(ports: &[HardwarePort], policy: &CandidatePolicy) -> Vec<WiredCandidate> {
    ports
        .iter()
        .filter(|p| policy.admits(p))
        .map(|p| WiredCandidate {
            port: p.name.clone(),
            device: p.device.clone(),
        })
        .collect()
}

pub fn is_self_assigned(addr: Ipv4Addr) -> bool {
    addr.is_link_local()
}

/// Drop addresses that do not indicate a served link.
pub fn routable(addr: Option<Ipv4Addr>) -> Option<Ipv4Addr> {
    addr.filter(|a| !is_self_assigned(*a) && !a.is_unspecified())
}

pub fn really_active(link_active: bool, addr: Option<Ipv4Addr>) -> bool {
    link_active && routable(addr).is_some()
}

/// Probe outcome for one candidate on one tick.
#[derive(Debug, Clone)]
pub struct LinkReport {
    pub candidate: WiredCandidate,
    pub link_active: bool,
    pub address: Option<Ipv4Addr>,
    /// Set when probing failed; the candidate then counts as inactive.
    pub error: Option<String>,
}

impl LinkReport {
    pub fn is_really_active(&self) -> bool {
        self.error.is_none() && really_active(self.link_active, self.address)
    }
}

/// Aggregate wired-active signal: OR across all candidates.
pub fn aggregate(reports: &[LinkReport]) -> bool {
    reports.iter().any(LinkReport::is_really_active)
}
