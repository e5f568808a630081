//! Sampler - one consistent read of every signal the arbiter needs
//!
//! Nothing here fails. Port listing errors mean no candidates, per-device
//! errors mean that device is inactive, radio errors mean `Unknown`.

use crate::probe::SignalProbe;
use radiogate_common::classify::{aggregate, wired_candidates, CandidatePolicy, LinkReport};
use radiogate_common::{RadioState, WiredCandidate};
use std::sync::Arc;
use tracing::{debug, warn};

/// Signals observed on one tick
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub wired_active: bool,
    pub reports: Vec<LinkReport>,
    pub radio: RadioState,
    pub network: Option<String>,
}

impl Snapshot {
    /// Candidates that counted as really active
    pub fn active_devices(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.is_really_active())
            .map(|r| r.candidate.device.as_str())
            .collect()
    }
}

pub struct Sampler {
    probe: Arc<dyn SignalProbe>,
    policy: CandidatePolicy,
}

impl Sampler {
    pub fn new(probe: Arc<dyn SignalProbe>, policy: CandidatePolicy) -> Self {
        let detected = probe.wireless_device().map(str::to_string);
        let policy = match detected {
            Some(device) if policy.wireless_device.is_none() => policy.with_wireless_device(device),
            _ => policy,
        };
        Self { probe, policy }
    }

    pub fn probe(&self) -> &Arc<dyn SignalProbe> {
        &self.probe
    }

    pub async fn sample(&self) -> Snapshot {
        let candidates = match self.probe.hardware_ports().await {
            Ok(ports) => wired_candidates(&ports, &self.policy),
            Err(e) => {
                warn!("Cannot list hardware ports: {}", e);
                Vec::new()
            }
        };

        let mut reports = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            reports.push(self.probe_candidate(candidate).await);
        }
        let wired_active = aggregate(&reports);

        let radio = self.probe.radio_power().await;
        let network = if radio == RadioState::Off {
            None
        } else {
            self.probe.associated_network().await
        };

        Snapshot {
            wired_active,
            reports,
            radio,
            network,
        }
    }

    /// Address is only read once the link is up.
    async fn probe_candidate(&self, candidate: WiredCandidate) -> LinkReport {
        let link_active = match self.probe.is_link_active(&candidate.device).await {
            Ok(up) => up,
            Err(e) => {
                warn!("Link probe failed for {}: {}", candidate, e);
                return LinkReport {
                    candidate,
                    link_active: false,
                    address: None,
                    error: Some(e.to_string()),
                };
            }
        };

        if !link_active {
            debug!("  {}: link down", candidate);
            return LinkReport {
                candidate,
                link_active,
                address: None,
                error: None,
            };
        }

        match self.probe.ipv4_address(&candidate.device).await {
            Ok(address) => {
                debug!("  {}: link up, address {:?}", candidate, address);
                LinkReport {
                    candidate,
                    link_active,
                    address,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Address probe failed for {}: {}", candidate, e);
                LinkReport {
                    candidate,
                    link_active,
                    address: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
