//! Dry-run actuator: logs intended radio changes, performs none

use super::{RadioActuator, SignalProbe};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct DryRunActuator {
    probe: Arc<dyn SignalProbe>,
}

impl DryRunActuator {
    pub fn new(probe: Arc<dyn SignalProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl RadioActuator for DryRunActuator {
    async fn set_radio_power(&self, on: bool) -> bool {
        let current = self.probe.radio_power().await;
        info!(
            "[dry-run] Would turn radio {} on {} (currently {})",
            if on { "on" } else { "off" },
            self.probe.wireless_device().unwrap_or("unknown device"),
            current
        );
        true
    }
}
