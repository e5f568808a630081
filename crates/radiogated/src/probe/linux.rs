//! Linux backend
//!
//! Sources:
//! - /sys/class/net (ports, carrier, operstate, wireless flag)
//! - ip -o -4 addr show dev X
//! - nmcli radio wifi (rfkill when NetworkManager is absent or down)
//! - iw dev X link (nmcli when iw is absent or fails)

use super::command::run_checked;
use super::{verify_power, RadioActuator, SignalProbe};
use async_trait::async_trait;
use radiogate_common::classify::routable;
use radiogate_common::{Config, HardwarePort, ProbeError, RadioState};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SYSFS_NET: &str = "/sys/class/net";

pub struct LinuxBackend {
    sysfs_root: PathBuf,
    wireless_device: Option<String>,
    timeout: Duration,
    verify_delay: Duration,
}

impl LinuxBackend {
    pub fn new(config: &Config) -> Self {
        Self::with_sysfs_root(SYSFS_NET, config)
    }

    pub fn with_sysfs_root(root: impl Into<PathBuf>, config: &Config) -> Self {
        let sysfs_root = root.into();
        let wireless_device = config
            .radio
            .device
            .clone()
            .or_else(|| detect_wireless_device(&sysfs_root));

        match &wireless_device {
            Some(device) => info!("Wireless device: {}", device),
            None => warn!("No wireless device found; radio state will read unknown"),
        }

        Self {
            sysfs_root,
            wireless_device,
            timeout: config.command_timeout(),
            verify_delay: config.verify_delay(),
        }
    }

    async fn set_power_command(&self, on: bool) -> Result<(), ProbeError> {
        let state = if on { "on" } else { "off" };
        match run_checked("nmcli", &["radio", "wifi", state], self.timeout).await {
            Err(e) if tool_unavailable(&e) => {
                debug!("nmcli unusable ({}), using rfkill", e);
                let verb = if on { "unblock" } else { "block" };
                run_checked("rfkill", &[verb, "wifi"], self.timeout).await?;
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }
}

/// Missing binary or a non-zero exit (e.g. NetworkManager not running):
/// try the other tool.
pub fn tool_unavailable(err: &ProbeError) -> bool {
    matches!(err, ProbeError::Spawn { .. } | ProbeError::CommandFailed { .. })
}

/// Physical ports only: virtual interfaces have no `device` link.
pub fn list_ports(root: &Path) -> std::io::Result<Vec<HardwarePort>> {
    let mut ports = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if !path.join("device").exists() {
            continue;
        }
        let wireless = is_wireless(&path);
        ports.push(HardwarePort {
            name: name.clone(),
            device: name,
            wireless,
        });
    }
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ports)
}

fn is_wireless(iface_path: &Path) -> bool {
    iface_path.join("wireless").exists() || iface_path.join("phy80211").exists()
}

fn detect_wireless_device(root: &Path) -> Option<String> {
    list_ports(root)
        .ok()?
        .into_iter()
        .find(|p| p.wireless)
        .map(|p| p.device)
}

/// `carrier` reads EINVAL while the interface is administratively down,
/// so fall back to `operstate`.
pub fn read_link_active(root: &Path, device: &str) -> Result<bool, ProbeError> {
    let iface = root.join(device);
    if let Ok(carrier) = fs::read_to_string(iface.join("carrier")) {
        return Ok(carrier.trim() == "1");
    }
    let operstate = fs::read_to_string(iface.join("operstate"))?;
    Ok(operstate.trim() == "up")
}

/// First routable address from `ip -o -4 addr show`, else the first one.
pub fn parse_ip_addr(output: &str) -> Option<Ipv4Addr> {
    let addrs: Vec<Ipv4Addr> = output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let idx = parts.iter().position(|p| *p == "inet")?;
            let cidr = parts.get(idx + 1)?;
            cidr.split('/').next()?.parse().ok()
        })
        .collect();

    addrs
        .iter()
        .copied()
        .find(|a| routable(Some(*a)).is_some())
        .or_else(|| addrs.first().copied())
}

pub fn parse_nmcli_radio(output: &str) -> RadioState {
    match output.trim().to_lowercase().as_str() {
        "enabled" => RadioState::On,
        "disabled" => RadioState::Off,
        _ => RadioState::Unknown,
    }
}

/// Any blocked wifi rfkill switch means off.
pub fn parse_rfkill_list(output: &str) -> RadioState {
    let mut seen = false;
    for line in output.lines() {
        let line = line.trim().to_lowercase();
        if line.starts_with("soft blocked:") || line.starts_with("hard blocked:") {
            seen = true;
            if line.ends_with("yes") {
                return RadioState::Off;
            }
        }
    }
    if seen {
        RadioState::On
    } else {
        RadioState::Unknown
    }
}

pub fn parse_iw_link(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("SSID:"))
        .map(|ssid| ssid.trim().to_string())
        .filter(|ssid| !ssid.is_empty())
}

/// `nmcli -t -f active,ssid dev wifi` lines look like `yes:Home-5G`.
pub fn parse_nmcli_active_ssid(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("yes:"))
        .map(|ssid| ssid.replace("\\:", ":"))
        .filter(|ssid| !ssid.is_empty())
}

#[async_trait]
impl SignalProbe for LinuxBackend {
    async fn hardware_ports(&self) -> Result<Vec<HardwarePort>, ProbeError> {
        Ok(list_ports(&self.sysfs_root)?)
    }

    async fn is_link_active(&self, device: &str) -> Result<bool, ProbeError> {
        read_link_active(&self.sysfs_root, device)
    }

    async fn ipv4_address(&self, device: &str) -> Result<Option<Ipv4Addr>, ProbeError> {
        let out = run_checked("ip", &["-o", "-4", "addr", "show", "dev", device], self.timeout).await?;
        Ok(parse_ip_addr(&out))
    }

    async fn radio_power(&self) -> RadioState {
        match run_checked("nmcli", &["radio", "wifi"], self.timeout).await {
            Ok(out) => {
                let state = parse_nmcli_radio(&out);
                if !state.is_known() {
                    warn!("Unexpected nmcli radio output: {}", out);
                }
                state
            }
            Err(e) if tool_unavailable(&e) => {
                debug!("nmcli unusable ({}), reading rfkill", e);
                match run_checked("rfkill", &["list", "wifi"], self.timeout).await {
                    Ok(out) => parse_rfkill_list(&out),
                    Err(e) => {
                        warn!("Cannot read radio power: {}", e);
                        RadioState::Unknown
                    }
                }
            }
            Err(e) => {
                warn!("Cannot read radio power: {}", e);
                RadioState::Unknown
            }
        }
    }

    async fn associated_network(&self) -> Option<String> {
        let device = self.wireless_device.as_deref()?;
        match run_checked("iw", &["dev", device, "link"], self.timeout).await {
            Ok(out) => parse_iw_link(&out),
            Err(e) if tool_unavailable(&e) => {
                debug!("iw unusable ({}), asking nmcli", e);
                let out = run_checked("nmcli", &["-t", "-f", "active,ssid", "dev", "wifi"], self.timeout)
                    .await
                    .map_err(|e| debug!("Cannot read associated network: {}", e))
                    .ok()?;
                parse_nmcli_active_ssid(&out)
            }
            Err(e) => {
                debug!("Cannot read associated network: {}", e);
                None
            }
        }
    }

    fn wireless_device(&self) -> Option<&str> {
        self.wireless_device.as_deref()
    }
}

#[async_trait]
impl RadioActuator for LinuxBackend {
    async fn set_radio_power(&self, on: bool) -> bool {
        if let Err(e) = self.set_power_command(on).await {
            warn!("Failed to turn radio {}: {}", if on { "on" } else { "off" }, e);
            return false;
        }
        verify_power(self, on, self.verify_delay).await
    }
}
