//! macOS backend - networksetup, ifconfig and ipconfig

use super::command::{run_checked, run_command};
use super::{verify_power, RadioActuator, SignalProbe};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use radiogate_common::classify::is_wifi_port_name;
use radiogate_common::{Config, HardwarePort, ProbeError, RadioState};
use regex::Regex;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

const NETWORKSETUP: &str = "/usr/sbin/networksetup";
const IFCONFIG: &str = "/sbin/ifconfig";
const IPCONFIG: &str = "/usr/sbin/ipconfig";

static CURRENT_NETWORK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Current Wi-Fi Network:\s*(.+)").expect("static regex")
});

pub struct MacBackend {
    wireless_device: Option<String>,
    timeout: Duration,
    verify_delay: Duration,
}

impl MacBackend {
    /// Resolve the Wi-Fi device from the hardware port table unless configured.
    pub async fn connect(config: &Config) -> Self {
        let timeout = config.command_timeout();
        let wireless_device = match &config.radio.device {
            Some(device) => Some(device.clone()),
            None => match run_checked(NETWORKSETUP, &["-listallhardwareports"], timeout).await {
                Ok(out) => parse_hardware_ports(&out)
                    .into_iter()
                    .find(|p| p.wireless)
                    .map(|p| p.device),
                Err(e) => {
                    warn!("Cannot list hardware ports: {}", e);
                    None
                }
            },
        };

        match &wireless_device {
            Some(device) => info!("Wireless device: {}", device),
            None => warn!("No Wi-Fi hardware port found; radio state will read unknown"),
        }

        Self {
            wireless_device,
            timeout,
            verify_delay: config.verify_delay(),
        }
    }

    fn device(&self) -> Result<&str, ProbeError> {
        self.wireless_device
            .as_deref()
            .ok_or_else(|| ProbeError::Unsupported("no Wi-Fi device".to_string()))
    }
}

/// Blocks of `Hardware Port:` / `Device:` / `Ethernet Address:`.
/// Ports without a device (e.g. "Bluetooth PAN" on some models) are kept out.
pub fn parse_hardware_ports(output: &str) -> Vec<HardwarePort> {
    let mut ports = Vec::new();
    let mut current: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix("Hardware Port:") {
            current = Some(name.trim().to_string());
        } else if let Some(device) = line.strip_prefix("Device:") {
            let device = device.trim();
            if let Some(name) = current.take() {
                if device.is_empty() {
                    continue;
                }
                let wireless = is_wifi_port_name(&name);
                ports.push(HardwarePort {
                    name,
                    device: device.to_string(),
                    wireless,
                });
            }
        }
    }
    ports
}

pub fn parse_ifconfig_active(output: &str) -> bool {
    output
        .lines()
        .map(str::trim)
        .any(|line| line == "status: active")
}

/// `Wi-Fi Power (en0): On`
pub fn parse_airport_power(output: &str) -> RadioState {
    let lower = output.trim().to_lowercase();
    if lower.ends_with(": on") {
        RadioState::On
    } else if lower.ends_with(": off") {
        RadioState::Off
    } else {
        RadioState::Unknown
    }
}

/// `Current Wi-Fi Network: Home-5G`; anything else means not associated.
pub fn parse_airport_network(output: &str) -> Option<String> {
    CURRENT_NETWORK
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|ssid| !ssid.is_empty())
}

#[async_trait]
impl SignalProbe for MacBackend {
    async fn hardware_ports(&self) -> Result<Vec<HardwarePort>, ProbeError> {
        let out = run_checked(NETWORKSETUP, &["-listallhardwareports"], self.timeout).await?;
        let ports = parse_hardware_ports(&out);
        if ports.is_empty() {
            return Err(ProbeError::Parse("no hardware ports listed".to_string()));
        }
        Ok(ports)
    }

    async fn is_link_active(&self, device: &str) -> Result<bool, ProbeError> {
        let out = run_checked(IFCONFIG, &[device], self.timeout).await?;
        Ok(parse_ifconfig_active(&out))
    }

    async fn ipv4_address(&self, device: &str) -> Result<Option<Ipv4Addr>, ProbeError> {
        // Exits non-zero when the interface holds no address.
        let out = run_command(IPCONFIG, &["getifaddr", device], self.timeout).await?;
        if !out.success {
            return Ok(None);
        }
        out.stdout
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ProbeError::Parse(format!("bad address from ipconfig: {}", out.stdout)))
    }

    async fn radio_power(&self) -> RadioState {
        let device = match self.device() {
            Ok(d) => d,
            Err(_) => return RadioState::Unknown,
        };
        match run_checked(NETWORKSETUP, &["-getairportpower", device], self.timeout).await {
            Ok(out) => {
                let state = parse_airport_power(&out);
                if !state.is_known() {
                    warn!("Unexpected airport power output: {}", out);
                }
                state
            }
            Err(e) => {
                warn!("Cannot read radio power: {}", e);
                RadioState::Unknown
            }
        }
    }

    async fn associated_network(&self) -> Option<String> {
        let device = self.device().ok()?;
        match run_checked(NETWORKSETUP, &["-getairportnetwork", device], self.timeout).await {
            Ok(out) => parse_airport_network(&out),
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
impl RadioActuator for MacBackend {
    async fn set_radio_power(&self, on: bool) -> bool {
        let state = if on { "on" } else { "off" };
        let result = match self.device() {
            Ok(device) => {
                run_checked(NETWORKSETUP, &["-setairportpower", device, state], self.timeout).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to turn radio {}: {}", state, e);
            return false;
        }
        verify_power(self, on, self.verify_delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTS: &str = "\
Hardware Port: Thunderbolt Ethernet Slot 1
Device: en10
Ethernet Address: 64:4b:f0:11:22:33

Hardware Port: Wi-Fi
Device: en0
Ethernet Address: a4:83:e7:44:55:66

Hardware Port: Thunderbolt Bridge
Device: bridge0
Ethernet Address: 36:80:aa:77:88:99

Hardware Port: Bluetooth PAN
Device:
Ethernet Address: N/A

VLAN Configurations
===================
";

    #[test]
    fn test_parse_hardware_ports() {
        let ports = parse_hardware_ports(PORTS);
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0].name, "Thunderbolt Ethernet Slot 1");
        assert_eq!(ports[0].device, "en10");
        assert!(!ports[0].wireless);
        assert!(ports[1].wireless);
        assert_eq!(ports[2].device, "bridge0");
    }

    #[test]
    fn test_parse_ifconfig_status() {
        let up = "en10: flags=8863<UP,BROADCAST,SMART,RUNNING,SIMPLEX,MULTICAST> mtu 1500\n\
                  \tether 64:4b:f0:11:22:33\n\
                  \tinet 10.0.0.5 netmask 0xffffff00 broadcast 10.0.0.255\n\
                  \tstatus: active";
        let down = "en10: flags=8822<BROADCAST,SMART,SIMPLEX,MULTICAST> mtu 1500\n\tstatus: inactive";
        assert!(parse_ifconfig_active(up));
        assert!(!parse_ifconfig_active(down));
    }

    #[test]
    fn test_parse_airport_power() {
        assert_eq!(parse_airport_power("Wi-Fi Power (en0): On"), RadioState::On);
        assert_eq!(parse_airport_power("Wi-Fi Power (en0): Off\n"), RadioState::Off);
        assert_eq!(
            parse_airport_power("en9 is not a Wi-Fi interface."),
            RadioState::Unknown
        );
    }

    #[test]
    fn test_parse_airport_network() {
        assert_eq!(
            parse_airport_network("Current Wi-Fi Network: Marketing 5.0GHz"),
            Some("Marketing 5.0GHz".to_string())
        );
        assert_eq!(
            parse_airport_network("You are not associated with an AirPort network."),
            None
        );
    }
}
