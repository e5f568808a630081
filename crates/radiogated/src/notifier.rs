//! Notification system - tells the user when the radio was switched
//!
//! Supports:
//! - notify-send on Linux desktops
//! - terminal-notifier on macOS when installed, osascript otherwise
//!
//! Delivery is best effort. Failures are logged and never reach the poll loop.

use crate::probe::command::{run_command, CommandOutput};
use async_trait::async_trait;
use radiogate_common::config::{NotificationConfig, Platform};
use radiogate_common::ProbeError;
use std::time::Duration;
use tracing::{debug, warn};

const APP_NAME: &str = "Radiogate";
const TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_SOUND: &str = "Funk";

/// Notification urgency level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationUrgency {
    Low,
    Normal,
    Critical,
}

impl NotificationUrgency {
    fn as_str(&self) -> &'static str {
        match self {
            NotificationUrgency::Low => "low",
            NotificationUrgency::Normal => "normal",
            NotificationUrgency::Critical => "critical",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, message: &str, urgency: NotificationUrgency);

    async fn radio_changed(&self, turned_on: bool) {
        if turned_on {
            self.send(
                "Wi-Fi turned on",
                "Wired link gone, Wi-Fi switched on",
                NotificationUrgency::Normal,
            )
            .await;
        } else {
            self.send(
                "Wi-Fi turned off",
                "Wired link active, Wi-Fi switched off",
                NotificationUrgency::Normal,
            )
            .await;
        }
    }

    async fn actuation_failed(&self, turning_on: bool) {
        let message = format!(
            "Could not turn Wi-Fi {}; will retry",
            if turning_on { "on" } else { "off" }
        );
        self.send("Radiogate error", &message, NotificationUrgency::Critical)
            .await;
    }

    async fn startup(&self, wired_active: bool, radio: &str) {
        let message = format!(
            "Wired: {}\nWi-Fi: {}",
            if wired_active { "connected" } else { "disconnected" },
            radio
        );
        self.send("Radiogate started", &message, NotificationUrgency::Low)
            .await;
    }
}

/// Drops every notification
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, title: &str, _message: &str, _urgency: NotificationUrgency) {
        debug!("Notification suppressed: {}", title);
    }
}

pub struct DesktopNotifier {
    platform: Platform,
    sound: Option<String>,
}

impl DesktopNotifier {
    pub fn new(platform: Platform, config: &NotificationConfig) -> Self {
        Self {
            platform: platform.resolve(),
            sound: config.sound.clone(),
        }
    }

    async fn send_linux(&self, title: &str, message: &str, urgency: NotificationUrgency) {
        let args = [
            "--urgency",
            urgency.as_str(),
            "--icon",
            "network-wireless",
            "--app-name",
            APP_NAME,
            title,
            message,
        ];
        report("notify-send", run_command("notify-send", &args, TIMEOUT).await);
    }

    async fn send_macos(&self, title: &str, message: &str, urgency: NotificationUrgency) {
        let sound = match urgency {
            NotificationUrgency::Critical => Some(ERROR_SOUND),
            _ => self.sound.as_deref(),
        };

        if has_program("terminal-notifier").await {
            let mut args = vec!["-title", title, "-message", message, "-group", APP_NAME];
            if let Some(sound) = sound {
                args.extend(["-sound", sound]);
            }
            report(
                "terminal-notifier",
                run_command("terminal-notifier", &args, TIMEOUT).await,
            );
            return;
        }

        let mut script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(message),
            escape_applescript(title)
        );
        if let Some(sound) = sound {
            script.push_str(&format!(" sound name \"{}\"", escape_applescript(sound)));
        }
        report("osascript", run_command("osascript", &["-e", &script], TIMEOUT).await);
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn send(&self, title: &str, message: &str, urgency: NotificationUrgency) {
        debug!("Sending notification: {}", title);
        match self.platform {
            Platform::Macos => self.send_macos(title, message, urgency).await,
            _ => self.send_linux(title, message, urgency).await,
        }
    }
}

async fn has_program(name: &str) -> bool {
    run_command("which", &[name], TIMEOUT)
        .await
        .map(|o| o.success)
        .unwrap_or(false)
}

fn report(tool: &str, result: Result<CommandOutput, ProbeError>) {
    match result {
        Ok(output) if output.success => {}
        Ok(output) => warn!("{} notification failed: {}", tool, output.stderr),
        Err(e) => warn!("Error sending notification: {}", e),
    }
}

/// Quote-safe text for an AppleScript string literal
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
