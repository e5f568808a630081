//! Poll loop tests
//!
//! Drive the sampler, arbiter, actuator, notifier and journal together
//! against an in-memory probe. Ticks use synthetic instants via `apply`.

use async_trait::async_trait;
use radiogate_common::{
    Action, ArbiterConfig, CandidatePolicy, HardwarePort, LinkArbiter, PollPhase, ProbeError,
    RadioState,
};
use radiogated::probe::DryRunActuator;
use radiogated::{
    Journal, JournalEntry, JournalEvent, NotificationUrgency, Notifier, PollLoop, RadioActuator,
    Sampler, SignalProbe,
};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// FAKES
// ============================================================================

#[derive(Default)]
struct FakeState {
    ports: Vec<HardwarePort>,
    links: HashMap<String, bool>,
    addrs: HashMap<String, Ipv4Addr>,
    failing: HashSet<String>,
    ports_fail: bool,
    radio: RadioState,
    network: Option<String>,
}

#[derive(Default)]
struct FakeProbe {
    state: Mutex<FakeState>,
    network_reads: AtomicUsize,
}

impl FakeProbe {
    fn office() -> Arc<Self> {
        let probe = FakeProbe::default();
        {
            let mut s = probe.state.lock().unwrap();
            s.ports = vec![
                HardwarePort::new("Thunderbolt Ethernet Slot 1", "en10"),
                HardwarePort::wireless("Wi-Fi", "en0"),
                HardwarePort::new("Thunderbolt Bridge", "bridge0"),
            ];
            s.links.insert("bridge0".to_string(), true);
            s.addrs.insert("bridge0".to_string(), Ipv4Addr::new(10, 9, 9, 9));
            s.radio = RadioState::On;
        }
        Arc::new(probe)
    }

    fn plug(&self, addr: Option<Ipv4Addr>) {
        let mut s = self.state.lock().unwrap();
        s.links.insert("en10".to_string(), true);
        match addr {
            Some(a) => s.addrs.insert("en10".to_string(), a),
            None => s.addrs.remove("en10"),
        };
    }

    fn unplug(&self) {
        let mut s = self.state.lock().unwrap();
        s.links.insert("en10".to_string(), false);
        s.addrs.remove("en10");
    }

    fn radio(&self) -> RadioState {
        self.state.lock().unwrap().radio
    }

    fn set_radio(&self, radio: RadioState) {
        self.state.lock().unwrap().radio = radio;
    }
}

#[async_trait]
impl SignalProbe for FakeProbe {
    async fn hardware_ports(&self) -> Result<Vec<HardwarePort>, ProbeError> {
        let s = self.state.lock().unwrap();
        if s.ports_fail {
            return Err(ProbeError::Parse("no ports".to_string()));
        }
        Ok(s.ports.clone())
    }

    async fn is_link_active(&self, device: &str) -> Result<bool, ProbeError> {
        let s = self.state.lock().unwrap();
        if s.failing.contains(device) {
            return Err(ProbeError::Timeout {
                command: format!("ifconfig {}", device),
                secs: 5,
            });
        }
        Ok(s.links.get(device).copied().unwrap_or(false))
    }

    async fn ipv4_address(&self, device: &str) -> Result<Option<Ipv4Addr>, ProbeError> {
        Ok(self.state.lock().unwrap().addrs.get(device).copied())
    }

    async fn radio_power(&self) -> RadioState {
        self.radio()
    }

    async fn associated_network(&self) -> Option<String> {
        self.network_reads.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().network.clone()
    }

    fn wireless_device(&self) -> Option<&str> {
        Some("en0")
    }
}

struct FakeActuator {
    probe: Arc<FakeProbe>,
    fail: AtomicBool,
    calls: Mutex<Vec<bool>>,
}

impl FakeActuator {
    fn new(probe: Arc<FakeProbe>) -> Arc<Self> {
        Arc::new(Self {
            probe,
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RadioActuator for FakeActuator {
    async fn set_radio_power(&self, on: bool) -> bool {
        self.calls.lock().unwrap().push(on);
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.probe.set_radio(RadioState::from_power(on));
        true
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, NotificationUrgency)>>,
}

impl RecordingNotifier {
    fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, title: &str, _message: &str, urgency: NotificationUrgency) {
        self.sent.lock().unwrap().push((title.to_string(), urgency));
    }
}

// ============================================================================
// HARNESS
// ============================================================================

fn arbiter_config() -> ArbiterConfig {
    let mut config = ArbiterConfig {
        debounce: Duration::from_secs(2),
        cooldown: Duration::from_secs(4),
        grace: Duration::from_secs(20),
        fast_interval: Duration::from_secs(2),
        idle_interval: Duration::from_secs(60),
        ..ArbiterConfig::default()
    };
    config.home_networks.insert("Home-5G".to_string());
    config
}

fn policy() -> CandidatePolicy {
    CandidatePolicy::new(vec!["Thunderbolt Bridge"], Vec::new())
}

struct Harness {
    probe: Arc<FakeProbe>,
    actuator: Arc<FakeActuator>,
    notifier: Arc<RecordingNotifier>,
    sampler: Sampler,
    poll_loop: PollLoop,
    base: Instant,
}

impl Harness {
    fn new(journal: Journal) -> Self {
        Self::with_config(arbiter_config(), journal)
    }

    fn with_config(config: ArbiterConfig, journal: Journal) -> Self {
        let probe = FakeProbe::office();
        let actuator = FakeActuator::new(probe.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let poll_loop = PollLoop::new(
            LinkArbiter::new(config),
            Sampler::new(probe.clone(), policy()),
            actuator.clone(),
            notifier.clone(),
            journal,
        );
        Self {
            sampler: Sampler::new(probe.clone(), policy()),
            probe,
            actuator,
            notifier,
            poll_loop,
            base: Instant::now(),
        }
    }

    async fn tick_at(&mut self, secs: u64) -> radiogated::TickOutcome {
        let snapshot = self.sampler.sample().await;
        self.poll_loop
            .apply(snapshot, self.base + Duration::from_secs(secs))
            .await
    }
}

fn read_journal(path: &std::path::Path) -> Vec<JournalEntry> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_cable_plug_turns_radio_off_once() {
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("events.jsonl");
    let mut h = Harness::new(Journal::new(Some(journal_path.clone())));

    h.probe.plug(Some(Ipv4Addr::new(192, 168, 1, 40)));
    let first = h.tick_at(0).await;
    assert!(first.snapshot.wired_active);
    assert_eq!(first.decision.phase, PollPhase::Debouncing);
    assert_eq!(first.actuated, None);

    let second = h.tick_at(2).await;
    assert_eq!(second.decision.action, Action::TurnOff);
    assert_eq!(second.actuated, Some(true));
    assert_eq!(h.probe.radio(), RadioState::Off);
    assert_eq!(h.poll_loop.arbiter().state().last_radio_state, RadioState::Off);

    for secs in 3..10 {
        let outcome = h.tick_at(secs).await;
        assert_eq!(outcome.decision.action, Action::None);
        assert_eq!(outcome.decision.phase, PollPhase::WatchingFast);
    }

    assert_eq!(h.actuator.calls(), vec![false]);
    assert_eq!(h.notifier.titles(), vec!["Wi-Fi turned off"]);

    let entries = read_journal(&journal_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event, JournalEvent::Actuation);
    assert_eq!(entries[0].action, Some(Action::TurnOff));
    assert!(entries[0].details.contains("en10"));
}

#[tokio::test]
async fn test_unplug_recovers_radio_with_grace() {
    let mut h = Harness::new(Journal::disabled());

    h.probe.plug(Some(Ipv4Addr::new(10, 0, 0, 5)));
    h.tick_at(0).await;
    h.tick_at(2).await;
    assert_eq!(h.probe.radio(), RadioState::Off);

    h.probe.unplug();
    let settling = h.tick_at(7).await;
    assert!(!settling.snapshot.wired_active);
    assert_eq!(settling.decision.action, Action::None);

    let recovered = h.tick_at(9).await;
    assert_eq!(recovered.decision.action, Action::TurnOn);
    assert!(recovered.decision.recovery);
    assert_eq!(recovered.decision.phase, PollPhase::Grace);
    assert_eq!(h.probe.radio(), RadioState::On);

    // Grace keeps the cadence fast; afterwards the host idles.
    let in_grace = h.tick_at(20).await;
    assert_eq!(in_grace.decision.next_poll_delay, Duration::from_secs(2));
    let idle = h.tick_at(30).await;
    assert_eq!(idle.decision.phase, PollPhase::IdleSleep);
    assert_eq!(idle.decision.next_poll_delay, Duration::from_secs(60));

    assert_eq!(h.actuator.calls(), vec![false, true]);
}

#[tokio::test]
async fn test_self_assigned_address_is_not_a_wired_link() {
    let mut h = Harness::new(Journal::disabled());

    h.probe.plug(Some(Ipv4Addr::new(169, 254, 33, 7)));
    for secs in [0, 2, 4, 6] {
        let outcome = h.tick_at(secs).await;
        assert!(!outcome.snapshot.wired_active);
        assert_eq!(outcome.decision.action, Action::None);
    }
    assert!(h.actuator.calls().is_empty());
    assert_eq!(h.probe.radio(), RadioState::On);
}

#[tokio::test]
async fn test_ignored_port_never_counts() {
    let mut h = Harness::new(Journal::disabled());

    // Only the bridge is up, and it is in the ignore set.
    let outcome = h.tick_at(0).await;
    assert!(!outcome.snapshot.wired_active);
    let devices: Vec<_> = outcome
        .snapshot
        .reports
        .iter()
        .map(|r| r.candidate.device.clone())
        .collect();
    assert_eq!(devices, vec!["en10"]);
}

#[tokio::test]
async fn test_failed_actuation_keeps_state_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("events.jsonl");
    let mut h = Harness::new(Journal::new(Some(journal_path.clone())));
    h.actuator.fail.store(true, Ordering::SeqCst);

    h.probe.plug(Some(Ipv4Addr::new(10, 0, 0, 5)));
    h.tick_at(0).await;
    let failed = h.tick_at(2).await;
    assert_eq!(failed.actuated, Some(false));
    assert_eq!(
        h.poll_loop.arbiter().state().last_radio_state,
        RadioState::Unknown
    );
    assert_eq!(h.poll_loop.arbiter().state().last_toggle_at, None);

    h.actuator.fail.store(false, Ordering::SeqCst);
    let retried = h.tick_at(4).await;
    assert_eq!(retried.actuated, Some(true));
    assert_eq!(h.actuator.calls(), vec![false, false]);

    let sent = h.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent[0].1, NotificationUrgency::Critical);
    assert_eq!(sent[1].0, "Wi-Fi turned off");

    let entries = read_journal(&journal_path);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].success, Some(false));
    assert_eq!(entries[1].success, Some(true));
}

#[tokio::test]
async fn test_probe_failures_degrade_to_no_signal() {
    let mut h = Harness::new(Journal::disabled());
    h.probe.plug(Some(Ipv4Addr::new(10, 0, 0, 5)));
    h.probe.state.lock().unwrap().failing.insert("en10".to_string());

    let outcome = h.tick_at(0).await;
    assert!(!outcome.snapshot.wired_active);
    assert!(outcome.snapshot.reports[0].error.is_some());

    h.probe.state.lock().unwrap().ports_fail = true;
    let outcome = h.tick_at(2).await;
    assert!(outcome.snapshot.reports.is_empty());
    assert!(!outcome.snapshot.wired_active);
}

#[tokio::test]
async fn test_network_read_only_when_radio_not_off() {
    let probe = FakeProbe::office();
    probe.state.lock().unwrap().network = Some("Home-5G".to_string());
    let sampler = Sampler::new(probe.clone(), policy());

    let snapshot = sampler.sample().await;
    assert_eq!(snapshot.network.as_deref(), Some("Home-5G"));
    assert_eq!(probe.network_reads.load(Ordering::SeqCst), 1);

    probe.set_radio(RadioState::Off);
    let snapshot = sampler.sample().await;
    assert_eq!(snapshot.network, None);
    assert_eq!(probe.network_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_home_network_keeps_fast_cadence() {
    let mut h = Harness::new(Journal::disabled());
    h.probe.state.lock().unwrap().network = Some("Home-5G".to_string());

    h.tick_at(0).await;
    let outcome = h.tick_at(40).await;
    assert_eq!(outcome.decision.phase, PollPhase::WatchingFast);
    assert_eq!(outcome.decision.next_poll_delay, Duration::from_secs(2));
    assert!(h.actuator.calls().is_empty());
}

#[tokio::test]
async fn test_dry_run_reports_success_without_change() {
    let probe = FakeProbe::office();
    let dry_run = DryRunActuator::new(probe.clone());
    assert!(dry_run.set_radio_power(false).await);
    assert_eq!(probe.radio(), RadioState::On);
}

#[tokio::test]
async fn test_run_stops_on_shutdown_during_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("events.jsonl");
    let Harness {
        mut poll_loop,
        notifier,
        ..
    } = Harness::new(Journal::new(Some(journal_path.clone())));

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move {
        poll_loop.run(rx).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poll loop did not stop")
        .unwrap();

    assert_eq!(notifier.titles(), vec!["Radiogate started"]);
    let events: Vec<_> = read_journal(&journal_path)
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(events, vec![JournalEvent::Startup, JournalEvent::Shutdown]);
}

#[tokio::test]
async fn test_startup_reports_state_before_first_actuation() {
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("events.jsonl");
    let config = ArbiterConfig {
        trust_initial_observation: true,
        ..arbiter_config()
    };
    let Harness {
        mut poll_loop,
        probe,
        notifier,
        ..
    } = Harness::with_config(config, Journal::new(Some(journal_path.clone())));
    probe.plug(Some(Ipv4Addr::new(192, 168, 1, 40)));

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move {
        poll_loop.run(rx).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poll loop did not stop")
        .unwrap();

    assert_eq!(probe.radio(), RadioState::Off);
    assert_eq!(
        notifier.titles(),
        vec!["Radiogate started", "Wi-Fi turned off"]
    );

    let entries = read_journal(&journal_path);
    let events: Vec<_> = entries.iter().map(|e| e.event).collect();
    assert_eq!(
        events,
        vec![
            JournalEvent::Startup,
            JournalEvent::Actuation,
            JournalEvent::Shutdown
        ]
    );
    assert!(entries[0].details.ends_with("radio on"));
    assert!(entries[0].details.contains("en10"));
}
