use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::grading::{MetricKind, MetricValue, Snapshot, SnapshotSource};
use crate::settings::ProbeSettings;

/// Partial lines longer than this are discarded unparsed.
pub const MAX_PARTIAL_LINE: usize = 64 * 1024;

/// Command a live instance runs to answer a probe with one marker line.
pub const PROBE_COMMAND: &str = "tmux display-message -p \
'[[PROBE:sessions:#{server_sessions}]][[PROBE:windows:#{session_windows}]]\
[[PROBE:panes:#{window_panes}]][[PROBE:window_index:#{window_index}]]\
[[PROBE:zoomed:#{window_zoomed_flag}]][[PROBE:sync:#{pane_synchronized}]]\
[[PROBE:in_mode:#{pane_in_mode}]][[PROBE:session_name:#{session_name}]]\
[[PROBE:window_name:#{window_name}]][[PROBE:layout:#{window_layout}]]\
[[PROBE:prefix:#{prefix}]][[PROBE:mouse:#{mouse}]]'";

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSchedulerState {
    pub in_flight: bool,
    pub pending: bool,
    pub pending_reason: Option<String>,
    pub last_dispatched_at: Option<u64>,
    pub last_received_at: Option<u64>,
    pub dispatch_seq: u64,
    pub ack_seq: u64,
    pub skipped_ticks: u64,
    pub stale_recoveries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub reason: String,
    pub now: u64,
    pub stale_timeout_ms: u64,
    pub min_interval_ms: u64,
}

impl ProbeRequest {
    pub fn new(reason: impl Into<String>, now: u64, settings: &ProbeSettings) -> Self {
        ProbeRequest {
            reason: reason.into(),
            now,
            stale_timeout_ms: settings.stale_timeout_ms,
            min_interval_ms: settings.min_interval_ms,
        }
    }
}

/// Decide whether a probe may go out now. Returns the next state and
/// whether the caller should dispatch.
pub fn try_start_probe(state: &ProbeSchedulerState, req: &ProbeRequest) -> (ProbeSchedulerState, bool) {
    let mut next = state.clone();
    if next.in_flight {
        let elapsed = next.last_dispatched_at.map_or(u64::MAX, |at| req.now.saturating_sub(at));
        if elapsed > req.stale_timeout_ms {
            warn!(dispatch_seq = next.dispatch_seq, elapsed, "probe presumed lost, recovering");
            next.in_flight = false;
            next.stale_recoveries += 1;
        }
    }
    let too_soon = next
        .last_dispatched_at
        .is_some_and(|at| req.now.saturating_sub(at) < req.min_interval_ms);
    if next.in_flight || too_soon {
        next.pending = true;
        next.pending_reason = Some(req.reason.clone());
        next.skipped_ticks += 1;
        debug!(reason = %req.reason, in_flight = next.in_flight, "probe deferred");
        return (next, false);
    }
    next.dispatch_seq += 1;
    next.in_flight = true;
    next.last_dispatched_at = Some(req.now);
    next.pending = false;
    next.pending_reason = None;
    info!(reason = %req.reason, dispatch_seq = next.dispatch_seq, "probe dispatched");
    (next, true)
}

pub fn mark_probe_snapshot_received(state: &ProbeSchedulerState, now: u64) -> ProbeSchedulerState {
    let mut next = state.clone();
    next.last_received_at = Some(now);
    if next.in_flight {
        next.in_flight = false;
        next.ack_seq = next.dispatch_seq;
    }
    next
}

/// Take the pending reason, clearing the pending flag.
pub fn consume_pending_probe_reason(state: &ProbeSchedulerState) -> (ProbeSchedulerState, Option<String>) {
    let mut next = state.clone();
    let reason = if next.pending { next.pending_reason.take() } else { None };
    next.pending = false;
    next.pending_reason = None;
    (next, reason)
}

// ---------------------------------------------------------------------------
// Markers and telemetry
// ---------------------------------------------------------------------------

const MARKER_PATTERN: &str = r"\[\[PROBE:([a-z_]+):([^\]\r\n]*)\]\]";

fn marker_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(MARKER_PATTERN) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(error = %e, "telemetry marker pattern failed to compile");
            None
        }
    })
    .as_ref()
}

/// Latest values reported by a live instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTelemetry {
    pub sessions: Option<i64>,
    pub windows: Option<i64>,
    pub panes: Option<i64>,
    pub window_index: Option<i64>,
    pub zoomed: Option<bool>,
    pub sync: Option<bool>,
    pub in_mode: Option<bool>,
    pub session_name: Option<String>,
    pub window_name: Option<String>,
    pub layout: Option<String>,
    pub prefix: Option<String>,
    pub mouse: Option<bool>,
}

impl ProbeTelemetry {
    /// Record one marker. Unknown keys and malformed values change nothing
    /// and return false.
    pub fn apply_marker(&mut self, key: &str, value: &str) -> bool {
        let value = value.trim();
        let number = || value.parse::<i64>().ok();
        let flag = || value.parse::<i64>().ok().map(|n| n != 0);
        let text = || (!value.is_empty()).then(|| value.to_string());
        fn store<T>(slot: &mut Option<T>, v: Option<T>) -> bool {
            match v {
                Some(v) => {
                    *slot = Some(v);
                    true
                }
                None => false,
            }
        }
        match key {
            "sessions" => store(&mut self.sessions, number()),
            "windows" => store(&mut self.windows, number()),
            "panes" => store(&mut self.panes, number()),
            "window_index" => store(&mut self.window_index, number()),
            "zoomed" => store(&mut self.zoomed, flag()),
            "sync" => store(&mut self.sync, flag()),
            "in_mode" => store(&mut self.in_mode, flag()),
            "session_name" => store(&mut self.session_name, text()),
            "window_name" => store(&mut self.window_name, text()),
            "layout" => store(&mut self.layout, text()),
            "prefix" => store(&mut self.prefix, text()),
            "mouse" => {
                let v = match value {
                    "on" => Some(true),
                    "off" => Some(false),
                    _ => flag(),
                };
                store(&mut self.mouse, v)
            }
            _ => false,
        }
    }

    /// Apply every marker on `line`; true when at least one was valid.
    pub fn apply_line(&mut self, line: &str) -> bool {
        let Some(re) = marker_re() else { return false };
        let mut any = false;
        for caps in re.captures_iter(line) {
            if self.apply_marker(&caps[1], &caps[2]) {
                any = true;
            }
        }
        any
    }
}

/// Project live telemetry onto the grading metrics. Copy-mode search and
/// history metrics cannot be observed remotely and stay unsupported.
pub fn live_snapshot(t: &ProbeTelemetry) -> Snapshot {
    use MetricKind as K;
    let mut snap = Snapshot::new(SnapshotSource::Live);
    let num = |v: Option<i64>| v.map(MetricValue::Number);
    let flag = |v: Option<bool>| v.map(MetricValue::Bool);
    let text = |v: &Option<String>| v.clone().map(MetricValue::Text);

    snap.set(K::SessionCount, num(t.sessions));
    snap.set(K::WindowCount, num(t.windows));
    snap.set(K::PaneCount, num(t.panes));
    snap.set(K::ActiveWindowIndex, num(t.window_index));
    snap.set(K::WindowZoomed, flag(t.zoomed));
    snap.set(K::PanesSynchronized, flag(t.sync));
    snap.set(
        K::Mode,
        t.in_mode.map(|m| MetricValue::Text(if m { "COPY_MODE" } else { "NORMAL" }.to_string())),
    );
    snap.set(K::SessionName, text(&t.session_name));
    snap.set(K::WindowName, text(&t.window_name));
    snap.set(K::WindowLayout, text(&t.layout));
    snap.set(K::PrefixKey, text(&t.prefix));
    snap.set(K::MouseEnabled, flag(t.mouse));
    snap
}

/// Splits a chunked output stream into lines and feeds marker lines to
/// the telemetry.
#[derive(Debug, Clone, Default)]
pub struct ProbeStreamParser {
    partial: String,
}

impl ProbeStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `chunk`. Returns how many complete lines carried at least
    /// one valid marker.
    pub fn feed(&mut self, chunk: &str, telemetry: &mut ProbeTelemetry) -> usize {
        self.partial.push_str(chunk);
        let mut snapshots = 0;
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            if telemetry.apply_line(&line) {
                snapshots += 1;
            }
        }
        if self.partial.len() > MAX_PARTIAL_LINE {
            warn!(len = self.partial.len(), "dropping oversized partial line");
            self.partial.clear();
        }
        snapshots
    }

    /// Parse whatever is left once the stream has ended.
    pub fn finish(&mut self, telemetry: &mut ProbeTelemetry) -> usize {
        let rest = std::mem::take(&mut self.partial);
        usize::from(telemetry.apply_line(&rest))
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Sends a probe to the live instance. Delivery is fire-and-forget; the
/// answer arrives later through `ProbeCoordinator::ingest`.
pub trait ProbeTransport {
    fn dispatch(&mut self, reason: &str) -> Result<()>;
}

pub struct ProbeCoordinator<T: ProbeTransport> {
    transport: T,
    settings: ProbeSettings,
    scheduler: ProbeSchedulerState,
    parser: ProbeStreamParser,
    telemetry: ProbeTelemetry,
}

impl<T: ProbeTransport> ProbeCoordinator<T> {
    pub fn new(transport: T, settings: ProbeSettings) -> Self {
        ProbeCoordinator {
            transport,
            settings,
            scheduler: ProbeSchedulerState::default(),
            parser: ProbeStreamParser::new(),
            telemetry: ProbeTelemetry::default(),
        }
    }

    pub fn scheduler(&self) -> &ProbeSchedulerState {
        &self.scheduler
    }

    pub fn telemetry(&self) -> &ProbeTelemetry {
        &self.telemetry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn snapshot(&self) -> Snapshot {
        live_snapshot(&self.telemetry)
    }

    /// Ask for a probe. Returns true when one was dispatched. A failed
    /// dispatch stays in flight until stale recovery releases it.
    pub fn request(&mut self, reason: &str, now: u64) -> bool {
        let (next, dispatch) = try_start_probe(&self.scheduler, &ProbeRequest::new(reason, now, &self.settings));
        self.scheduler = next;
        if !dispatch {
            return false;
        }
        if let Err(err) = self.transport.dispatch(reason) {
            warn!(reason, "probe dispatch failed: {:#}", err);
        }
        true
    }

    /// Retry a deferred request, if any.
    pub fn tick(&mut self, now: u64) -> bool {
        let (next, reason) = consume_pending_probe_reason(&self.scheduler);
        self.scheduler = next;
        match reason {
            Some(reason) => self.request(&reason, now),
            None => false,
        }
    }

    /// Feed live output. Acknowledges the in-flight probe when a marker
    /// line arrives, then retries anything deferred.
    pub fn ingest(&mut self, chunk: &str, now: u64) -> usize {
        let snapshots = self.parser.feed(chunk, &mut self.telemetry);
        if snapshots > 0 {
            self.acknowledge(now);
        }
        snapshots
    }

    /// Drain the parser at end of stream.
    pub fn finish(&mut self, now: u64) -> usize {
        let snapshots = self.parser.finish(&mut self.telemetry);
        if snapshots > 0 {
            self.acknowledge(now);
        }
        snapshots
    }

    fn acknowledge(&mut self, now: u64) {
        self.scheduler = mark_probe_snapshot_received(&self.scheduler, now);
        if self.scheduler.pending {
            self.tick(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(reason: &str, now: u64) -> ProbeRequest {
        ProbeRequest { reason: reason.into(), now, stale_timeout_ms: 8000, min_interval_ms: 750 }
    }

    #[test]
    fn test_first_request_dispatches() {
        let (s, go) = try_start_probe(&ProbeSchedulerState::default(), &req("init", 0));
        assert!(go);
        assert!(s.in_flight);
        assert_eq!(s.dispatch_seq, 1);
        assert_eq!(s.last_dispatched_at, Some(0));
    }

    #[test]
    fn test_in_flight_requests_are_deferred_latest_reason_wins() {
        let (s, _) = try_start_probe(&ProbeSchedulerState::default(), &req("init", 0));
        let (s, go) = try_start_probe(&s, &req("key", 1000));
        assert!(!go);
        let (s, go) = try_start_probe(&s, &req("command", 2000));
        assert!(!go);
        assert_eq!(s.skipped_ticks, 2);
        assert_eq!(s.dispatch_seq, 1);
        let (s, reason) = consume_pending_probe_reason(&s);
        assert_eq!(reason.as_deref(), Some("command"));
        assert!(!s.pending);
        assert_eq!(consume_pending_probe_reason(&s).1, None);
    }

    #[test]
    fn test_min_interval_applies_after_ack() {
        let (s, _) = try_start_probe(&ProbeSchedulerState::default(), &req("a", 0));
        let s = mark_probe_snapshot_received(&s, 100);
        assert_eq!(s.ack_seq, 1);
        assert!(!s.in_flight);
        let (s, go) = try_start_probe(&s, &req("b", 500));
        assert!(!go);
        let (_, go) = try_start_probe(&s, &req("b", 750));
        assert!(go);
    }

    #[test]
    fn test_stale_probe_is_recovered() {
        let (s, _) = try_start_probe(&ProbeSchedulerState::default(), &req("a", 0));
        let (s, go) = try_start_probe(&s, &req("b", 8000));
        assert!(!go, "exactly at the timeout is not stale yet");
        let (s, go) = try_start_probe(&s, &req("c", 8001));
        assert!(go);
        assert_eq!(s.stale_recoveries, 1);
        assert_eq!(s.dispatch_seq, 2);
        assert!(!s.pending);
    }

    #[test]
    fn test_late_ack_after_recovery_acknowledges_current() {
        let (s, _) = try_start_probe(&ProbeSchedulerState::default(), &req("a", 0));
        let (s, _) = try_start_probe(&s, &req("b", 9000));
        let s = mark_probe_snapshot_received(&s, 9100);
        assert_eq!(s.ack_seq, 2);
        // a second ack while idle only stamps the time
        let s2 = mark_probe_snapshot_received(&s, 9200);
        assert_eq!(s2.ack_seq, 2);
        assert_eq!(s2.last_received_at, Some(9200));
    }

    #[test]
    fn test_marker_pattern_compiles() {
        let re = marker_re().unwrap();
        let caps = re.captures("x [[PROBE:panes:3]] y").unwrap();
        assert_eq!(&caps[1], "panes");
        assert_eq!(&caps[2], "3");
    }

    #[test]
    fn test_markers_update_telemetry() {
        let mut t = ProbeTelemetry::default();
        assert!(t.apply_line("noise [[PROBE:panes:3]] more [[PROBE:session_name: work ]]"));
        assert_eq!(t.panes, Some(3));
        assert_eq!(t.session_name.as_deref(), Some("work"));
        assert!(!t.apply_line("[[PROBE:panes:three]] [[PROBE:bogus:1]] [[PROBE:panes:]]"));
        assert_eq!(t.panes, Some(3));
        assert!(t.apply_line("[[PROBE:mouse:on]][[PROBE:in_mode:1]]"));
        let snap = live_snapshot(&t);
        assert_eq!(snap.get(MetricKind::Mode), Some(&MetricValue::Text("COPY_MODE".into())));
        assert_eq!(snap.get(MetricKind::MouseEnabled), Some(&MetricValue::Bool(true)));
        assert!(snap.supports(MetricKind::WindowCount));
        assert_eq!(snap.get(MetricKind::WindowCount), None);
        assert!(!snap.supports(MetricKind::ShellHistoryText));
    }

    #[test]
    fn test_parser_buffers_partial_lines() {
        let mut p = ProbeStreamParser::new();
        let mut t = ProbeTelemetry::default();
        assert_eq!(p.feed("$ tmux ls\r\n[[PROBE:win", &mut t), 0);
        assert_eq!(p.feed("dows:2]][[PROBE:panes:1]]\r\n", &mut t), 1);
        assert_eq!(t.windows, Some(2));
        assert_eq!(p.feed("[[PROBE:sessions:4]]", &mut t), 0);
        assert_eq!(p.finish(&mut t), 1);
        assert_eq!(t.sessions, Some(4));
    }

    #[test]
    fn test_oversized_partial_is_dropped() {
        let mut p = ProbeStreamParser::new();
        let mut t = ProbeTelemetry::default();
        p.feed(&"x".repeat(MAX_PARTIAL_LINE + 1), &mut t);
        assert_eq!(p.feed("[[PROBE:panes:2]]\n", &mut t), 1);
        assert_eq!(t.panes, Some(2));
    }

    #[derive(Default)]
    struct Recorder {
        sent: Vec<String>,
        fail: bool,
    }

    impl ProbeTransport for Recorder {
        fn dispatch(&mut self, reason: &str) -> Result<()> {
            self.sent.push(reason.to_string());
            if self.fail {
                anyhow::bail!("pipe closed");
            }
            Ok(())
        }
    }

    fn settings() -> ProbeSettings {
        ProbeSettings { stale_timeout_ms: 8000, min_interval_ms: 750 }
    }

    #[test]
    fn test_coordinator_retries_pending_after_ack() {
        let mut c = ProbeCoordinator::new(Recorder::default(), settings());
        assert!(c.request("init", 0));
        assert!(!c.request("split", 100));
        assert_eq!(c.ingest("[[PROBE:panes:2]]\n", 1000), 1);
        assert_eq!(c.transport().sent, vec!["init", "split"]);
        assert_eq!(c.scheduler().dispatch_seq, 2);
        assert_eq!(c.scheduler().ack_seq, 1);
        assert!(c.scheduler().in_flight);
    }

    #[test]
    fn test_coordinator_tick_respects_interval() {
        let mut c = ProbeCoordinator::new(Recorder::default(), settings());
        c.request("a", 0);
        c.ingest("[[PROBE:panes:1]]\n", 10);
        assert!(!c.request("b", 20));
        assert!(!c.tick(500));
        assert!(c.scheduler().pending);
        assert!(c.tick(800));
        assert_eq!(c.transport().sent, vec!["a", "b"]);
    }

    #[test]
    fn test_failed_dispatch_waits_for_stale_recovery() {
        let mut c = ProbeCoordinator::new(Recorder { fail: true, ..Default::default() }, settings());
        assert!(c.request("a", 0));
        assert!(c.scheduler().in_flight);
        assert!(!c.request("b", 5000));
        assert!(c.request("c", 9000));
        assert_eq!(c.scheduler().stale_recoveries, 1);
    }

    #[test]
    fn test_dispatch_only_when_not_in_flight_property() {
        let mut s = ProbeSchedulerState::default();
        let mut now = 0;
        for step in 0..200u64 {
            now += 137;
            let was_live = s.in_flight && s.last_dispatched_at.is_some_and(|at| now - at <= 8000);
            let before = s.dispatch_seq;
            let (next, go) = try_start_probe(&s, &req("tick", now));
            assert!(!(go && was_live), "dispatched while a live probe was in flight");
            assert_eq!(next.dispatch_seq, before + go as u64);
            s = next;
            if step % 7 == 3 {
                s = mark_probe_snapshot_received(&s, now);
            }
        }
    }
}
