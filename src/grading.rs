use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::format_key_binding;
use crate::types::*;

/// Every metric a pass rule may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    SessionCount,
    WindowCount,
    PaneCount,
    Mode,
    SessionName,
    WindowName,
    ActiveWindowIndex,
    WindowLayout,
    WindowZoomed,
    PanesSynchronized,
    CopySearchExecuted,
    CopySearchMatchFound,
    ActionHistory,
    ActionHistoryText,
    ShellHistory,
    ShellHistoryText,
    PrefixKey,
    MouseEnabled,
    ModeKeys,
}

impl MetricKind {
    pub const ALL: &'static [MetricKind] = &[
        MetricKind::SessionCount,
        MetricKind::WindowCount,
        MetricKind::PaneCount,
        MetricKind::Mode,
        MetricKind::SessionName,
        MetricKind::WindowName,
        MetricKind::ActiveWindowIndex,
        MetricKind::WindowLayout,
        MetricKind::WindowZoomed,
        MetricKind::PanesSynchronized,
        MetricKind::CopySearchExecuted,
        MetricKind::CopySearchMatchFound,
        MetricKind::ActionHistory,
        MetricKind::ActionHistoryText,
        MetricKind::ShellHistory,
        MetricKind::ShellHistoryText,
        MetricKind::PrefixKey,
        MetricKind::MouseEnabled,
        MetricKind::ModeKeys,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::SessionCount => "sessionCount",
            MetricKind::WindowCount => "windowCount",
            MetricKind::PaneCount => "paneCount",
            MetricKind::Mode => "mode",
            MetricKind::SessionName => "sessionName",
            MetricKind::WindowName => "windowName",
            MetricKind::ActiveWindowIndex => "activeWindowIndex",
            MetricKind::WindowLayout => "windowLayout",
            MetricKind::WindowZoomed => "windowZoomed",
            MetricKind::PanesSynchronized => "panesSynchronized",
            MetricKind::CopySearchExecuted => "copySearchExecuted",
            MetricKind::CopySearchMatchFound => "copySearchMatchFound",
            MetricKind::ActionHistory => "actionHistory",
            MetricKind::ActionHistoryText => "actionHistoryText",
            MetricKind::ShellHistory => "shellHistory",
            MetricKind::ShellHistoryText => "shellHistoryText",
            MetricKind::PrefixKey => "prefixKey",
            MetricKind::MouseEnabled => "mouseEnabled",
            MetricKind::ModeKeys => "modeKeys",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        MetricKind::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(i64),
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Bool(b) => write!(f, "{}", b),
            MetricValue::Text(s) => write!(f, "{:?}", s),
            MetricValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Simulator,
    Live,
}

/// Uniform metric projection. A kind missing from `metrics` is not
/// supported by the source; a kind mapped to `None` is supported but has
/// not been observed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: SnapshotSource,
    pub metrics: BTreeMap<MetricKind, Option<MetricValue>>,
}

impl Snapshot {
    pub fn new(source: SnapshotSource) -> Self {
        Snapshot { source, metrics: BTreeMap::new() }
    }

    pub fn set(&mut self, kind: MetricKind, value: Option<MetricValue>) {
        self.metrics.insert(kind, value);
    }

    pub fn supports(&self, kind: MetricKind) -> bool {
        self.metrics.contains_key(&kind)
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricValue> {
        self.metrics.get(&kind).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "equals", alias = "==")]
    Equals,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRule {
    pub kind: String,
    pub operator: Operator,
    pub value: Value,
}

impl fmt::Display for PassRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.operator.as_str(), self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub pass_rules: Vec<PassRule>,
    #[serde(default)]
    pub initial_scenario: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl Mission {
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid mission JSON")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Complete,
    Incomplete,
    /// Some rule names a metric this source cannot observe.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub status: Status,
    pub reason: String,
    pub unsupported_kinds: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_rule: Option<PassRule>,
}

fn expected_text(expected: &Value) -> Option<String> {
    match expected {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn expected_number(expected: &Value) -> Option<f64> {
    match expected {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Apply `op` with the observed value on the left.
pub fn compare(observed: &MetricValue, op: Operator, expected: &Value) -> bool {
    match (op, observed) {
        (Operator::Equals, MetricValue::Number(n)) => expected_number(expected) == Some(*n as f64),
        (Operator::Equals, MetricValue::Bool(b)) => match expected {
            Value::Bool(e) => e == b,
            Value::Number(n) => n.as_i64() == Some(*b as i64),
            _ => false,
        },
        (Operator::Equals, MetricValue::Text(s)) => expected_text(expected).as_deref() == Some(s.as_str()),
        (Operator::Equals, MetricValue::List(items)) => match expected {
            Value::Array(values) => {
                values.len() == items.len()
                    && values.iter().zip(items).all(|(v, item)| expected_text(v).as_deref() == Some(item.as_str()))
            }
            _ => false,
        },
        (Operator::Gte, MetricValue::Number(n)) => expected_number(expected).is_some_and(|e| *n as f64 >= e),
        (Operator::Lte, MetricValue::Number(n)) => expected_number(expected).is_some_and(|e| *n as f64 <= e),
        (Operator::Contains, MetricValue::Text(s)) => expected_text(expected).is_some_and(|e| s.contains(&e)),
        (Operator::Contains, MetricValue::List(items)) => {
            expected_text(expected).is_some_and(|e| items.iter().any(|item| *item == e))
        }
        _ => false,
    }
}

/// Grade `mission` against `snapshot`. Unsupported metrics win over
/// failures so an unobservable rule never reads as incomplete.
pub fn evaluate(snapshot: &Snapshot, mission: &Mission) -> EvaluationResult {
    let mut unsupported: Vec<String> = Vec::new();
    let mut first_failure: Option<(&PassRule, Option<&MetricValue>)> = None;

    for rule in &mission.pass_rules {
        let kind = MetricKind::from_name(&rule.kind).filter(|k| snapshot.supports(*k));
        let Some(kind) = kind else {
            if !unsupported.contains(&rule.kind) {
                unsupported.push(rule.kind.clone());
            }
            continue;
        };
        let observed = snapshot.get(kind);
        let passed = observed.is_some_and(|v| compare(v, rule.operator, &rule.value));
        if !passed && first_failure.is_none() {
            first_failure = Some((rule, observed));
        }
    }

    if !unsupported.is_empty() {
        return EvaluationResult {
            status: Status::Manual,
            reason: format!("cannot be checked automatically: {}", unsupported.join(", ")),
            unsupported_kinds: unsupported,
            failed_rule: None,
        };
    }
    if let Some((rule, observed)) = first_failure {
        let current = observed.map_or_else(|| "not observed yet".to_string(), |v| format!("current {}", v));
        return EvaluationResult {
            status: Status::Incomplete,
            reason: format!("{} ({})", rule, current),
            unsupported_kinds: Vec::new(),
            failed_rule: Some(rule.clone()),
        };
    }
    EvaluationResult {
        status: Status::Complete,
        reason: format!("all {} rule(s) satisfied", mission.pass_rules.len()),
        unsupported_kinds: Vec::new(),
        failed_rule: None,
    }
}

/// Project the simulator state onto the metric set. The simulator never
/// zooms or synchronizes panes, so both flags read false.
pub fn simulator_snapshot(state: &SimulatorState) -> Snapshot {
    use MetricKind as K;
    let mut snap = Snapshot::new(SnapshotSource::Simulator);
    let session = state.active_session();
    let window = state.active_window();
    let count = |n: usize| Some(MetricValue::Number(n as i64));
    let text = |s: &str| Some(MetricValue::Text(s.to_string()));

    snap.set(K::SessionCount, count(state.sessions.len()));
    snap.set(K::WindowCount, session.and_then(|s| count(s.windows.len())));
    snap.set(K::PaneCount, window.and_then(|w| count(w.panes.len())));
    snap.set(K::Mode, text(state.mode.mode.as_str()));
    snap.set(K::SessionName, session.and_then(|s| text(&s.name)));
    snap.set(K::WindowName, window.and_then(|w| text(&w.name)));
    snap.set(K::ActiveWindowIndex, session.and_then(|s| s.active_window_index()).and_then(count));
    snap.set(K::WindowLayout, window.and_then(|w| text(w.layout.as_str())));
    snap.set(K::WindowZoomed, Some(MetricValue::Bool(false)));
    snap.set(K::PanesSynchronized, Some(MetricValue::Bool(false)));
    snap.set(K::CopySearchExecuted, Some(MetricValue::Bool(state.mode.copy.search_executed)));
    snap.set(K::CopySearchMatchFound, Some(MetricValue::Bool(state.mode.copy.match_found)));
    snap.set(K::ActionHistory, Some(MetricValue::List(state.action_history.clone())));
    snap.set(K::ActionHistoryText, Some(MetricValue::Text(state.action_history.join("\n"))));
    let shell_history: Vec<String> = state.shells.iter().flat_map(|s| s.history.iter().cloned()).collect();
    snap.set(K::ShellHistoryText, Some(MetricValue::Text(shell_history.join("\n"))));
    snap.set(K::ShellHistory, Some(MetricValue::List(shell_history)));
    snap.set(K::PrefixKey, Some(MetricValue::Text(format_key_binding(&state.config.prefix_key))));
    snap.set(K::MouseEnabled, Some(MetricValue::Bool(state.config.mouse)));
    snap.set(K::ModeKeys, text(state.config.mode_keys.as_str()));
    snap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::reduce;
    use crate::scenario::initial_state;
    use crate::settings::SimulatorSettings;
    use serde_json::json;

    fn mission(rules: Value) -> Mission {
        Mission::from_json_str(&json!({ "id": "m1", "passRules": rules }).to_string()).unwrap()
    }

    #[test]
    fn test_parses_mission_json() {
        let m = Mission::from_json_str(
            r#"{"id":"split-1","passRules":[{"kind":"paneCount","operator":"gte","value":2}],
                "initialScenario":"default","hints":["try %"],"difficulty":"easy"}"#,
        )
        .unwrap();
        assert_eq!(m.pass_rules[0].operator, Operator::Gte);
        assert_eq!(m.initial_scenario.as_deref(), Some("default"));
        assert!(Mission::from_json_str(r#"{"id":"x","passRules":[{"kind":"a","operator":"~","value":1}]}"#).is_err());
    }

    #[test]
    fn test_complete_when_all_rules_pass() {
        let s = reduce(&initial_state(SimulatorSettings::default()), &Action::SplitPane { direction: SplitDirection::Vertical });
        let m = mission(json!([
            { "kind": "paneCount", "operator": ">=", "value": 2 },
            { "kind": "windowLayout", "operator": "equals", "value": "vertical" },
            { "kind": "actionHistory", "operator": "contains", "value": "pane.split.vertical" },
        ]));
        let r = evaluate(&simulator_snapshot(&s), &m);
        assert_eq!(r.status, Status::Complete, "{}", r.reason);
    }

    #[test]
    fn test_first_failed_rule_is_reported() {
        let s = initial_state(SimulatorSettings::default());
        let m = mission(json!([
            { "kind": "sessionCount", "operator": "equals", "value": 1 },
            { "kind": "paneCount", "operator": ">=", "value": 3 },
            { "kind": "windowCount", "operator": ">=", "value": 2 },
        ]));
        let r = evaluate(&simulator_snapshot(&s), &m);
        assert_eq!(r.status, Status::Incomplete);
        assert_eq!(r.failed_rule.unwrap().kind, "paneCount");
        assert!(r.reason.contains("current 1"));
    }

    #[test]
    fn test_unsupported_metric_means_manual_even_with_failures() {
        let s = initial_state(SimulatorSettings::default());
        let m = mission(json!([
            { "kind": "paneCount", "operator": ">=", "value": 3 },
            { "kind": "somethingNew", "operator": "equals", "value": 1 },
            { "kind": "alsoNew", "operator": "gte", "value": 1 },
        ]));
        let r = evaluate(&simulator_snapshot(&s), &m);
        assert_eq!(r.status, Status::Manual);
        assert_eq!(r.unsupported_kinds, vec!["somethingNew", "alsoNew"]);
        assert!(r.failed_rule.is_none());
    }

    #[test]
    fn test_unobserved_value_is_incomplete() {
        let mut snap = Snapshot::new(SnapshotSource::Live);
        snap.set(MetricKind::PaneCount, None);
        let r = evaluate(&snap, &mission(json!([{ "kind": "paneCount", "operator": "<=", "value": 4 }])));
        assert_eq!(r.status, Status::Incomplete);
        assert!(r.reason.contains("not observed"));
    }

    #[test]
    fn test_comparisons() {
        let text = MetricValue::Text("split-window -h\nnew-window".into());
        assert!(compare(&text, Operator::Contains, &json!("new-window")));
        assert!(!compare(&text, Operator::Equals, &json!("new-window")));
        let list = MetricValue::List(vec!["a".into(), "b".into()]);
        assert!(compare(&list, Operator::Contains, &json!("b")));
        assert!(!compare(&list, Operator::Contains, &json!("ab")));
        assert!(compare(&MetricValue::Number(2), Operator::Equals, &json!("2")));
        assert!(compare(&MetricValue::Bool(true), Operator::Equals, &json!(1)));
        assert!(!compare(&MetricValue::Text("3".into()), Operator::Gte, &json!(2)));
    }

    #[test]
    fn test_zoom_and_sync_read_false() {
        let s = initial_state(SimulatorSettings::default());
        let m = mission(json!([
            { "kind": "windowZoomed", "operator": "equals", "value": false },
            { "kind": "panesSynchronized", "operator": "equals", "value": false },
        ]));
        let r = evaluate(&simulator_snapshot(&s), &m);
        assert_eq!(r.status, Status::Complete, "{}", r.reason);
    }

    #[test]
    fn test_search_flags_survive_leaving_copy_mode() {
        let actions = [
            Action::EnterCopyMode,
            Action::RunCopySearch { query: "error".into() },
            Action::ExitCopyMode,
        ];
        let s = crate::reducer::reduce_all(&crate::scenario::build("log-search", SimulatorSettings::default()), &actions);
        assert_eq!(s.mode.mode, Mode::Normal);
        let m = mission(json!([
            { "kind": "copySearchExecuted", "operator": "equals", "value": true },
            { "kind": "copySearchMatchFound", "operator": "equals", "value": true },
        ]));
        let r = evaluate(&simulator_snapshot(&s), &m);
        assert_eq!(r.status, Status::Complete, "{}", r.reason);
    }

    #[test]
    fn test_config_metrics() {
        let s = reduce(
            &initial_state(SimulatorSettings::default()),
            &Action::ApplyTmuxConfig { content: "set -g prefix C-a\nset -g mouse on\nsetw -g mode-keys vi".into(), source_path: None },
        );
        let snap = simulator_snapshot(&s);
        assert_eq!(snap.get(MetricKind::PrefixKey), Some(&MetricValue::Text("C-a".into())));
        assert_eq!(snap.get(MetricKind::MouseEnabled), Some(&MetricValue::Bool(true)));
        assert_eq!(snap.get(MetricKind::ModeKeys), Some(&MetricValue::Text("vi".into())));
    }
}
