use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;

use muxsim::config::parse_config;
use muxsim::grading::{evaluate, simulator_snapshot, Mission, Status};
use muxsim::probe::{mark_probe_snapshot_received, try_start_probe, ProbeRequest, ProbeSchedulerState};
use muxsim::scenario::{build, initial_state, SCENARIOS};
use muxsim::settings::{ProbeSettings, SimulatorSettings};
use muxsim::terminal::TerminalBuffer;
use muxsim::types::*;
use muxsim::{reduce, reduce_all, resolve_simulator_input_at};

fn fresh() -> SimulatorState {
    initial_state(SimulatorSettings::default())
}

fn exec(cmd: &str) -> Action {
    Action::ExecuteCommand { command: cmd.to_string() }
}

fn assert_consistent(state: &SimulatorState) {
    let mut session_ids: Vec<usize> = state.sessions.iter().map(|s| s.id).collect();
    session_ids.sort_unstable();
    session_ids.dedup();
    assert_eq!(session_ids.len(), state.sessions.len(), "duplicate session ids");
    assert!(state.active_session().is_some(), "active session missing");
    assert!(state.active_shell().is_some(), "active shell missing");
    let mut pane_ids = Vec::new();
    for session in &state.sessions {
        assert!(!session.windows.is_empty());
        assert!(session.active_window().is_some());
        for window in &session.windows {
            assert!(!window.panes.is_empty(), "window {} has no panes", window.id);
            assert!(window.active_pane().is_some());
            for pane in &window.panes {
                pane_ids.push(pane.id);
                let buf = &pane.buffer;
                assert!(buf.lines.len() <= buf.scrollback_limit);
                assert!(buf.viewport_top <= buf.max_top());
                assert!(state.shells.iter().any(|s| s.id == pane.shell_id));
            }
        }
    }
    let total = pane_ids.len();
    pane_ids.sort_unstable();
    pane_ids.dedup();
    assert_eq!(pane_ids.len(), total, "duplicate pane ids");
}

/// Drive a long mixed action sequence and check the structural invariants
/// after every step.
#[test]
fn test_invariants_hold_across_mixed_actions() {
    let script = vec![
        Action::SplitPane { direction: SplitDirection::Vertical },
        Action::SplitPane { direction: SplitDirection::Horizontal },
        Action::FocusPane { direction: FocusDir::Left },
        Action::KillActivePane,
        Action::NewWindow,
        Action::SplitPane { direction: SplitDirection::Horizontal },
        Action::ResizePane { axis: ResizeAxis::Y, delta: -2 },
        Action::KillActivePane,
        Action::KillActivePane,
        Action::KillActivePane,
        Action::NewSession,
        Action::PrevWindow,
        Action::EnterCopyMode,
        Action::RunCopySearch { query: "lab".into() },
        Action::AdvanceCopyMatch { delta: -1 },
        Action::ExitCopyMode,
        exec("mkdir -p a/b/c"),
        exec("cd a/b"),
        exec("tmux split-window -h"),
        exec("kill-pane"),
        exec("select-pane -R"),
        Action::PaneOutput { text: "x\n".repeat(1500) },
        Action::ScrollPane { delta: 30 },
        Action::InitScenario { scenario: Some("multi-window".into()) },
        Action::NextWindow,
        Action::SplitPane { direction: SplitDirection::Vertical },
    ];
    let mut state = fresh();
    for action in &script {
        state = reduce(&state, action);
        assert_consistent(&state);
    }
}

#[test]
fn test_every_scenario_satisfies_invariants() {
    for name in SCENARIOS {
        assert_consistent(&build(name, SimulatorSettings::default()));
    }
}

#[test]
fn test_wrapping_matches_ceil_of_width() {
    let mut buf = TerminalBuffer::new(10, 5, 100);
    buf.append_output(&"a".repeat(25));
    assert_eq!(buf.lines.len(), 3);
    assert!(buf.lines[0].wrapped && buf.lines[1].wrapped);
    assert!(!buf.lines[2].wrapped);
    let before = buf.clone();
    buf.scroll_viewport(0);
    assert_eq!(buf, before);
}

#[test]
fn test_reset_is_canonical_from_anywhere() {
    let busy = reduce_all(
        &fresh(),
        &[
            Action::NewWindow,
            Action::SplitPane { direction: SplitDirection::Vertical },
            Action::EnterPrefix { at: 5 },
            exec("echo 'set -g mouse on' > ~/.tmux.conf"),
            exec("source-file ~/.tmux.conf"),
        ],
    );
    assert_ne!(busy, fresh());
    assert_eq!(reduce(&busy, &Action::Reset), fresh());
    assert_eq!(reduce(&fresh(), &Action::Reset), fresh());
}

#[test]
fn test_split_from_initial_state() {
    let s = reduce(&fresh(), &Action::SplitPane { direction: SplitDirection::Vertical });
    let window = s.active_window().unwrap();
    assert_eq!(window.panes.len(), 2);
    assert_eq!(window.layout, LayoutKind::Vertical);
    assert_eq!(s.action_history.last().map(String::as_str), Some("pane.split.vertical"));
}

#[test]
fn test_double_kill_keeps_one_pane() {
    let two = reduce(&fresh(), &Action::SplitPane { direction: SplitDirection::Horizontal });
    let s = reduce_all(&two, &[Action::KillActivePane, Action::KillActivePane]);
    assert_eq!(s.active_window().unwrap().panes.len(), 1);
    assert_eq!(s.active_window().unwrap().layout, LayoutKind::Single);
}

#[test]
fn test_split_window_command_matches_direct_action() {
    let via_command = reduce(&fresh(), &exec("split-window -h"));
    let direct = reduce(&fresh(), &Action::SplitPane { direction: SplitDirection::Vertical });
    assert_eq!(via_command.sessions, direct.sessions);
    assert_eq!(via_command.mode, direct.mode);
    assert_eq!(via_command.config, direct.config);
    assert_eq!(via_command.active_shell_id, direct.active_shell_id);
    assert_eq!(via_command.action_history.last(), direct.action_history.last());
}

#[test]
fn test_config_parsing_examples() {
    let bad = parse_config("set -g prefix C-x");
    assert!(bad.directives.is_empty());
    assert_eq!(bad.errors.len(), 1);
    assert_eq!(bad.errors[0].line, 1);

    let good = parse_config(
        "# lab config\nset -g prefix C-a\nset -g mouse on\nsetw -g mode-keys vi\nbind r source-file ~/.tmux.conf\nunbind %\n",
    );
    assert_eq!(good.directives.len(), 5);
    assert!(good.errors.is_empty());
}

#[test]
fn test_shell_history_grading_flips_to_complete() {
    let mission = Mission::from_json_str(
        &json!({
            "id": "open-window",
            "passRules": [{ "kind": "shellHistoryText", "operator": "contains", "value": "new-window" }]
        })
        .to_string(),
    )
    .unwrap();
    let s = reduce(&fresh(), &exec("ls"));
    assert_eq!(evaluate(&simulator_snapshot(&s), &mission).status, Status::Incomplete);
    let s = reduce(&s, &exec("tmux new-window"));
    assert_eq!(evaluate(&simulator_snapshot(&s), &mission).status, Status::Complete);
}

#[test]
fn test_probe_never_dispatches_while_live_in_flight() {
    let settings = ProbeSettings::default();
    let mut state = ProbeSchedulerState::default();
    let mut dispatches = 0;
    for i in 0..500u64 {
        let now = i * 97;
        let live = state.in_flight
            && state.last_dispatched_at.is_some_and(|at| now - at <= settings.stale_timeout_ms);
        let (next, go) = try_start_probe(&state, &ProbeRequest::new("tick", now, &settings));
        assert!(!(go && live));
        assert_eq!(next.dispatch_seq, state.dispatch_seq + u64::from(go));
        dispatches += u64::from(go);
        state = next;
        if i % 150 == 0 {
            state = mark_probe_snapshot_received(&state, now);
        }
    }
    assert_eq!(state.dispatch_seq, dispatches);
    assert!(state.stale_recoveries > 0);
}

fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
}

fn press(state: SimulatorState, key: KeyEvent, now: u64) -> SimulatorState {
    resolve_simulator_input_at(&state, &key, now)
        .iter()
        .fold(state, |acc, action| reduce(&acc, action))
}

#[test]
fn test_repeat_window_chains_focus_moves() {
    let mut s = reduce_all(
        &fresh(),
        &[
            Action::SplitPane { direction: SplitDirection::Vertical },
            Action::SplitPane { direction: SplitDirection::Vertical },
            Action::SplitPane { direction: SplitDirection::Vertical },
        ],
    );
    // 2x2 grid, bottom-right active
    let prefix = KeyEvent::new(KeyCode::Char('b'), KeyModifiers::CONTROL);
    s = press(s, prefix, 0);
    s = press(s, key('h'), 100);
    assert_eq!(s.mode.mode, Mode::Normal);
    // within the grace period: no prefix needed
    s = press(s, key('k'), 900);
    let top_left = s.active_window().unwrap().panes[0].id;
    assert_eq!(s.active_window().unwrap().active_pane_id, top_left);
    // grace expired: plain key
    s = press(s, key('l'), 3000);
    assert_eq!(s.active_window().unwrap().active_pane_id, top_left);
    assert_eq!(s.action_history.last().map(String::as_str), Some("key.l"));
}

#[test]
fn test_custom_binding_runs_bound_command() {
    let s = reduce(
        &fresh(),
        &Action::ApplyTmuxConfig { content: "set -g prefix C-a\nbind | split-window -h\n".into(), source_path: None },
    );
    let s = press(s, KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL), 0);
    let s = press(s, key('|'), 10);
    assert_eq!(s.active_window().unwrap().layout, LayoutKind::Vertical);
    assert_eq!(s.action_history.last().map(String::as_str), Some("pane.split.vertical"));
}

#[test]
fn test_copy_mode_search_via_keys() {
    let s = build("log-search", SimulatorSettings::default());
    let s = press(s, KeyEvent::new(KeyCode::Char('b'), KeyModifiers::CONTROL), 0);
    let s = press(s, key('['), 1);
    assert_eq!(s.mode.mode, Mode::CopyMode);
    let s = press(s, key('E'), 2);
    assert_eq!(s.mode.mode, Mode::SearchMode);
    assert!(s.mode.copy.search_executed && s.mode.copy.match_found);
    let snap = simulator_snapshot(&s);
    let mission = Mission::from_json_str(
        r#"{"id":"search","passRules":[
            {"kind":"copySearchExecuted","operator":"equals","value":true},
            {"kind":"mode","operator":"equals","value":"SEARCH_MODE"}]}"#,
    )
    .unwrap();
    assert_eq!(evaluate(&snap, &mission).status, Status::Complete);
}
