use std::fmt::Write as _;

use anyhow::{bail, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::config::{format_key_binding, parse_key_name};
use crate::input::resolve_simulator_input_at;
use crate::reducer::reduce;
use crate::types::*;

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Key(KeyEvent),
    Type(String),
    Enter,
    Command(String),
    Output(String),
    Wait(u64),
}

/// Parse a replay script. Blank lines and `#` comments are skipped.
pub fn parse_script(content: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim_start();
        let step = match word {
            "key" => match parse_key_name(rest) {
                Some((code, mods)) => ScriptStep::Key(KeyEvent::new(code, mods)),
                None => bail!("line {}: unknown key '{}'", idx + 1, rest),
            },
            "type" => ScriptStep::Type(rest.to_string()),
            "enter" => ScriptStep::Enter,
            "cmd" => ScriptStep::Command(rest.to_string()),
            "output" => ScriptStep::Output(rest.replace("\\n", "\n")),
            "wait" => match rest.parse::<u64>() {
                Ok(ms) => ScriptStep::Wait(ms),
                Err(_) => bail!("line {}: wait expects milliseconds, got '{}'", idx + 1, rest),
            },
            other => bail!("line {}: unknown step '{}'", idx + 1, other),
        };
        steps.push(step);
    }
    Ok(steps)
}

/// Drives a state through script steps on a virtual clock.
#[derive(Debug, Clone)]
pub struct Replay {
    pub state: SimulatorState,
    pub now: u64,
}

impl Replay {
    pub fn new(state: SimulatorState) -> Self {
        Replay { state, now: 0 }
    }

    pub fn press(&mut self, key: &KeyEvent) {
        let actions = resolve_simulator_input_at(&self.state, key, self.now);
        trace!(key = %format_key_binding(&(key.code, key.modifiers)), actions = actions.len(), "replay key");
        for action in &actions {
            self.state = reduce(&self.state, action);
        }
    }

    pub fn step(&mut self, step: &ScriptStep) {
        match step {
            ScriptStep::Key(key) => self.press(key),
            ScriptStep::Type(text) => {
                for c in text.chars() {
                    self.press(&KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
                }
            }
            ScriptStep::Enter => self.press(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
            ScriptStep::Command(text) => {
                self.state = reduce(&self.state, &Action::ExecuteCommand { command: text.clone() });
            }
            ScriptStep::Output(text) => {
                self.state = reduce(&self.state, &Action::PaneOutput { text: text.clone() });
            }
            ScriptStep::Wait(ms) => self.now += ms,
        }
    }

    pub fn run(&mut self, steps: &[ScriptStep]) {
        for step in steps {
            self.step(step);
        }
    }
}

/// Human-readable overview of sessions, windows and panes.
pub fn render_summary(state: &SimulatorState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "scenario: {}  mode: {}  prefix: {}",
        state.scenario,
        state.mode.mode.as_str(),
        format_key_binding(&state.config.prefix_key)
    );
    for session in &state.sessions {
        let marker = if session.id == state.active_session_id { "*" } else { " " };
        let attached = if session.attached { " (attached)" } else { "" };
        let _ = writeln!(out, "{} session {}: {} window(s){}", marker, session.name, session.windows.len(), attached);
        for (idx, window) in session.windows.iter().enumerate() {
            let marker = if window.id == session.active_window_id { "*" } else { " " };
            let _ = writeln!(out, "  {} window {}: {} [{}]", marker, idx, window.name, window.layout.as_str());
            for pane in &window.panes {
                let marker = if pane.id == window.active_pane_id { "*" } else { " " };
                let r = pane.rect;
                let _ = writeln!(
                    out,
                    "    {} pane {} {}x{} at {},{} ({} lines)",
                    marker, pane.id, r.width, r.height, r.x, r.y, pane.buffer.lines.len()
                );
            }
        }
    }
    if !state.messages.is_empty() {
        out.push_str("messages:\n");
        for msg in &state.messages {
            let _ = writeln!(out, "  {}", msg);
        }
    }
    if let Some(pane) = state.active_pane() {
        out.push_str("active pane:\n");
        for line in pane.buffer.viewport_lines() {
            let _ = writeln!(out, "  | {}", line.text);
        }
    }
    out
}
