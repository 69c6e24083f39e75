use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::config::{format_key_binding, binding_key};
use crate::types::*;

const RESIZE_STEP_X: i32 = 5;
const RESIZE_STEP_Y: i32 = 2;

/// Resolve a keystroke without timing: the prefix never times out and
/// repeat windows never expire.
pub fn resolve_simulator_input(state: &SimulatorState, key: &KeyEvent) -> Vec<Action> {
    resolve(state, key, None)
}

/// Resolve a keystroke arriving at `now` (milliseconds on the caller's clock).
pub fn resolve_simulator_input_at(state: &SimulatorState, key: &KeyEvent, now: u64) -> Vec<Action> {
    resolve(state, key, Some(now))
}

fn resolve(state: &SimulatorState, key: &KeyEvent, now: Option<u64>) -> Vec<Action> {
    let normalized = binding_key((key.code, key.modifiers));
    let name = format_key_binding(&normalized);
    let is_prefix = normalized == binding_key(state.config.prefix_key);
    let actions = match state.mode.mode {
        Mode::Normal => resolve_normal(state, &name, is_prefix, now),
        Mode::PrefixPending => resolve_prefix(state, &name, is_prefix, now),
        Mode::CommandMode => resolve_command_mode(state, key),
        Mode::CopyMode | Mode::SearchMode => resolve_copy_mode(state, key, &name, is_prefix, now),
    };
    trace!(key = %name, mode = state.mode.mode.as_str(), count = actions.len(), "resolved input");
    actions
}

/// The fixed prefix table, keyed by tmux key name.
pub fn prefix_command(name: &str) -> Option<(Action, Option<RepeatClass>)> {
    let focus = |direction| Some((Action::FocusPane { direction }, Some(RepeatClass::Focus)));
    let resize = |axis, delta| Some((Action::ResizePane { axis, delta }, Some(RepeatClass::Resize)));
    match name {
        "%" => Some((Action::SplitPane { direction: SplitDirection::Vertical }, None)),
        "\"" => Some((Action::SplitPane { direction: SplitDirection::Horizontal }, None)),
        "h" | "Left" => focus(FocusDir::Left),
        "j" | "Down" => focus(FocusDir::Down),
        "k" | "Up" => focus(FocusDir::Up),
        "l" | "Right" => focus(FocusDir::Right),
        "H" => resize(ResizeAxis::X, -RESIZE_STEP_X),
        "L" => resize(ResizeAxis::X, RESIZE_STEP_X),
        "K" => resize(ResizeAxis::Y, -RESIZE_STEP_Y),
        "J" => resize(ResizeAxis::Y, RESIZE_STEP_Y),
        "c" => Some((Action::NewWindow, None)),
        "n" => Some((Action::NextWindow, None)),
        "p" => Some((Action::PrevWindow, None)),
        "s" => Some((Action::NewSession, None)),
        "[" => Some((Action::EnterCopyMode, None)),
        ":" => Some((Action::EnterCommandMode, None)),
        "d" => Some((Action::Detach, None)),
        _ => None,
    }
}

fn resolve_normal(state: &SimulatorState, name: &str, is_prefix: bool, now: Option<u64>) -> Vec<Action> {
    if is_prefix {
        return vec![Action::EnterPrefix { at: now.unwrap_or(0) }];
    }
    if let Some(window) = state.mode.repeat {
        let live = now.map_or(true, |t| t <= window.expires_at);
        if live {
            if let Some((action, Some(class))) = prefix_command(name) {
                if class == window.class {
                    let until = now.map_or(window.expires_at, |t| t + state.settings.repeat_grace_ms);
                    return vec![action, Action::ExtendRepeatWindow { class, until }];
                }
            }
        }
        return vec![Action::ClearRepeatWindow, Action::RawKey { key: name.to_string() }];
    }
    vec![Action::RawKey { key: name.to_string() }]
}

fn resolve_prefix(state: &SimulatorState, name: &str, is_prefix: bool, now: Option<u64>) -> Vec<Action> {
    if let (Some(t), Some(at)) = (now, state.mode.prefix_entered_at) {
        if t.saturating_sub(at) > state.settings.prefix_timeout_ms {
            let mut out = vec![Action::CancelPrefix];
            out.extend(resolve_normal(state, name, is_prefix, now));
            return out;
        }
    }
    if is_prefix {
        return vec![Action::CancelPrefix, Action::RawKey { key: name.to_string() }];
    }
    if let Some(command) = state.config.bindings.get(name) {
        return vec![Action::CancelPrefix, Action::ExecuteCommand { command: command.clone() }];
    }
    let unmapped = || vec![Action::CancelPrefix, Action::UnmappedPrefixKey { key: name.to_string() }];
    if state.config.unbound.contains(name) {
        return unmapped();
    }
    match prefix_command(name) {
        Some((action, repeat)) => {
            let mut out = vec![Action::CancelPrefix, action];
            if let (Some(class), Some(t)) = (repeat, now) {
                out.push(Action::ExtendRepeatWindow { class, until: t + state.settings.repeat_grace_ms });
            }
            out
        }
        None => unmapped(),
    }
}

fn resolve_command_mode(state: &SimulatorState, key: &KeyEvent) -> Vec<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => {
            let text = state.mode.command_line.buffer.clone();
            if text.trim().is_empty() {
                vec![Action::ExitCommandMode]
            } else {
                vec![Action::ExitCommandMode, Action::ExecuteCommand { command: text }]
            }
        }
        KeyCode::Esc => vec![Action::ExitCommandMode],
        KeyCode::Char('c') if ctrl => vec![Action::ExitCommandMode],
        KeyCode::Up => vec![Action::NavigateCommandHistory { direction: HistoryDirection::Older }],
        KeyCode::Down => vec![Action::NavigateCommandHistory { direction: HistoryDirection::Newer }],
        _ => {
            let mut editor = state.mode.command_line.clone();
            if editor.apply_key(key) && editor != state.mode.command_line {
                vec![Action::SetCommandLine { buffer: editor.buffer, cursor: editor.cursor }]
            } else {
                Vec::new()
            }
        }
    }
}

fn resolve_copy_mode(state: &SimulatorState, key: &KeyEvent, name: &str, is_prefix: bool, now: Option<u64>) -> Vec<Action> {
    if is_prefix {
        return vec![Action::EnterPrefix { at: now.unwrap_or(0) }];
    }
    let page = state.active_pane().map_or(1, |p| p.buffer.height.max(1) as i64);
    let has_matches = !state.mode.copy.matches.is_empty();
    let plain = !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    match key.code {
        KeyCode::Esc => vec![Action::ExitCopyMode],
        KeyCode::Up => vec![Action::ScrollPane { delta: 1 }],
        KeyCode::Down => vec![Action::ScrollPane { delta: -1 }],
        KeyCode::PageUp => vec![Action::ScrollPane { delta: page }],
        KeyCode::PageDown => vec![Action::ScrollPane { delta: -page }],
        KeyCode::Char('n') if plain && has_matches => vec![Action::AdvanceCopyMatch { delta: 1 }],
        KeyCode::Char('N') if plain && has_matches => vec![Action::AdvanceCopyMatch { delta: -1 }],
        KeyCode::Char('/') if plain => vec![Action::RunCopySearch { query: state.mode.copy.query.clone() }],
        KeyCode::Char(c) if plain => vec![Action::RunCopySearch { query: c.to_string() }],
        _ => {
            trace!(key = %name, "ignored in copy mode");
            Vec::new()
        }
    }
}
