use crate::pane::new_pane;
use crate::shell::{FileSystem, HOME_DIR};
use crate::types::*;

pub const DEFAULT_WINDOW_NAME: &str = "bash";

/// Start a shell on `fs`, or on a copy of the active shell's filesystem.
/// Returns the new shell id.
pub fn spawn_shell(state: &mut SimulatorState, fs: Option<FileSystem>) -> usize {
    let id = state.next_shell_id;
    state.next_shell_id += 1;
    let fs = fs
        .or_else(|| state.active_shell().map(|s| s.fs.clone()))
        .unwrap_or_else(|| FileSystem::with_home(HOME_DIR));
    state.shells.push(ShellSession::new(id, fs));
    id
}

/// A one-pane window on `shell_id`, not yet attached to any session.
pub fn build_window(state: &mut SimulatorState, shell_id: usize, name: &str) -> Window {
    let pane = new_pane(state, shell_id);
    let id = state.next_window_id;
    state.next_window_id += 1;
    Window {
        id,
        name: name.to_string(),
        active_pane_id: pane.id,
        panes: vec![pane],
        layout: LayoutKind::Single,
    }
}

/// Append a window with its own shell to the active session and select it.
pub fn new_window(state: &mut SimulatorState, name: &str) -> bool {
    if state.active_session().is_none() {
        return false;
    }
    let shell_id = spawn_shell(state, None);
    let window = build_window(state, shell_id, name);
    let Some(session) = state.active_session_mut() else { return false };
    session.active_window_id = window.id;
    session.windows.push(window);
    true
}

fn cycle_window(state: &mut SimulatorState, step: isize) -> bool {
    let Some(session) = state.active_session_mut() else { return false };
    let n = session.windows.len();
    if n < 2 {
        return false;
    }
    let Some(idx) = session.active_window_index() else { return false };
    let next = (idx as isize + step).rem_euclid(n as isize) as usize;
    session.active_window_id = session.windows[next].id;
    true
}

pub fn next_window(state: &mut SimulatorState) -> bool {
    cycle_window(state, 1)
}

pub fn prev_window(state: &mut SimulatorState) -> bool {
    cycle_window(state, -1)
}

/// Create a session named after its index, attach it and detach the rest.
pub fn new_session(state: &mut SimulatorState, name: Option<&str>) -> usize {
    let shell_id = spawn_shell(state, None);
    let window = build_window(state, shell_id, DEFAULT_WINDOW_NAME);
    let id = state.next_session_id;
    state.next_session_id += 1;
    let name = name.map_or_else(|| state.sessions.len().to_string(), str::to_string);
    for session in &mut state.sessions {
        session.attached = false;
    }
    state.sessions.push(Session {
        id,
        name,
        active_window_id: window.id,
        windows: vec![window],
        attached: true,
    });
    state.active_session_id = id;
    id
}
