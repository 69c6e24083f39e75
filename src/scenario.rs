use tracing::{info, warn};

use crate::pane;
use crate::settings::SimulatorSettings;
use crate::shell::{FileSystem, HOME_DIR};
use crate::types::*;
use crate::window_ops::{self, build_window, spawn_shell, DEFAULT_WINDOW_NAME};

pub const DEFAULT_SCENARIO: &str = "default";

/// Scenario names accepted by `build`.
pub const SCENARIOS: &[&str] = &["default", "split-panes", "multi-window", "log-search", "config-lab"];

const WELCOME: &str = "Welcome to the tmux lab. Type 'help' to list commands.";

const README: &str = "\
This machine is a sandbox. Nothing you do here leaves it.
Press C-b then % to split the window side by side.
Press C-b then : to type a tmux command.
";

const APP_LOG: &str = "\
2024-05-01 09:00:01 INFO  service starting
2024-05-01 09:00:02 INFO  listening on :8080
2024-05-01 09:01:17 WARN  slow request /api/orders 1840ms
2024-05-01 09:02:40 ERROR upstream timeout talking to billing
2024-05-01 09:02:41 INFO  retrying billing request
2024-05-01 09:03:05 ERROR billing returned 502
2024-05-01 09:04:12 INFO  request rate normal
2024-05-01 09:05:55 WARN  cache miss ratio 0.41
2024-05-01 09:06:30 INFO  health check ok
";

const SAMPLE_TMUX_CONF: &str = "\
# prefix on C-a like screen
set -g prefix C-a
set -g mouse on
setw -g mode-keys vi
bind | split-window -h
bind - split-window -v
";

fn home(path: &str) -> String {
    format!("{}/{}", HOME_DIR, path)
}

fn seed_filesystem() -> FileSystem {
    let mut fs = FileSystem::with_home(HOME_DIR);
    fs.files.insert(home("README.txt"), README.to_string());
    fs
}

/// The canonical starting point: one session with one window holding a
/// single pane.
pub fn initial_state(settings: SimulatorSettings) -> SimulatorState {
    let mut state = SimulatorState {
        shells: Vec::new(),
        active_shell_id: 0,
        sessions: Vec::new(),
        active_session_id: 0,
        config: TmuxConfigState::default(),
        mode: ModeState::default(),
        messages: Vec::new(),
        action_history: Vec::new(),
        scenario: DEFAULT_SCENARIO.to_string(),
        settings,
        next_shell_id: 1,
        next_pane_id: 1,
        next_window_id: 1,
        next_session_id: 1,
    };
    let shell_id = spawn_shell(&mut state, Some(seed_filesystem()));
    let mut window = build_window(&mut state, shell_id, DEFAULT_WINDOW_NAME);
    for pane in &mut window.panes {
        pane.buffer.append_output(WELCOME);
    }
    let session_id = state.next_session_id;
    state.next_session_id += 1;
    state.sessions.push(Session {
        id: session_id,
        name: "0".to_string(),
        active_window_id: window.id,
        windows: vec![window],
        attached: true,
    });
    state.active_session_id = session_id;
    state.active_shell_id = shell_id;
    state
}

/// Build the named scenario. Unknown names fall back to the default and
/// leave a message saying so.
pub fn build(name: &str, settings: SimulatorSettings) -> SimulatorState {
    let mut state = initial_state(settings);
    match name {
        "default" => {}
        "split-panes" => {
            pane::split_active(&mut state, SplitDirection::Vertical);
        }
        "multi-window" => {
            if let Some(window) = state.active_window_mut() {
                window.name = "editor".to_string();
            }
            window_ops::new_window(&mut state, "logs");
            window_ops::new_window(&mut state, "build");
            if let Some(session) = state.active_session_mut() {
                if let Some(first) = session.windows.first() {
                    session.active_window_id = first.id;
                }
            }
        }
        "log-search" => {
            if let Some(shell) = state.active_shell_mut() {
                shell.fs.dirs.insert(home("logs"));
                shell.fs.files.insert(home("logs/app.log"), APP_LOG.to_string());
            }
            if let Some(pane) = state.active_pane_mut() {
                pane.buffer.append_output("learner@tmux-lab:~$ cat logs/app.log");
                pane.buffer.append_output(APP_LOG);
            }
        }
        "config-lab" => {
            if let Some(shell) = state.active_shell_mut() {
                shell.fs.files.insert(home(".tmux.conf"), SAMPLE_TMUX_CONF.to_string());
            }
        }
        unknown => {
            warn!(scenario = unknown, "unknown scenario, using default");
            state.push_message(format!("unknown scenario '{}', using {}", unknown, DEFAULT_SCENARIO));
            info!(scenario = DEFAULT_SCENARIO, "scenario initialised");
            return state;
        }
    }
    state.scenario = name.to_string();
    if let Some(id) = state.active_pane().map(|p| p.shell_id) {
        state.active_shell_id = id;
    }
    info!(scenario = name, "scenario initialised");
    state
}
