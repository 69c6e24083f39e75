use std::collections::{BTreeMap, BTreeSet};

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Rect;
use serde::{Deserialize, Serialize};

use crate::line_editor::LineEditor;
use crate::settings::SimulatorSettings;
use crate::shell::FileSystem;
use crate::terminal::TerminalBuffer;

/// A key as (code, modifiers), the same shape bindings are compared in.
pub type Key = (KeyCode, KeyModifiers);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSession {
    pub id: usize,
    pub prompt: String,
    pub cwd: String,
    pub history: Vec<String>,
    pub fs: FileSystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pane {
    pub id: usize,
    pub title: String,
    pub shell_id: usize,
    pub buffer: TerminalBuffer,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind { Single, Vertical, Horizontal, Grid }

impl LayoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutKind::Single => "single",
            LayoutKind::Vertical => "vertical",
            LayoutKind::Horizontal => "horizontal",
            LayoutKind::Grid => "grid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: usize,
    pub name: String,
    pub panes: Vec<Pane>,
    pub active_pane_id: usize,
    pub layout: LayoutKind,
}

impl Window {
    pub fn active_pane(&self) -> Option<&Pane> {
        self.panes.iter().find(|p| p.id == self.active_pane_id)
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut Pane> {
        let id = self.active_pane_id;
        self.panes.iter_mut().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: usize,
    pub name: String,
    pub windows: Vec<Window>,
    pub active_window_id: usize,
    pub attached: bool,
}

impl Session {
    pub fn active_window(&self) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == self.active_window_id)
    }

    pub fn active_window_mut(&mut self) -> Option<&mut Window> {
        let id = self.active_window_id;
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn active_window_index(&self) -> Option<usize> {
        self.windows.iter().position(|w| w.id == self.active_window_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Normal,
    PrefixPending,
    CommandMode,
    CopyMode,
    SearchMode,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::PrefixPending => "PREFIX_PENDING",
            Mode::CommandMode => "COMMAND_MODE",
            Mode::CopyMode => "COPY_MODE",
            Mode::SearchMode => "SEARCH_MODE",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyModeState {
    pub query: String,
    pub search_executed: bool,
    pub match_found: bool,
    /// Indices into the active pane's line list.
    pub matches: Vec<usize>,
    pub active_match: Option<usize>,
}

/// Which prefix commands may repeat without the prefix key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatClass { Focus, Resize }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatWindow {
    pub class: RepeatClass,
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    pub mode: Mode,
    pub command_line: LineEditor,
    /// Position in the shell history while browsing; `None` means the draft.
    pub history_cursor: Option<usize>,
    pub history_draft: Option<String>,
    pub copy: CopyModeState,
    pub prefix_entered_at: Option<u64>,
    pub repeat: Option<RepeatWindow>,
}

impl Default for ModeState {
    fn default() -> Self {
        ModeState {
            mode: Mode::Normal,
            command_line: LineEditor::default(),
            history_cursor: None,
            history_draft: None,
            copy: CopyModeState::default(),
            prefix_entered_at: None,
            repeat: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKeys { Vi, Emacs }

impl ModeKeys {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeKeys::Vi => "vi",
            ModeKeys::Emacs => "emacs",
        }
    }
}

/// A config-file problem, 1-indexed by line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmuxConfigState {
    pub prefix_key: Key,
    pub mouse: bool,
    pub mode_keys: ModeKeys,
    /// Canonical key name -> bound command line.
    pub bindings: BTreeMap<String, String>,
    /// Default prefix-table keys removed with `unbind`.
    pub unbound: BTreeSet<String>,
    pub last_source: Option<String>,
    pub last_errors: Vec<ConfigError>,
}

impl Default for TmuxConfigState {
    fn default() -> Self {
        TmuxConfigState {
            prefix_key: (KeyCode::Char('b'), KeyModifiers::CONTROL),
            mouse: false,
            mode_keys: ModeKeys::Emacs,
            bindings: BTreeMap::new(),
            unbound: BTreeSet::new(),
            last_source: None,
            last_errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorState {
    pub shells: Vec<ShellSession>,
    pub active_shell_id: usize,
    pub sessions: Vec<Session>,
    pub active_session_id: usize,
    pub config: TmuxConfigState,
    pub mode: ModeState,
    pub messages: Vec<String>,
    pub action_history: Vec<String>,
    pub scenario: String,
    pub settings: SimulatorSettings,
    pub next_shell_id: usize,
    pub next_pane_id: usize,
    pub next_window_id: usize,
    pub next_session_id: usize,
}

impl SimulatorState {
    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == self.active_session_id)
    }

    pub fn active_session_mut(&mut self) -> Option<&mut Session> {
        let id = self.active_session_id;
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn active_window(&self) -> Option<&Window> {
        self.active_session().and_then(Session::active_window)
    }

    pub fn active_window_mut(&mut self) -> Option<&mut Window> {
        self.active_session_mut().and_then(Session::active_window_mut)
    }

    pub fn active_pane(&self) -> Option<&Pane> {
        self.active_window().and_then(Window::active_pane)
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut Pane> {
        self.active_window_mut().and_then(Window::active_pane_mut)
    }

    pub fn active_shell(&self) -> Option<&ShellSession> {
        self.shells.iter().find(|s| s.id == self.active_shell_id)
    }

    pub fn active_shell_mut(&mut self) -> Option<&mut ShellSession> {
        let id = self.active_shell_id;
        self.shells.iter_mut().find(|s| s.id == id)
    }

    pub fn viewport(&self) -> Rect {
        Rect::new(0, 0, self.settings.viewport_width, self.settings.viewport_height)
    }

    pub fn push_message(&mut self, msg: impl Into<String>) {
        self.messages.push(msg.into());
        let cap = self.settings.message_log_limit;
        if self.messages.len() > cap {
            let excess = self.messages.len() - cap;
            self.messages.drain(..excess);
        }
    }

    pub fn record_action(&mut self, entry: impl Into<String>) {
        self.action_history.push(entry.into());
        let cap = self.settings.action_log_limit;
        if self.action_history.len() > cap {
            let excess = self.action_history.len() - cap;
            self.action_history.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusDir { Left, Right, Up, Down }

impl FocusDir {
    pub fn as_str(self) -> &'static str {
        match self {
            FocusDir::Left => "left",
            FocusDir::Right => "right",
            FocusDir::Up => "up",
            FocusDir::Down => "down",
        }
    }
}

/// `Vertical` places the new pane beside the old one (`%`, `split-window -h`),
/// `Horizontal` stacks it below (`"`, `split-window -v`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection { Vertical, Horizontal }

impl SplitDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitDirection::Vertical => "vertical",
            SplitDirection::Horizontal => "horizontal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeAxis { X, Y }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDirection { Older, Newer }

/// Every state transition the reducer understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    InitScenario { scenario: Option<String> },
    Reset,
    /// A keystroke with no simulator meaning, by tmux key name.
    RawKey { key: String },
    EnterPrefix { at: u64 },
    CancelPrefix,
    UnmappedPrefixKey { key: String },
    ExtendRepeatWindow { class: RepeatClass, until: u64 },
    ClearRepeatWindow,
    SplitPane { direction: SplitDirection },
    KillActivePane,
    FocusPane { direction: FocusDir },
    ResizePane { axis: ResizeAxis, delta: i32 },
    NewWindow,
    NextWindow,
    PrevWindow,
    NewSession,
    Detach,
    EnterCommandMode,
    ExitCommandMode,
    SetCommandLine { buffer: String, cursor: usize },
    NavigateCommandHistory { direction: HistoryDirection },
    ExecuteCommand { command: String },
    ApplyTmuxConfig { content: String, source_path: Option<String> },
    EnterCopyMode,
    ExitCopyMode,
    RunCopySearch { query: String },
    AdvanceCopyMatch { delta: i32 },
    ScrollPane { delta: i64 },
    PaneOutput { text: String },
}

impl Action {
    pub fn tag(&self) -> &'static str {
        match self {
            Action::InitScenario { .. } => "INIT_SCENARIO",
            Action::Reset => "RESET",
            Action::RawKey { .. } => "RAW_KEY",
            Action::EnterPrefix { .. } => "ENTER_PREFIX",
            Action::CancelPrefix => "CANCEL_PREFIX",
            Action::UnmappedPrefixKey { .. } => "UNMAPPED_PREFIX_KEY",
            Action::ExtendRepeatWindow { .. } => "EXTEND_REPEAT_WINDOW",
            Action::ClearRepeatWindow => "CLEAR_REPEAT_WINDOW",
            Action::SplitPane { .. } => "SPLIT_PANE",
            Action::KillActivePane => "KILL_ACTIVE_PANE",
            Action::FocusPane { .. } => "FOCUS_PANE",
            Action::ResizePane { .. } => "RESIZE_PANE",
            Action::NewWindow => "NEW_WINDOW",
            Action::NextWindow => "NEXT_WINDOW",
            Action::PrevWindow => "PREV_WINDOW",
            Action::NewSession => "NEW_SESSION",
            Action::Detach => "DETACH",
            Action::EnterCommandMode => "ENTER_COMMAND_MODE",
            Action::ExitCommandMode => "EXIT_COMMAND_MODE",
            Action::SetCommandLine { .. } => "SET_COMMAND_LINE",
            Action::NavigateCommandHistory { .. } => "NAVIGATE_COMMAND_HISTORY",
            Action::ExecuteCommand { .. } => "EXECUTE_COMMAND",
            Action::ApplyTmuxConfig { .. } => "APPLY_TMUX_CONFIG",
            Action::EnterCopyMode => "ENTER_COPY_MODE",
            Action::ExitCopyMode => "EXIT_COPY_MODE",
            Action::RunCopySearch { .. } => "RUN_COPY_SEARCH",
            Action::AdvanceCopyMatch { .. } => "ADVANCE_COPY_MATCH",
            Action::ScrollPane { .. } => "SCROLL_PANE",
            Action::PaneOutput { .. } => "PANE_OUTPUT",
        }
    }
}
