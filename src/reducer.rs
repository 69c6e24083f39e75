use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::commands::{parse_command_to_action, parse_source_file, strip_tmux_prefix};
use crate::config::{apply_directives, parse_config};
use crate::copy_mode;
use crate::line_editor::LineEditor;
use crate::pane;
use crate::scenario;
use crate::shell::{execute_shell, normalize_path, render_prompt, ShellEffect, ShellOutcome};
use crate::types::*;
use crate::window_ops;

/// Follow-up actions nested deeper than this are dropped.
pub const MAX_FOLLOW_UP_DEPTH: usize = 8;

/// Apply `action` and every follow-up it produces, returning the new state.
/// The input state is left untouched.
pub fn reduce(state: &SimulatorState, action: &Action) -> SimulatorState {
    let mut next = state.clone();
    let mut queue: VecDeque<(Action, usize)> = VecDeque::new();
    queue.push_back((action.clone(), 0));
    while let Some((action, depth)) = queue.pop_front() {
        debug!(action = action.tag(), depth, "reduce");
        let follow_ups = apply(&mut next, &action);
        if follow_ups.is_empty() {
            continue;
        }
        if depth + 1 >= MAX_FOLLOW_UP_DEPTH {
            warn!(action = action.tag(), depth, "follow-up depth exceeded, dropping {} action(s)", follow_ups.len());
            continue;
        }
        // depth-first: follow-ups run before anything queued after them
        for follow in follow_ups.into_iter().rev() {
            queue.push_front((follow, depth + 1));
        }
    }
    next
}

/// Left fold of `reduce` over `actions`.
pub fn reduce_all<'a>(state: &SimulatorState, actions: impl IntoIterator<Item = &'a Action>) -> SimulatorState {
    actions.into_iter().fold(state.clone(), |acc, action| reduce(&acc, action))
}

/// One transition in place. Returns the follow-up actions to run next, in
/// order.
pub fn apply(state: &mut SimulatorState, action: &Action) -> Vec<Action> {
    let mut follow_ups = Vec::new();
    match action {
        Action::InitScenario { scenario } => {
            let name = scenario.as_deref().unwrap_or(scenario::DEFAULT_SCENARIO);
            *state = scenario::build(name, state.settings.clone());
        }
        Action::Reset => *state = scenario::initial_state(state.settings.clone()),
        Action::RawKey { key } => state.record_action(format!("key.{}", key)),
        Action::EnterPrefix { at } => {
            state.mode.mode = Mode::PrefixPending;
            state.mode.prefix_entered_at = Some(*at);
            state.mode.repeat = None;
            state.record_action("prefix");
        }
        Action::CancelPrefix => {
            if state.mode.mode == Mode::PrefixPending {
                state.mode.mode = Mode::Normal;
            }
            state.mode.prefix_entered_at = None;
        }
        Action::UnmappedPrefixKey { key } => {
            state.record_action(format!("prefix.unmapped.{}", key));
            state.push_message(format!("No binding for prefix + {}", key));
        }
        Action::ExtendRepeatWindow { class, until } => {
            state.mode.repeat = Some(RepeatWindow { class: *class, expires_at: *until });
        }
        Action::ClearRepeatWindow => state.mode.repeat = None,
        Action::SplitPane { direction } => {
            if pane::split_active(state, *direction) {
                state.record_action(format!("pane.split.{}", direction.as_str()));
            }
        }
        Action::KillActivePane => {
            if pane::kill_active(state) {
                state.record_action("pane.kill");
            }
        }
        Action::FocusPane { direction } => {
            if pane::focus(state, *direction) {
                state.record_action(format!("pane.focus.{}", direction.as_str()));
            }
        }
        Action::ResizePane { axis, delta } => {
            if pane::resize_active(state, *axis, *delta) {
                let axis = match axis {
                    ResizeAxis::X => "x",
                    ResizeAxis::Y => "y",
                };
                state.record_action(format!("pane.resize.{}", axis));
            }
        }
        Action::NewWindow => {
            if window_ops::new_window(state, window_ops::DEFAULT_WINDOW_NAME) {
                state.record_action("window.new");
            }
        }
        Action::NextWindow => {
            if window_ops::next_window(state) {
                state.record_action("window.next");
            }
        }
        Action::PrevWindow => {
            if window_ops::prev_window(state) {
                state.record_action("window.prev");
            }
        }
        Action::NewSession => {
            window_ops::new_session(state, None);
            state.record_action("session.new");
        }
        Action::Detach => {
            let name = state.active_session().map(|s| s.name.clone()).unwrap_or_default();
            state.push_message(format!("[detached (from session {})]", name));
            state.record_action("client.detach");
        }
        Action::EnterCommandMode => {
            state.mode.mode = Mode::CommandMode;
            reset_command_line(state);
            state.record_action("mode.command");
        }
        Action::ExitCommandMode => {
            if state.mode.mode == Mode::CommandMode {
                state.mode.mode = Mode::Normal;
            }
            reset_command_line(state);
        }
        Action::SetCommandLine { buffer, cursor } => {
            let len = buffer.chars().count();
            state.mode.command_line = LineEditor { buffer: buffer.clone(), cursor: (*cursor).min(len) };
        }
        Action::NavigateCommandHistory { direction } => navigate_history(state, *direction),
        Action::ExecuteCommand { command } => follow_ups = execute_command(state, command),
        Action::ApplyTmuxConfig { content, source_path } => apply_config(state, content, source_path.as_deref()),
        Action::EnterCopyMode => {
            copy_mode::enter_copy_mode(state);
            state.record_action("copy.enter");
        }
        Action::ExitCopyMode => {
            if copy_mode::in_copy_mode(state) {
                copy_mode::exit_copy_mode(state);
                state.record_action("copy.exit");
            }
        }
        Action::RunCopySearch { query } => {
            if copy_mode::in_copy_mode(state) {
                copy_mode::run_search(state, query);
                state.record_action("copy.search");
            }
        }
        Action::AdvanceCopyMatch { delta } => {
            if copy_mode::advance_match(state, *delta) {
                state.record_action(if *delta < 0 { "copy.match.prev" } else { "copy.match.next" });
            }
        }
        Action::ScrollPane { delta } => {
            if let Some(pane) = state.active_pane_mut() {
                pane.buffer.scroll_viewport(*delta);
            }
        }
        Action::PaneOutput { text } => {
            if let Some(pane) = state.active_pane_mut() {
                pane.buffer.append_output(text);
            }
        }
    }
    sync_active_shell(state);
    follow_ups
}

fn sync_active_shell(state: &mut SimulatorState) {
    if let Some(id) = state.active_pane().map(|p| p.shell_id) {
        state.active_shell_id = id;
    }
}

fn reset_command_line(state: &mut SimulatorState) {
    state.mode.command_line = LineEditor::default();
    state.mode.history_cursor = None;
    state.mode.history_draft = None;
}

fn navigate_history(state: &mut SimulatorState, direction: HistoryDirection) {
    if state.mode.mode != Mode::CommandMode {
        return;
    }
    let active = state.active_shell_id;
    let history: &[String] = state
        .shells
        .iter()
        .find(|s| s.id == active)
        .map(|s| s.history.as_slice())
        .unwrap_or(&[]);
    let Some(last) = history.len().checked_sub(1) else { return };
    let mode = &mut state.mode;
    match (direction, mode.history_cursor) {
        (HistoryDirection::Older, None) => {
            mode.history_draft = Some(mode.command_line.buffer.clone());
            mode.history_cursor = Some(last);
            mode.command_line = LineEditor::new(&history[last]);
        }
        (HistoryDirection::Older, Some(i)) => {
            let idx = i.min(last).saturating_sub(1);
            mode.history_cursor = Some(idx);
            mode.command_line = LineEditor::new(&history[idx]);
        }
        (HistoryDirection::Newer, None) => {}
        (HistoryDirection::Newer, Some(i)) if i < last => {
            mode.history_cursor = Some(i + 1);
            mode.command_line = LineEditor::new(&history[i + 1]);
        }
        (HistoryDirection::Newer, Some(_)) => {
            mode.history_cursor = None;
            let draft = mode.history_draft.take().unwrap_or_default();
            mode.command_line = LineEditor::new(&draft);
        }
    }
}

/// Shell first, then the tmux subset. `source-file` short-circuits both.
fn execute_command(state: &mut SimulatorState, raw: &str) -> Vec<Action> {
    let command = raw.trim();
    if command.is_empty() {
        return Vec::new();
    }
    let limit = state.settings.shell_history_limit;
    if let Some(shell) = state.active_shell_mut() {
        shell.record_history(command, limit);
    }
    state.record_action(format!("command:{}", command));

    if let Some(path) = parse_source_file(command) {
        let Some(path) = path else {
            state.push_message("source-file: missing path");
            return Vec::new();
        };
        let found = state.active_shell().and_then(|shell| {
            let resolved = normalize_path(&shell.cwd, &path);
            shell.fs.read(&resolved).map(|content| (resolved.clone(), content.to_string()))
        });
        return match found {
            Some((resolved, content)) => vec![Action::ApplyTmuxConfig { content, source_path: Some(resolved) }],
            None => {
                state.push_message(format!("source-file: {}: No such file or directory", path));
                Vec::new()
            }
        };
    }

    let outcome = state
        .active_shell()
        .map_or(ShellOutcome::NotHandled, |shell| execute_shell(shell, command));
    if let ShellOutcome::Handled(effect) = outcome {
        apply_shell_effect(state, command, effect);
        return Vec::new();
    }

    if let Some(action) = parse_command_to_action(strip_tmux_prefix(command)) {
        return vec![action];
    }
    state.push_message(format!("unsupported command: {}", command));
    Vec::new()
}

fn apply_shell_effect(state: &mut SimulatorState, command: &str, effect: ShellEffect) {
    let prompt = state.active_shell().map(|s| s.prompt.clone()).unwrap_or_default();
    if let Some(shell) = state.active_shell_mut() {
        if let Some(fs) = effect.fs {
            shell.fs = fs;
        }
        if let Some(cwd) = effect.cwd {
            shell.prompt = render_prompt(&cwd);
            shell.cwd = cwd;
        }
    }
    let Some(pane) = state.active_pane_mut() else { return };
    if effect.clear_screen {
        pane.buffer.clear();
        return;
    }
    pane.buffer.append_output(&format!("{}{}", prompt, command));
    for line in &effect.output {
        pane.buffer.append_output(line);
    }
}

fn apply_config(state: &mut SimulatorState, content: &str, source_path: Option<&str>) {
    let parsed = parse_config(content);
    apply_directives(&mut state.config, &parsed.directives);
    let source = source_path.unwrap_or("config");
    for err in &parsed.errors {
        warn!(source, line = err.line, "config error: {}", err.message);
    }
    state.push_message(format!(
        "{}: applied {} directive(s), {} error(s)",
        source,
        parsed.directives.len(),
        parsed.errors.len()
    ));
    for err in &parsed.errors {
        state.push_message(format!("{}:{}: {}", source, err.line, err.message));
    }
    state.config.last_source = source_path.map(str::to_string);
    state.config.last_errors = parsed.errors;
    state.record_action("config.apply");
}
