use crate::layout::{apply_layout, find_best_pane_in_direction, resolve_layout};
use crate::terminal::TerminalBuffer;
use crate::types::*;

pub const MIN_PANE_WIDTH: u16 = 10;
pub const MIN_PANE_HEIGHT: u16 = 5;

/// Allocate a full-viewport pane bound to `shell_id`. The caller places it.
pub fn new_pane(state: &mut SimulatorState, shell_id: usize) -> Pane {
    let id = state.next_pane_id;
    state.next_pane_id += 1;
    let area = state.viewport();
    Pane {
        id,
        title: format!("pane {}", id),
        shell_id,
        buffer: TerminalBuffer::new(area.width, area.height, state.settings.scrollback_limit),
        rect: area,
    }
}

/// Split the active pane. The new pane shares the active pane's shell and
/// becomes active.
pub fn split_active(state: &mut SimulatorState, direction: SplitDirection) -> bool {
    let area = state.viewport();
    let Some(shell_id) = state.active_pane().map(|p| p.shell_id) else { return false };
    let pane = new_pane(state, shell_id);
    let Some(win) = state.active_window_mut() else { return false };
    let pane_id = pane.id;
    win.panes.push(pane);
    win.layout = resolve_layout(win.panes.len(), direction);
    apply_layout(&mut win.panes, win.layout, area);
    win.active_pane_id = pane_id;
    true
}

/// Remove the active pane unless it is the last one in its window.
pub fn kill_active(state: &mut SimulatorState) -> bool {
    let area = state.viewport();
    let Some(win) = state.active_window_mut() else { return false };
    if win.panes.len() <= 1 {
        return false;
    }
    let id = win.active_pane_id;
    win.panes.retain(|p| p.id != id);
    let Some(first) = win.panes.first() else { return false };
    win.active_pane_id = first.id;
    win.layout = match (win.panes.len(), win.layout) {
        (1, _) => LayoutKind::Single,
        (_, LayoutKind::Grid) => LayoutKind::Vertical,
        (_, kept) => kept,
    };
    apply_layout(&mut win.panes, win.layout, area);
    true
}

/// Move focus to the nearest pane in `dir`. False when nothing lies there.
pub fn focus(state: &mut SimulatorState, dir: FocusDir) -> bool {
    let Some(win) = state.active_window_mut() else { return false };
    match find_best_pane_in_direction(&win.panes, win.active_pane_id, dir) {
        Some(id) => {
            win.active_pane_id = id;
            true
        }
        None => false,
    }
}

/// Grow or shrink the active pane along one axis, clamped to the minimum
/// pane size and the space left in the viewport.
pub fn resize_active(state: &mut SimulatorState, axis: ResizeAxis, delta: i32) -> bool {
    let area = state.viewport();
    let Some(pane) = state.active_pane_mut() else { return false };
    let clamp = |current: u16, offset: u16, extent: u16, min: u16| {
        let max = extent.saturating_sub(offset).max(min);
        (current as i64 + delta as i64).clamp(min as i64, max as i64) as u16
    };
    let before = pane.rect;
    match axis {
        ResizeAxis::X => pane.rect.width = clamp(pane.rect.width, pane.rect.x, area.width, MIN_PANE_WIDTH),
        ResizeAxis::Y => pane.rect.height = clamp(pane.rect.height, pane.rect.y, area.height, MIN_PANE_HEIGHT),
    }
    if pane.rect == before {
        return false;
    }
    pane.buffer.resize(pane.rect.width, pane.rect.height);
    true
}
