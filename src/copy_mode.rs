use crate::types::*;

pub fn in_copy_mode(state: &SimulatorState) -> bool {
    matches!(state.mode.mode, Mode::CopyMode | Mode::SearchMode)
}

pub fn enter_copy_mode(state: &mut SimulatorState) {
    state.mode.mode = Mode::CopyMode;
    state.mode.copy = CopyModeState::default();
}

/// Leave copy mode and snap the active pane back to its newest output.
/// The search outcome flags survive until the next entry or search.
pub fn exit_copy_mode(state: &mut SimulatorState) {
    state.mode.mode = Mode::Normal;
    let copy = &mut state.mode.copy;
    copy.query.clear();
    copy.matches.clear();
    copy.active_match = None;
    if let Some(pane) = state.active_pane_mut() {
        pane.buffer.set_viewport_to_bottom();
    }
}

/// Line indices in `lines` containing `query`, ignoring case.
pub fn find_matches<'a>(lines: impl Iterator<Item = &'a str>, query: &str) -> Vec<usize> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    lines
        .enumerate()
        .filter(|(_, text)| text.to_lowercase().contains(&needle))
        .map(|(i, _)| i)
        .collect()
}

/// Search the active pane and scroll to the first hit.
pub fn run_search(state: &mut SimulatorState, query: &str) {
    let matches = state
        .active_pane()
        .map(|p| find_matches(p.buffer.lines.iter().map(|l| l.text.as_str()), query))
        .unwrap_or_default();
    if let (Some(&first), Some(pane)) = (matches.first(), state.active_pane_mut()) {
        pane.buffer.set_viewport_top(first);
    }
    state.mode.copy = CopyModeState {
        query: query.to_string(),
        search_executed: !query.is_empty(),
        match_found: !matches.is_empty(),
        active_match: if matches.is_empty() { None } else { Some(0) },
        matches,
    };
    state.mode.mode = Mode::SearchMode;
}

/// Step the active match cyclically by `delta`; false without matches.
pub fn advance_match(state: &mut SimulatorState, delta: i32) -> bool {
    let copy = &mut state.mode.copy;
    if copy.matches.is_empty() {
        return false;
    }
    let n = copy.matches.len() as i64;
    let current = copy.active_match.unwrap_or(0) as i64;
    let next = (current + delta as i64).rem_euclid(n) as usize;
    copy.active_match = Some(next);
    let line = copy.matches[next];
    if let Some(pane) = state.active_pane_mut() {
        pane.buffer.set_viewport_top(line);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::initial_state;
    use crate::settings::SimulatorSettings;

    fn with_log() -> SimulatorState {
        let mut s = initial_state(SimulatorSettings::default());
        let pane = s.active_pane_mut().unwrap();
        pane.buffer.clear();
        for i in 0..100 {
            let line = if i % 30 == 5 { format!("{} ERROR disk full", i) } else { format!("{} ok", i) };
            pane.buffer.append_output(&line);
        }
        s
    }

    #[test]
    fn test_search_is_case_insensitive_and_scrolls() {
        let mut s = with_log();
        enter_copy_mode(&mut s);
        run_search(&mut s, "error");
        let copy = &s.mode.copy;
        assert_eq!(copy.matches, vec![5, 35, 65, 95]);
        assert!(copy.search_executed && copy.match_found);
        assert_eq!(copy.active_match, Some(0));
        assert_eq!(s.mode.mode, Mode::SearchMode);
        assert_eq!(s.active_pane().unwrap().buffer.viewport_top, 5);
    }

    #[test]
    fn test_search_without_hits_keeps_viewport() {
        let mut s = with_log();
        enter_copy_mode(&mut s);
        let top = s.active_pane().unwrap().buffer.viewport_top;
        run_search(&mut s, "panic");
        assert!(s.mode.copy.search_executed);
        assert!(!s.mode.copy.match_found);
        assert_eq!(s.active_pane().unwrap().buffer.viewport_top, top);
        assert!(!advance_match(&mut s, 1));
    }

    #[test]
    fn test_advance_cycles_both_ways() {
        let mut s = with_log();
        enter_copy_mode(&mut s);
        run_search(&mut s, "ERROR");
        assert!(advance_match(&mut s, -1));
        assert_eq!(s.mode.copy.active_match, Some(3));
        // 95 is past max_top, so the viewport clamps
        assert_eq!(s.active_pane().unwrap().buffer.viewport_top, s.active_pane().unwrap().buffer.max_top());
        assert!(advance_match(&mut s, 1));
        assert_eq!(s.mode.copy.active_match, Some(0));
    }

    #[test]
    fn test_exit_returns_to_bottom() {
        let mut s = with_log();
        enter_copy_mode(&mut s);
        run_search(&mut s, "error");
        exit_copy_mode(&mut s);
        assert_eq!(s.mode.mode, Mode::Normal);
        assert!(s.active_pane().unwrap().buffer.is_at_bottom());
        let copy = &s.mode.copy;
        assert!(copy.matches.is_empty() && copy.query.is_empty());
        assert_eq!(copy.active_match, None);
        assert!(copy.search_executed && copy.match_found);
    }

    #[test]
    fn test_reentry_resets_search_flags() {
        let mut s = with_log();
        enter_copy_mode(&mut s);
        run_search(&mut s, "error");
        exit_copy_mode(&mut s);
        enter_copy_mode(&mut s);
        assert_eq!(s.mode.copy, CopyModeState::default());
    }
}
