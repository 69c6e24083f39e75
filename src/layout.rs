use ratatui::layout::Rect;

use crate::types::*;

/// Layout tag for a window holding `pane_count` panes after a split in
/// `requested` direction.
pub fn resolve_layout(pane_count: usize, requested: SplitDirection) -> LayoutKind {
    match pane_count {
        0 | 1 => LayoutKind::Single,
        2 => match requested {
            SplitDirection::Vertical => LayoutKind::Vertical,
            SplitDirection::Horizontal => LayoutKind::Horizontal,
        },
        _ => LayoutKind::Grid,
    }
}

/// Split `extent` into `n` floored segments; the last absorbs the remainder.
/// Returns (offset, length) pairs relative to the start of the axis.
fn segments(extent: u16, n: usize) -> Vec<(u16, u16)> {
    if n == 0 {
        return Vec::new();
    }
    let base = extent / n as u16;
    let mut out = Vec::with_capacity(n);
    let mut offset = 0u16;
    for i in 0..n {
        let len = if i + 1 == n { extent - offset } else { base };
        out.push((offset, len));
        offset += len;
    }
    out
}

/// Assign geometry for `layout` inside `area`, in pane-list order.
pub fn compute_rects(count: usize, layout: LayoutKind, area: Rect) -> Vec<Rect> {
    match layout {
        LayoutKind::Single => (0..count)
            .map(|i| {
                let dy = (i as u16).min(area.height.saturating_sub(1));
                Rect::new(area.x, area.y + dy, area.width, area.height - dy)
            })
            .collect(),
        LayoutKind::Vertical => segments(area.width, count)
            .into_iter()
            .map(|(off, len)| Rect::new(area.x + off, area.y, len, area.height))
            .collect(),
        LayoutKind::Horizontal => segments(area.height, count)
            .into_iter()
            .map(|(off, len)| Rect::new(area.x, area.y + off, area.width, len))
            .collect(),
        LayoutKind::Grid => {
            if count == 0 {
                return Vec::new();
            }
            let columns = (count as f64).sqrt().ceil() as usize;
            let rows = count.div_ceil(columns);
            let mut out = Vec::with_capacity(count);
            for (r, (row_off, row_len)) in segments(area.height, rows).into_iter().enumerate() {
                let in_row = columns.min(count - r * columns);
                for (col_off, col_len) in segments(area.width, in_row) {
                    out.push(Rect::new(area.x + col_off, area.y + row_off, col_len, row_len));
                }
            }
            out
        }
    }
}

/// Re-tile `panes` for `layout` and size each terminal buffer to its pane.
pub fn apply_layout(panes: &mut [Pane], layout: LayoutKind, area: Rect) {
    let rects = compute_rects(panes.len(), layout, area);
    for (pane, rect) in panes.iter_mut().zip(rects) {
        pane.rect = rect;
        pane.buffer.resize(rect.width, rect.height);
    }
}

/// Nearest pane on the `dir` side of the active pane's center, by primary
/// axis distance then secondary axis distance. `None` when nothing lies
/// strictly on that side.
pub fn find_best_pane_in_direction(panes: &[Pane], active_pane_id: usize, dir: FocusDir) -> Option<usize> {
    let active = panes.iter().find(|p| p.id == active_pane_id)?;
    // Centers scaled by 2 to avoid fractional math
    let center = |r: &Rect| (r.x as i32 * 2 + r.width as i32, r.y as i32 * 2 + r.height as i32);
    let (ax, ay) = center(&active.rect);

    let mut candidates: Vec<(i32, i32, usize)> = panes
        .iter()
        .filter(|p| p.id != active_pane_id)
        .filter_map(|p| {
            let (cx, cy) = center(&p.rect);
            let on_side = match dir {
                FocusDir::Left => cx < ax,
                FocusDir::Right => cx > ax,
                FocusDir::Up => cy < ay,
                FocusDir::Down => cy > ay,
            };
            if !on_side {
                return None;
            }
            let (primary, secondary) = match dir {
                FocusDir::Left | FocusDir::Right => ((cx - ax).abs(), (cy - ay).abs()),
                FocusDir::Up | FocusDir::Down => ((cy - ay).abs(), (cx - ax).abs()),
            };
            Some((primary, secondary, p.id))
        })
        .collect();
    // stable: equal distances keep pane-list order
    candidates.sort_by_key(|&(primary, secondary, _)| (primary, secondary));
    candidates.first().map(|&(_, _, id)| id)
}
