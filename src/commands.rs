use crate::types::{Action, FocusDir, SplitDirection};

/// Split a command line into arguments, respecting single and double
/// quotes. An unquoted `#` at the start of a word ends the line.
pub fn parse_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for c in line.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    escape_next = true;
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                    has_token = true;
                } else if c.is_whitespace() {
                    if has_token {
                        args.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                } else if c == '#' && !has_token {
                    break;
                } else {
                    current.push(c);
                    has_token = true;
                }
            }
        }
    }

    if has_token {
        args.push(current);
    }
    args
}

/// The closed tmux command subset. Anything outside it, or with the wrong
/// arguments, is `None`.
pub fn parse_command_to_action(cmd: &str) -> Option<Action> {
    let parts = parse_command_line(cmd);
    let (name, args) = parts.split_first()?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let zero_arg = |action: Action| if args.is_empty() { Some(action) } else { None };

    match name.as_str() {
        "new-window" => zero_arg(Action::NewWindow),
        "new-session" => zero_arg(Action::NewSession),
        "next-window" => zero_arg(Action::NextWindow),
        "previous-window" => zero_arg(Action::PrevWindow),
        "kill-pane" => zero_arg(Action::KillActivePane),
        "copy-mode" => zero_arg(Action::EnterCopyMode),
        "split-window" => match args.as_slice() {
            ["-h"] => Some(Action::SplitPane { direction: SplitDirection::Vertical }),
            ["-v"] => Some(Action::SplitPane { direction: SplitDirection::Horizontal }),
            _ => None,
        },
        "select-pane" => {
            let direction = match args.as_slice() {
                ["-L"] => FocusDir::Left,
                ["-R"] => FocusDir::Right,
                ["-U"] => FocusDir::Up,
                ["-D"] => FocusDir::Down,
                _ => return None,
            };
            Some(Action::FocusPane { direction })
        }
        _ => None,
    }
}

/// Format an action back to the command string that produces it, when one
/// exists in the subset.
pub fn format_action(action: &Action) -> Option<String> {
    let s = match action {
        Action::NewWindow => "new-window".to_string(),
        Action::NewSession => "new-session".to_string(),
        Action::NextWindow => "next-window".to_string(),
        Action::PrevWindow => "previous-window".to_string(),
        Action::KillActivePane => "kill-pane".to_string(),
        Action::EnterCopyMode => "copy-mode".to_string(),
        Action::SplitPane { direction: SplitDirection::Vertical } => "split-window -h".to_string(),
        Action::SplitPane { direction: SplitDirection::Horizontal } => "split-window -v".to_string(),
        Action::FocusPane { direction } => {
            let flag = match direction {
                FocusDir::Up => "-U",
                FocusDir::Down => "-D",
                FocusDir::Left => "-L",
                FocusDir::Right => "-R",
            };
            format!("select-pane {}", flag)
        }
        _ => return None,
    };
    Some(s)
}

/// `source-file <path>` (or `source <path>`) with an optional leading
/// `tmux `. Returns the raw path argument, or `Some(None)` for a bare
/// `source-file` with no path.
pub fn parse_source_file(cmd: &str) -> Option<Option<String>> {
    let parts = parse_command_line(strip_tmux_prefix(cmd));
    match parts.first().map(String::as_str) {
        Some("source-file") | Some("source") => Some(parts.get(1).cloned()),
        _ => None,
    }
}

pub fn strip_tmux_prefix(cmd: &str) -> &str {
    let trimmed = cmd.trim();
    match trimmed.strip_prefix("tmux") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => trimmed,
    }
}
