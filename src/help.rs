// ── src/help.rs ───────────────────────────────────────────────────────
// Reference text for the pseudo-shell `help` command: the default prefix
// table and the supported shell and tmux command subsets.
// ─────────────────────────────────────────────────────────────────────

/// Default prefix-table keybindings as `(key, description)`.
pub const PREFIX_DEFAULTS: &[(&str, &str)] = &[
    // ── Panes ──
    ("%",       "split-window -h (side by side)"),
    ("\"",      "split-window -v (stacked)"),
    ("h",       "select-pane -L (repeatable)"),
    ("j",       "select-pane -D (repeatable)"),
    ("k",       "select-pane -U (repeatable)"),
    ("l",       "select-pane -R (repeatable)"),
    ("Left",    "select-pane -L (repeatable)"),
    ("Down",    "select-pane -D (repeatable)"),
    ("Up",      "select-pane -U (repeatable)"),
    ("Right",   "select-pane -R (repeatable)"),
    ("H",       "resize-pane narrower (repeatable)"),
    ("L",       "resize-pane wider (repeatable)"),
    ("K",       "resize-pane shorter (repeatable)"),
    ("J",       "resize-pane taller (repeatable)"),
    // ── Windows and sessions ──
    ("c",       "new-window"),
    ("n",       "next-window"),
    ("p",       "previous-window"),
    ("s",       "new-session"),
    ("d",       "detach-client"),
    // ── Modes ──
    ("[",       "copy-mode"),
    (":",       "command-prompt"),
];

pub const SHELL_COMMANDS: &[(&str, &str)] = &[
    ("pwd",                     "print the working directory"),
    ("ls [path]",               "list a directory"),
    ("cd [path]",               "change directory"),
    ("mkdir [-p] <dir>",        "create a directory"),
    ("touch <file>",            "create an empty file"),
    ("cat <file>",              "print a file"),
    ("echo <text> [>|>> file]", "print text or write it to a file"),
    ("grep <pattern> <file>",   "print matching lines"),
    ("tail [-n N|-f] <file>",   "print the end of a file"),
    ("clear",                   "clear the pane"),
    ("history",                 "show command history"),
    ("help",                    "show this help"),
];

pub const TMUX_COMMANDS: &[&str] = &[
    "new-window",
    "new-session",
    "next-window",
    "previous-window",
    "kill-pane",
    "copy-mode",
    "split-window -h|-v",
    "select-pane -L|-R|-U|-D",
    "source-file <path>",
];

pub fn shell_help_lines() -> Vec<String> {
    let mut lines = vec!["Shell commands:".to_string()];
    lines.extend(SHELL_COMMANDS.iter().map(|(cmd, desc)| format!("  {:<26}{}", cmd, desc)));
    lines.push("tmux commands (optionally prefixed with `tmux`):".to_string());
    lines.extend(TMUX_COMMANDS.iter().map(|cmd| format!("  {}", cmd)));
    lines.push("Prefix keys (press the prefix, then):".to_string());
    lines.extend(PREFIX_DEFAULTS.iter().map(|(key, desc)| format!("  {:<8}{}", key, desc)));
    lines
}
