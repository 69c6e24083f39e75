use crossterm::event::{KeyCode, KeyModifiers};
use serde::{Deserialize, Serialize};

use crate::commands::{parse_command_line, parse_command_to_action, parse_source_file};
use crate::types::{ConfigError, Key, ModeKeys, TmuxConfigState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "kebab-case")]
pub enum ConfigDirective {
    SetPrefix { key: String },
    SetMouse { enabled: bool },
    SetModeKeys { mode_keys: ModeKeys },
    Bind { key: String, command: String },
    Unbind { key: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedConfig {
    pub directives: Vec<ConfigDirective>,
    pub errors: Vec<ConfigError>,
}

/// Parse a tmux config subset. Lines are 1-indexed; a line produces either
/// one directive or one error, never both.
pub fn parse_config(content: &str) -> ParsedConfig {
    let mut parsed = ParsedConfig::default();
    for (idx, line) in content.lines().enumerate() {
        let l = line.trim();
        if l.is_empty() || l.starts_with('#') { continue; }
        match parse_config_line(l) {
            Ok(Some(d)) => parsed.directives.push(d),
            Ok(None) => {}
            Err(message) => parsed.errors.push(ConfigError { line: idx + 1, message }),
        }
    }
    parsed
}

fn parse_config_line(line: &str) -> Result<Option<ConfigDirective>, String> {
    let parts = parse_command_line(line);
    let Some((cmd, args)) = parts.split_first() else { return Ok(None) };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match cmd.as_str() {
        "set" => parse_set_option(&args, false).map(Some),
        "setw" => parse_set_option(&args, true).map(Some),
        "bind" | "bind-key" => parse_bind_key(&args).map(Some),
        "unbind" | "unbind-key" => parse_unbind_key(&args).map(Some),
        other => Err(format!("unknown command '{}'", other)),
    }
}

fn parse_set_option(args: &[&str], window: bool) -> Result<ConfigDirective, String> {
    let cmd = if window { "setw" } else { "set" };
    let (option, value) = match args {
        ["-g", option, value] => (*option, *value),
        ["-g", option] => return Err(format!("{}: missing value for '{}'", cmd, option)),
        _ => return Err(format!("{}: expected '{} -g <option> <value>'", cmd, cmd)),
    };

    match (option, window) {
        ("prefix", false) => match value {
            "C-a" | "C-b" => Ok(ConfigDirective::SetPrefix { key: value.to_string() }),
            _ => Err(format!("invalid prefix '{}' (expected C-a or C-b)", value)),
        },
        ("mouse", false) => match value {
            "on" => Ok(ConfigDirective::SetMouse { enabled: true }),
            "off" => Ok(ConfigDirective::SetMouse { enabled: false }),
            _ => Err(format!("invalid value for mouse: '{}' (expected on or off)", value)),
        },
        ("mode-keys", true) => match value {
            "vi" => Ok(ConfigDirective::SetModeKeys { mode_keys: ModeKeys::Vi }),
            "emacs" => Ok(ConfigDirective::SetModeKeys { mode_keys: ModeKeys::Emacs }),
            _ => Err(format!("invalid value for mode-keys: '{}' (expected vi or emacs)", value)),
        },
        ("mode-keys", false) => Err("mode-keys is a window option, use 'setw -g mode-keys'".to_string()),
        _ => Err(format!("unknown option '{}'", option)),
    }
}

fn parse_bind_key(args: &[&str]) -> Result<ConfigDirective, String> {
    let Some((key, command)) = args.split_first() else {
        return Err("bind: missing key and command".to_string());
    };
    if command.is_empty() {
        return Err(format!("bind: missing command for key '{}'", key));
    }
    let Some(parsed) = parse_key_name(key) else {
        return Err(format!("bind: unknown key '{}'", key));
    };
    let command = command.join(" ");
    if parse_command_to_action(&command).is_none() && parse_source_file(&command).is_none() {
        return Err(format!("bind: unsupported command '{}'", command));
    }
    Ok(ConfigDirective::Bind { key: format_key_binding(&binding_key(parsed)), command })
}

fn parse_unbind_key(args: &[&str]) -> Result<ConfigDirective, String> {
    match args {
        [key] => match parse_key_name(key) {
            Some(parsed) => Ok(ConfigDirective::Unbind { key: format_key_binding(&binding_key(parsed)) }),
            None => Err(format!("unbind: unknown key '{}'", key)),
        },
        [] => Err("unbind: missing key".to_string()),
        _ => Err("unbind: expected exactly one key".to_string()),
    }
}

/// Apply directives in order; later directives override earlier ones.
pub fn apply_directives(config: &mut TmuxConfigState, directives: &[ConfigDirective]) {
    for d in directives {
        match d {
            ConfigDirective::SetPrefix { key } => {
                if let Some(k) = parse_key_name(key) {
                    config.prefix_key = k;
                }
            }
            ConfigDirective::SetMouse { enabled } => config.mouse = *enabled,
            ConfigDirective::SetModeKeys { mode_keys } => config.mode_keys = *mode_keys,
            ConfigDirective::Bind { key, command } => {
                config.unbound.remove(key);
                config.bindings.insert(key.clone(), command.clone());
            }
            ConfigDirective::Unbind { key } => {
                config.bindings.remove(key);
                config.unbound.insert(key.clone());
            }
        }
    }
}

/// Named keys in tmux spelling. The first entry for a code is the one
/// printed back; later entries are accepted aliases.
const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("Enter", KeyCode::Enter),
    ("Escape", KeyCode::Esc),
    ("Tab", KeyCode::Tab),
    ("Space", KeyCode::Char(' ')),
    ("BSpace", KeyCode::Backspace),
    ("DC", KeyCode::Delete),
    ("Home", KeyCode::Home),
    ("End", KeyCode::End),
    ("Up", KeyCode::Up),
    ("Down", KeyCode::Down),
    ("Left", KeyCode::Left),
    ("Right", KeyCode::Right),
    ("PPage", KeyCode::PageUp),
    ("NPage", KeyCode::PageDown),
    ("Esc", KeyCode::Esc),
    ("Backspace", KeyCode::Backspace),
    ("Delete", KeyCode::Delete),
    ("PageUp", KeyCode::PageUp),
    ("PageDown", KeyCode::PageDown),
];

/// The form keys take in binding tables. A character already carries its
/// shift state, so SHIFT is dropped for `Char`.
pub fn binding_key((code, mods): Key) -> Key {
    match code {
        KeyCode::Char(_) => (code, mods.difference(KeyModifiers::SHIFT)),
        _ => (code, mods),
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Parse a tmux key name like `C-a`, `M-x`, `Enter`, `BSpace` or `%`.
pub fn parse_key_name(name: &str) -> Option<Key> {
    let name = name.trim();
    if let Some(rest) = name.strip_prefix("C-") {
        return single_char(rest).map(|c| (KeyCode::Char(c.to_ascii_lowercase()), KeyModifiers::CONTROL));
    }
    if let Some(rest) = name.strip_prefix("M-") {
        return single_char(rest).map(|c| (KeyCode::Char(c), KeyModifiers::ALT));
    }
    if let Some(c) = single_char(name) {
        return Some((KeyCode::Char(c), KeyModifiers::NONE));
    }
    NAMED_KEYS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, code)| (*code, KeyModifiers::NONE))
}

/// Format a key back to tmux key-name syntax.
pub fn format_key_binding(&(code, mods): &Key) -> String {
    let mut out = String::new();
    if mods.contains(KeyModifiers::CONTROL) {
        out.push_str("C-");
    }
    if mods.contains(KeyModifiers::ALT) {
        out.push_str("M-");
    }
    match (NAMED_KEYS.iter().find(|(_, c)| *c == code), code) {
        (Some((name, _)), _) => out.push_str(name),
        (None, KeyCode::Char(c)) => out.push(c),
        (None, _) => out.push('?'),
    }
    out
}
