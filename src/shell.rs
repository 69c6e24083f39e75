use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::commands::parse_command_line;
use crate::help::shell_help_lines;
use crate::types::ShellSession;

pub const HOME_DIR: &str = "/home/learner";
const PROMPT_USER: &str = "learner@tmux-lab";
const TAIL_DEFAULT_LINES: usize = 10;

/// In-memory filesystem keyed by normalized absolute paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystem {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, String>,
}

impl FileSystem {
    /// A filesystem holding `/` and every ancestor of `home`.
    pub fn with_home(home: &str) -> Self {
        let mut fs = FileSystem::default();
        fs.dirs.insert("/".to_string());
        let mut path = String::new();
        for part in home.split('/').filter(|p| !p.is_empty()) {
            path.push('/');
            path.push_str(part);
            fs.dirs.insert(path.clone());
        }
        fs
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.is_dir(path) || self.is_file(path)
    }

    pub fn read(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Immediate children of `dir`, directories suffixed with `/`.
    pub fn list(&self, dir: &str) -> Vec<String> {
        let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
        let child = |p: &String| -> Option<String> {
            let rest = p.strip_prefix(&prefix)?;
            if rest.is_empty() || rest.contains('/') { None } else { Some(rest.to_string()) }
        };
        let mut entries: Vec<String> = self.dirs.iter().filter_map(child).map(|d| format!("{}/", d)).collect();
        entries.extend(self.files.keys().filter_map(child));
        entries.sort();
        entries
    }
}

pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Resolve `path` against `cwd` into a normalized absolute path:
/// `~` expands to the home directory, `.`/`..` collapse, trailing slashes go.
pub fn normalize_path(cwd: &str, path: &str) -> String {
    let joined = if path == "~" {
        HOME_DIR.to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{}", HOME_DIR, rest)
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };
    let mut stack: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => { stack.pop(); }
            p => stack.push(p),
        }
    }
    format!("/{}", stack.join("/"))
}

/// How `cwd` appears in a prompt.
pub fn display_path(cwd: &str) -> String {
    if cwd == HOME_DIR {
        "~".to_string()
    } else if let Some(rest) = cwd.strip_prefix(&format!("{}/", HOME_DIR)) {
        format!("~/{}", rest)
    } else {
        cwd.to_string()
    }
}

pub fn render_prompt(cwd: &str) -> String {
    format!("{}:{}$ ", PROMPT_USER, display_path(cwd))
}

impl ShellSession {
    pub fn new(id: usize, fs: FileSystem) -> Self {
        ShellSession {
            id,
            prompt: render_prompt(HOME_DIR),
            cwd: HOME_DIR.to_string(),
            history: Vec::new(),
            fs,
        }
    }

    pub fn record_history(&mut self, command: &str, limit: usize) {
        self.history.push(command.to_string());
        if self.history.len() > limit {
            let excess = self.history.len() - limit;
            self.history.drain(..excess);
        }
    }
}

/// What a handled command does to its shell and pane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellEffect {
    pub output: Vec<String>,
    pub fs: Option<FileSystem>,
    pub cwd: Option<String>,
    pub clear_screen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutcome {
    /// Not a pseudo-shell command; the caller may try something else.
    NotHandled,
    Handled(ShellEffect),
}

fn output(lines: Vec<String>) -> ShellOutcome {
    ShellOutcome::Handled(ShellEffect { output: lines, ..Default::default() })
}

fn line(s: impl Into<String>) -> ShellOutcome {
    output(vec![s.into()])
}

/// Run one command line against `shell`. Never mutates; effects come back
/// in the outcome.
pub fn execute_shell(shell: &ShellSession, input: &str) -> ShellOutcome {
    let parts = parse_command_line(input);
    let Some((cmd, args)) = parts.split_first() else { return ShellOutcome::NotHandled };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let resolve = |p: &str| normalize_path(&shell.cwd, p);
    let fs = &shell.fs;

    match cmd.as_str() {
        "pwd" => line(shell.cwd.clone()),
        "ls" => {
            let target = args.iter().find(|a| !a.starts_with('-')).copied();
            let path = target.map(resolve).unwrap_or_else(|| shell.cwd.clone());
            if fs.is_dir(&path) {
                let entries = fs.list(&path);
                if entries.is_empty() { output(Vec::new()) } else { line(entries.join("  ")) }
            } else if fs.is_file(&path) {
                line(target.unwrap_or_default().to_string())
            } else {
                line(format!("ls: cannot access '{}': No such file or directory", target.unwrap_or_default()))
            }
        }
        "cd" => {
            let target = args.first().copied().unwrap_or("~");
            let path = resolve(target);
            if fs.is_dir(&path) {
                ShellOutcome::Handled(ShellEffect { cwd: Some(path), ..Default::default() })
            } else if fs.is_file(&path) {
                line(format!("cd: not a directory: {}", target))
            } else {
                line(format!("cd: no such file or directory: {}", target))
            }
        }
        "mkdir" => {
            let parents = args.contains(&"-p");
            let targets: Vec<&str> = args.iter().filter(|a| !a.starts_with('-')).copied().collect();
            if targets.is_empty() {
                return line("mkdir: missing operand");
            }
            let mut next = fs.clone();
            let mut lines = Vec::new();
            for t in targets {
                let path = resolve(t);
                if next.exists(&path) {
                    if !(parents && next.is_dir(&path)) {
                        lines.push(format!("mkdir: cannot create directory '{}': File exists", t));
                    }
                } else if parents {
                    let mut cur = String::new();
                    for part in path.split('/').filter(|p| !p.is_empty()) {
                        cur.push('/');
                        cur.push_str(part);
                        next.dirs.insert(cur.clone());
                    }
                } else if next.is_dir(parent_dir(&path)) {
                    next.dirs.insert(path);
                } else {
                    lines.push(format!("mkdir: cannot create directory '{}': No such file or directory", t));
                }
            }
            ShellOutcome::Handled(ShellEffect { output: lines, fs: Some(next), ..Default::default() })
        }
        "touch" => {
            if args.is_empty() {
                return line("touch: missing file operand");
            }
            let mut next = fs.clone();
            let mut lines = Vec::new();
            for &t in &args {
                let path = resolve(t);
                if next.exists(&path) {
                    continue;
                }
                if next.is_dir(parent_dir(&path)) {
                    next.files.insert(path, String::new());
                } else {
                    lines.push(format!("touch: cannot touch '{}': No such file or directory", t));
                }
            }
            ShellOutcome::Handled(ShellEffect { output: lines, fs: Some(next), ..Default::default() })
        }
        "cat" => {
            if args.is_empty() {
                return line("cat: missing file operand");
            }
            let mut lines = Vec::new();
            for &t in &args {
                let path = resolve(t);
                match fs.read(&path) {
                    Some(content) => lines.extend(content.lines().map(str::to_string)),
                    None if fs.is_dir(&path) => lines.push(format!("cat: {}: Is a directory", t)),
                    None => lines.push(format!("cat: {}: No such file or directory", t)),
                }
            }
            output(lines)
        }
        "echo" => echo(shell, &args),
        "grep" => {
            let &[pattern, file] = args.as_slice() else {
                return line("grep: usage: grep <pattern> <file>");
            };
            let path = resolve(file);
            match fs.read(&path) {
                Some(content) => output(content.lines().filter(|l| l.contains(pattern)).map(str::to_string).collect()),
                None if fs.is_dir(&path) => line(format!("grep: {}: Is a directory", file)),
                None => line(format!("grep: {}: No such file or directory", file)),
            }
        }
        "tail" => tail(shell, &args),
        "clear" => ShellOutcome::Handled(ShellEffect { clear_screen: true, ..Default::default() }),
        "history" => output(
            shell.history.iter().enumerate().map(|(i, h)| format!("{:>5}  {}", i + 1, h)).collect(),
        ),
        "help" => output(shell_help_lines()),
        _ => ShellOutcome::NotHandled,
    }
}

fn echo(shell: &ShellSession, args: &[&str]) -> ShellOutcome {
    let redirect = args.iter().position(|a| *a == ">" || *a == ">>");
    let Some(pos) = redirect else {
        return line(args.join(" "));
    };
    let text = args[..pos].join(" ");
    let Some(target) = args.get(pos + 1) else {
        return line("bash: syntax error near unexpected token `newline'");
    };
    let path = normalize_path(&shell.cwd, target);
    if shell.fs.is_dir(&path) {
        return line(format!("bash: {}: Is a directory", target));
    }
    if !shell.fs.is_dir(parent_dir(&path)) {
        return line(format!("bash: {}: No such file or directory", target));
    }
    let mut next = shell.fs.clone();
    let entry = next.files.entry(path).or_default();
    if args[pos] == ">" {
        entry.clear();
    }
    entry.push_str(&text);
    entry.push('\n');
    ShellOutcome::Handled(ShellEffect { fs: Some(next), ..Default::default() })
}

fn tail(shell: &ShellSession, args: &[&str]) -> ShellOutcome {
    let mut count = TAIL_DEFAULT_LINES;
    let mut follow = false;
    let mut file: Option<&str> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "-f" => follow = true,
            "-n" => {
                let Some(n) = args.get(i + 1).and_then(|n| n.parse::<usize>().ok()) else {
                    return line("tail: usage: tail [-n N|-f] <file>");
                };
                count = n;
                i += 1;
            }
            a if a.starts_with('-') => return line(format!("tail: invalid option -- '{}'", a.trim_start_matches('-'))),
            a => file = Some(a),
        }
        i += 1;
    }
    let Some(file) = file else {
        return line("tail: usage: tail [-n N|-f] <file>");
    };
    let path = normalize_path(&shell.cwd, file);
    let Some(content) = shell.fs.read(&path) else {
        return line(format!("tail: cannot open '{}' for reading: No such file or directory", file));
    };
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(count);
    let mut lines: Vec<String> = all[start..].iter().map(|l| l.to_string()).collect();
    if follow {
        lines.push(format!("tail: following '{}' (simulated, no new output)", file));
    }
    output(lines)
}
