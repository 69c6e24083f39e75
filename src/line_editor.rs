use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

/// Single-line edit buffer with a cursor counted in chars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEditor {
    pub buffer: String,
    pub cursor: usize,
}

impl LineEditor {
    pub fn new(buffer: &str) -> Self {
        LineEditor { buffer: buffer.to_string(), cursor: buffer.chars().count() }
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.buffer.char_indices().nth(char_idx).map(|(b, _)| b).unwrap_or(self.buffer.len())
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 { return; }
        let at = self.byte_at(self.cursor - 1);
        self.buffer.remove(at);
        self.cursor -= 1;
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.len() { return; }
        let at = self.byte_at(self.cursor);
        self.buffer.remove(at);
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.len();
    }

    pub fn kill_to_start(&mut self) {
        let at = self.byte_at(self.cursor);
        self.buffer.drain(..at);
        self.cursor = 0;
    }

    pub fn kill_to_end(&mut self) {
        let at = self.byte_at(self.cursor);
        self.buffer.truncate(at);
    }

    /// Apply an editing key. Returns false for keys the editor does not own
    /// (Enter, Escape, history arrows, ...).
    pub fn apply_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => self.home(),
            KeyCode::Char('e') if ctrl => self.end(),
            KeyCode::Char('u') if ctrl => self.kill_to_start(),
            KeyCode::Char('k') if ctrl => self.kill_to_end(),
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => return false,
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.home(),
            KeyCode::End => self.end(),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_inserts_at_cursor() {
        let mut ed = LineEditor::new("splt");
        ed.apply_key(&key(KeyCode::Left));
        ed.apply_key(&key(KeyCode::Left));
        ed.apply_key(&key(KeyCode::Char('i')));
        assert_eq!(ed.buffer, "split");
        assert_eq!(ed.cursor, 3);
    }

    #[test]
    fn test_home_end_and_kills() {
        let mut ed = LineEditor::new("new-window");
        ed.apply_key(&ctrl('a'));
        assert_eq!(ed.cursor, 0);
        ed.apply_key(&key(KeyCode::Right));
        ed.apply_key(&key(KeyCode::Right));
        ed.apply_key(&key(KeyCode::Right));
        ed.apply_key(&ctrl('k'));
        assert_eq!(ed.buffer, "new");
        ed.apply_key(&ctrl('e'));
        ed.apply_key(&ctrl('u'));
        assert_eq!(ed.buffer, "");
        assert_eq!(ed.cursor, 0);
    }

    #[test]
    fn test_backspace_and_bounds() {
        let mut ed = LineEditor::new("ab");
        ed.apply_key(&key(KeyCode::Backspace));
        assert_eq!(ed.buffer, "a");
        ed.apply_key(&key(KeyCode::Backspace));
        ed.apply_key(&key(KeyCode::Backspace));
        assert_eq!(ed, LineEditor::default());
        ed.apply_key(&key(KeyCode::Left));
        assert_eq!(ed.cursor, 0);
        ed.apply_key(&key(KeyCode::Right));
        assert_eq!(ed.cursor, 0);
    }

    #[test]
    fn test_multibyte_cursor_is_char_based() {
        let mut ed = LineEditor::new("héllo");
        ed.apply_key(&ctrl('a'));
        ed.apply_key(&key(KeyCode::Right));
        ed.apply_key(&key(KeyCode::Delete));
        assert_eq!(ed.buffer, "hllo");
        ed.apply_key(&key(KeyCode::Char('é')));
        assert_eq!(ed.buffer, "héllo");
    }

    #[test]
    fn test_leaves_foreign_keys_alone() {
        let mut ed = LineEditor::new("x");
        assert!(!ed.apply_key(&key(KeyCode::Enter)));
        assert!(!ed.apply_key(&key(KeyCode::Up)));
        assert!(!ed.apply_key(&ctrl('c')));
        assert_eq!(ed.buffer, "x");
    }
}
