use crossterm::event::{KeyCode, KeyEvent};
use serde::{Deserialize, Serialize};

use crate::timer::{Action, TimerStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBind {
    pub display_name: String,
    pub code: String,
}

impl KeyBind {
    pub fn new(display_name: &str, code: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            code: code.to_string(),
        }
    }
}

/// Physical key bound to each timer action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindConfig {
    pub start: KeyBind,
    pub pause_resume: KeyBind,
    pub split: KeyBind,
    pub undo: KeyBind,
    pub reset: KeyBind,
    pub stop: KeyBind,
}

impl Default for KeyBindConfig {
    fn default() -> Self {
        Self {
            start: KeyBind::new("Start", "Enter"),
            pause_resume: KeyBind::new("Pause/Resume", "Space"),
            split: KeyBind::new("Split", "KeyS"),
            undo: KeyBind::new("Undo Split", "KeyU"),
            reset: KeyBind::new("Reset", "KeyR"),
            stop: KeyBind::new("Stop", "Escape"),
        }
    }
}

impl KeyBindConfig {
    /// Bindings in resolution order. The first binding matching a code wins.
    pub fn bindings(&self) -> [(&KeyBind, Action); 6] {
        [
            (&self.start, Action::Start),
            (&self.split, Action::Split),
            (&self.pause_resume, Action::PauseResume),
            (&self.reset, Action::Reset),
            (&self.undo, Action::Undo),
            (&self.stop, Action::Stop),
        ]
    }

    /// Resolve a key code to the action it triggers in the given status, if any
    pub fn resolve(&self, code: &str, status: TimerStatus) -> Option<Action> {
        let (_, action) = self.bindings().into_iter().find(|(b, _)| b.code == code)?;

        let allowed = match action {
            Action::Start => status == TimerStatus::Initial,
            Action::Split => status == TimerStatus::Running,
            Action::PauseResume => {
                matches!(status, TimerStatus::Running | TimerStatus::Paused)
            }
            _ => true,
        };

        allowed.then_some(action)
    }

    pub fn is_bound(&self, code: &str) -> bool {
        self.bindings().iter().any(|(b, _)| b.code == code)
    }
}

/// Translate a terminal key event into a browser-style physical key code
pub fn key_code(key: &KeyEvent) -> Option<String> {
    let code = match key.code {
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Up => "ArrowUp".to_string(),
        KeyCode::Down => "ArrowDown".to_string(),
        KeyCode::Left => "ArrowLeft".to_string(),
        KeyCode::Right => "ArrowRight".to_string(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
        KeyCode::Char(c) if c.is_ascii_digit() => format!("Digit{c}"),
        _ => return None,
    };
    Some(code)
}
