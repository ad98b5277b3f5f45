//! UrlInput: one-line editor for the catalog source, backed by tui-input.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_INPUT_BG, C_INPUT_FG, C_MUTED};

const PROMPT: &str = "catalog url: ";

#[derive(Debug, PartialEq)]
pub enum InputAction {
    /// Enter with a non-empty value.
    Submitted(String),
    Cancelled,
    Editing,
}

#[derive(Default)]
pub struct UrlInput {
    input: Input,
}

impl UrlInput {
    /// Start editing from `current`.
    pub fn open(&mut self, current: &str) {
        self.input = Input::new(current.to_string());
    }

    /// Esc cancels, Enter submits the trimmed value (an empty one cancels).
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Esc => InputAction::Cancelled,
            KeyCode::Enter => {
                let value = self.input.value().trim();
                if value.is_empty() {
                    InputAction::Cancelled
                } else {
                    InputAction::Submitted(value.to_string())
                }
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                InputAction::Editing
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let prompt_w = PROMPT.chars().count() as u16;
        let scroll = self
            .input
            .visual_scroll(area.width.saturating_sub(prompt_w + 1) as usize);
        let value = self.input.value();
        let visible: String = value.chars().skip(scroll).collect();

        let line = Line::from(vec![
            Span::styled(PROMPT, Style::default().fg(C_MUTED)),
            Span::styled(visible, Style::default().fg(C_INPUT_FG)),
        ]);
        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(C_INPUT_BG)),
            area,
        );

        let cursor_x = area.x + prompt_w + (self.input.visual_cursor() - scroll) as u16;
        frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(1)), area.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_edit_and_submit() {
        let mut input = UrlInput::default();
        input.open("https://a.example/p.json");
        for _ in 0..6 {
            input.handle_key(key(KeyCode::Backspace));
        }
        for c in "x.json".chars() {
            assert_eq!(input.handle_key(key(KeyCode::Char(c))), InputAction::Editing);
        }
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            InputAction::Submitted("https://a.example/x.json".into())
        );
    }

    #[test]
    fn test_blank_or_escape_cancels() {
        let mut input = UrlInput::default();
        input.open("   ");
        assert_eq!(input.handle_key(key(KeyCode::Enter)), InputAction::Cancelled);
        input.open("https://a.example");
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputAction::Cancelled);
    }
}
