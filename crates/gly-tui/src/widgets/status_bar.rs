//! Status bar: bottom line with the input mode and its keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_BG, C_MODE_INPUT, C_MODE_NORMAL, C_MODE_TIMER, C_MUTED, C_SECONDARY};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    /// Sleep-timer menu open; `usize` is the highlighted row.
    TimerMenu(usize),
    UrlInput,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::TimerMenu(_) => "TIMER",
            Self::UrlInput => "SOURCE",
        }
    }

    pub fn color(self) -> ratatui::style::Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::TimerMenu(_) => C_MODE_TIMER,
            Self::UrlInput => C_MODE_INPUT,
        }
    }

    fn hints(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Normal => &[
                ("⏎", "play"),
                ("space", "pause"),
                ("l", "live"),
                ("d", "download"),
                ("t", "timer"),
                ("r", "refresh"),
                ("u", "source"),
                ("q", "quit"),
            ],
            Self::TimerMenu(_) => &[("↑↓", "choose"), ("⏎", "set"), ("esc", "close")],
            Self::UrlInput => &[("⏎", "load"), ("esc", "cancel")],
        }
    }
}

pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default()
                .fg(C_BG)
                .bg(mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
    ];
    for (key, what) in mode.hints() {
        spans.push(Span::styled(*key, Style::default().fg(C_SECONDARY)));
        spans.push(Span::styled(format!(" {}  ", what), Style::default().fg(C_MUTED)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
