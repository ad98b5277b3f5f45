//! Transient toasts for core notices, plus one persistent spinner line used
//! while the catalog is loading.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use gly_proto::protocol::Notice;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_SUCCESS, C_TOAST_WARNING};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn icon(self) -> &'static str {
        match self {
            Severity::Info => "·",
            Severity::Success => "✓",
            Severity::Warning => "!",
            Severity::Error => "✗",
        }
    }

    fn color(self) -> ratatui::style::Color {
        match self {
            Severity::Info => C_TOAST_INFO,
            Severity::Success => C_TOAST_SUCCESS,
            Severity::Warning => C_TOAST_WARNING,
            Severity::Error => C_TOAST_ERROR,
        }
    }

    fn lifetime(self) -> Duration {
        match self {
            Severity::Info | Severity::Success => Duration::from_secs(3),
            Severity::Warning => Duration::from_secs(4),
            Severity::Error => Duration::from_secs(6),
        }
    }
}

fn notice_severity(notice: &Notice) -> Severity {
    match notice {
        Notice::DownloadSaved { .. } => Severity::Success,
        Notice::StoppedByTimer | Notice::DownloadCancelled { .. } => Severity::Warning,
        n if n.is_error() => Severity::Error,
        _ => Severity::Info,
    }
}

struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    spinner: Option<(String, usize)>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            spinner: None,
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity) {
        let msg = message.into();
        self.toasts.retain(|t| t.message != msg);
        self.toasts.push_back(Toast {
            message: msg,
            severity,
            expires: Instant::now() + severity.lifetime(),
        });
        while self.toasts.len() > self.max_visible * 2 {
            self.toasts.pop_front();
        }
    }

    pub fn notice(&mut self, notice: &Notice) {
        self.push(notice.message(), notice_severity(notice));
    }

    /// Show (or keep) the spinner line.  Idempotent so it can follow state.
    pub fn spinner(&mut self, message: &str) {
        if self.spinner.as_ref().map(|(current, _)| current.as_str()) != Some(message) {
            self.spinner = Some((message.to_string(), 0));
        }
    }

    pub fn dismiss_spinner(&mut self) {
        self.spinner = None;
    }

    /// Drop expired toasts and advance the spinner.  Call every UI tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|t| t.expires > now);
        if let Some((_, frame)) = &mut self.spinner {
            *frame = (*frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty() && self.spinner.is_none()
    }

    /// Render in the top-right corner of `area`, spinner first.
    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if self.is_empty() {
            return;
        }
        let max_width = (area.width / 2).clamp(30, 60);
        let mut y = area.y + 1;
        let bottom = area.y + area.height;

        let spinner = self.spinner.as_ref().map(|(msg, i)| {
            (
                format!(" {} {} ", SPINNER_FRAMES[i % SPINNER_FRAMES.len()], msg),
                Severity::Info,
            )
        });
        let toasts = self
            .toasts
            .iter()
            .rev()
            .take(self.max_visible)
            .map(|t| (format!(" {} {} ", t.severity.icon(), t.message), t.severity));

        for (text, severity) in spinner.into_iter().chain(toasts) {
            if y >= bottom {
                break;
            }
            let w = (text.chars().count() as u16).min(max_width).min(area.width);
            let toast_area = Rect {
                x: area.x + area.width.saturating_sub(w + 1),
                y,
                width: w,
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    text,
                    Style::default()
                        .fg(severity.color())
                        .add_modifier(Modifier::BOLD),
                ))),
                toast_area,
            );
            y += 1;
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_severity() {
        assert_eq!(notice_severity(&Notice::StoppedByTimer), Severity::Warning);
        assert_eq!(
            notice_severity(&Notice::CatalogError {
                message: "HTTP 500".into()
            }),
            Severity::Error
        );
        assert_eq!(notice_severity(&Notice::TimerArmed { minutes: 15 }), Severity::Info);
    }

    #[test]
    fn test_duplicate_messages_collapse() {
        let mut toasts = ToastManager::new();
        toasts.notice(&Notice::TimerCancelled);
        toasts.notice(&Notice::TimerCancelled);
        assert_eq!(toasts.toasts.len(), 1);

        toasts.spinner("Loading episodes…");
        toasts.tick();
        toasts.spinner("Loading episodes…");
        assert_eq!(toasts.spinner.as_ref().map(|(_, f)| *f), Some(1));
        toasts.dismiss_spinner();
        assert!(!toasts.is_empty());
    }
}
