//! Palette and shared styles.  Dark background, station blue as accent.

use ratatui::style::{Color, Modifier, Style};

// ── palette ───────────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(14, 16, 22);
pub const C_ACCENT: Color = Color::Rgb(86, 156, 255);
pub const C_PRIMARY: Color = Color::Rgb(220, 224, 232);
pub const C_SECONDARY: Color = Color::Rgb(128, 136, 156);
pub const C_MUTED: Color = Color::Rgb(70, 76, 92);

pub const C_PLAYING: Color = Color::Rgb(96, 210, 140);
pub const C_CONNECTING: Color = Color::Rgb(240, 190, 90);
pub const C_ERROR: Color = Color::Rgb(240, 90, 90);
pub const C_DOWNLOAD: Color = Color::Rgb(110, 170, 230);

pub const C_SELECTION_BG: Color = Color::Rgb(30, 36, 52);
pub const C_PANEL_BORDER: Color = Color::Rgb(44, 50, 66);
pub const C_INPUT_BG: Color = Color::Rgb(22, 26, 38);
pub const C_INPUT_FG: Color = Color::Rgb(240, 210, 110);

pub const C_BADGE_LIVE: Color = Color::Rgb(205, 45, 60);

// Toasts
pub const C_TOAST_INFO: Color = C_ACCENT;
pub const C_TOAST_SUCCESS: Color = C_PLAYING;
pub const C_TOAST_WARNING: Color = C_CONNECTING;
pub const C_TOAST_ERROR: Color = C_ERROR;

// Status bar mode chips
pub const C_MODE_NORMAL: Color = C_SECONDARY;
pub const C_MODE_TIMER: Color = Color::Rgb(176, 130, 230);
pub const C_MODE_INPUT: Color = C_INPUT_FG;

// ── styles ────────────────────────────────────────────────────────────────────

pub fn style_default() -> Style {
    Style::new().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::new().fg(C_SECONDARY)
}

pub fn style_muted() -> Style {
    Style::new().fg(C_MUTED)
}

/// Row or label of whatever is currently playing.
pub fn style_playing() -> Style {
    Style::new().fg(C_PLAYING).add_modifier(Modifier::BOLD)
}

pub fn style_selected() -> Style {
    Style::new().fg(C_PRIMARY).bg(C_SELECTION_BG).add_modifier(Modifier::BOLD)
}

pub fn style_border() -> Style {
    Style::new().fg(C_PANEL_BORDER)
}

pub fn style_live_badge() -> Style {
    Style::new().fg(Color::White).bg(C_BADGE_LIVE).add_modifier(Modifier::BOLD)
}
