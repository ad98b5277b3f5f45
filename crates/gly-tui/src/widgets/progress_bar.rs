//! Smooth Unicode progress bar widget.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Bar of `width` cells filled to `progress` (0.0..=1.0) in eighths.
pub fn bar_text(progress: f64, width: usize) -> String {
    let eighths = (progress.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full_blocks = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width + 4);
    for _ in 0..full_blocks.min(width) {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }
    bar
}

/// Render a progress bar in `area` with optional already-formatted labels
/// on either side (elapsed / total).
pub fn draw_progress(
    frame: &mut Frame,
    area: Rect,
    progress: f64,
    left_label: Option<&str>,
    right_label: Option<&str>,
    color: Color,
) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let left = left_label.unwrap_or_default();
    let right = right_label.unwrap_or_default();
    let label_w = (left.chars().count() + right.chars().count() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let mut spans = Vec::new();
    if !left.is_empty() {
        spans.push(Span::styled(
            format!("{} ", left),
            Style::default().fg(C_SECONDARY),
        ));
    }
    spans.push(Span::styled(bar_text(progress, bar_w), Style::default().fg(color)));
    if !right.is_empty() {
        spans.push(Span::styled(format!(" {}", right), Style::default().fg(C_MUTED)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
