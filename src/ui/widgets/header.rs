//! Header widget

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use super::format_duration;
use crate::ui::renderer::RenderContext;

pub struct Header<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> Header<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

impl<'a> Widget for Header<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let state = self.ctx.state;
        buf.set_style(area, theme.styles.header);

        let separator = || Span::styled(" │ ", Style::default().fg(theme.colors.fg_muted));

        let mut spans = vec![
            Span::styled(
                " ⚡ AMPERAGE",
                Style::default()
                    .fg(theme.colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            separator(),
            Span::styled(state.view.label(), Style::default().fg(theme.colors.fg)),
            separator(),
            Span::styled(
                format!("every {:.2}s", state.interval.as_secs_f64()),
                Style::default().fg(theme.colors.fg),
            ),
            separator(),
            Span::styled(
                format!("window {}", format_duration(state.window)),
                Style::default().fg(theme.colors.fg),
            ),
        ];

        if state.paused {
            spans.push(separator());
            spans.push(Span::styled("PAUSED", theme.styles.status_warn));
        } else if state.sampling {
            spans.push(separator());
            spans.push(Span::styled("sampling…", theme.styles.label));
        }

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);

        // tick number and capture time on the right
        let snapshot = &self.ctx.telemetry.snapshot;
        let right = if snapshot.tick == 0 {
            "waiting for first sample ".to_string()
        } else {
            format!(
                "#{} {} ",
                snapshot.tick,
                snapshot.captured_at.with_timezone(&Local).format("%H:%M:%S")
            )
        };
        let width = right.chars().count() as u16;
        let x = area.x + area.width.saturating_sub(width);
        buf.set_span(x, area.y, &Span::styled(right, theme.styles.label), width);
    }
}
