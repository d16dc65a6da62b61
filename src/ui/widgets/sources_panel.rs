//! Source health diagnostics

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::Widget,
};

use super::panel;
use crate::telemetry::{Metric, SourceStatus};
use crate::ui::renderer::RenderContext;
use crate::ui::theme::Theme;

pub struct SourcesPanel<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> SourcesPanel<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

fn status_cell(status: &SourceStatus, theme: &Theme) -> (&'static str, Style) {
    if status.disabled {
        ("disabled", theme.styles.value_missing)
    } else if status.consecutive_failures > 0 {
        ("failing", theme.styles.status_warn)
    } else {
        ("ok", theme.styles.status_ok)
    }
}

impl<'a> Widget for SourcesPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let telemetry = self.ctx.telemetry;

        let block = panel("SOURCES", theme);
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 {
            return;
        }

        let width = inner.width.saturating_sub(2);
        let header = Line::from(Span::styled(
            format!(
                "{:<12} {:<10} {:>8} {:>8}  {:<14}",
                "SOURCE", "STATUS", "STREAK", "TOTAL", "LAST ERROR"
            ),
            theme.styles.table_header,
        ));
        buf.set_line(inner.x + 1, inner.y, &header, width);

        let mut y = inner.y + 1;
        let bottom = inner.y + inner.height;

        if telemetry.snapshot.sources.is_empty() {
            let span = Span::styled("No sources polled yet", Style::default().fg(theme.colors.fg_muted));
            buf.set_span(inner.x + 1, y, &span, width);
            return;
        }

        for status in &telemetry.snapshot.sources {
            if y >= bottom {
                return;
            }
            let (label, style) = status_cell(status, theme);
            let last_error = status.last_error.map_or("—", |e| e.label());
            let line = Line::from(vec![
                Span::styled(format!("{:<12} ", status.kind.label()), theme.styles.table_row),
                Span::styled(format!("{:<10} ", label), style),
                Span::styled(
                    format!(
                        "{:>8} {:>8}  {:<14}",
                        status.consecutive_failures, status.total_failures, last_error
                    ),
                    theme.styles.table_row,
                ),
            ]);
            buf.set_line(inner.x + 1, y, &line, width);
            y += 1;
        }

        // history depth per metric
        y += 1;
        if y >= bottom {
            return;
        }
        let capacity = telemetry.history.capacity();
        buf.set_line(
            inner.x + 1,
            y,
            &Line::from(Span::styled(
                format!("HISTORY (capacity {})", capacity),
                theme.styles.table_header,
            )),
            width,
        );
        y += 1;

        let metrics: Vec<Metric> = telemetry.history.metrics().collect();
        for metric in metrics {
            if y >= bottom {
                break;
            }
            let len = telemetry.history.len(metric);
            let line = Line::from(vec![
                Span::styled(format!("{:<12} ", metric.label()), theme.styles.label),
                Span::styled(format!("{:>6}", len), theme.styles.table_row),
                if len == capacity {
                    Span::styled(" full", theme.styles.label).italic()
                } else {
                    Span::raw("")
                },
            ]);
            buf.set_line(inner.x + 1, y, &line, width);
            y += 1;
        }
    }
}
