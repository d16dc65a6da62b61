//! Top processes by CPU or memory

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};

use super::panel;
use crate::telemetry::{Metric, Quality, Unit};
use crate::ui::renderer::RenderContext;

pub struct ProcessPanel<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> ProcessPanel<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

impl<'a> Widget for ProcessPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let snapshot = &self.ctx.telemetry.snapshot;

        let title = format!("PROCESSES · by {}", self.ctx.state.sort.label());
        let block = panel(&title, theme);
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 {
            return;
        }

        let header = Line::from(Span::styled(
            format!("{:>7}  {:<28} {:>8} {:>11}", "PID", "NAME", "CPU%", "MEM"),
            theme.styles.table_header,
        ));
        buf.set_line(inner.x + 1, inner.y, &header, inner.width.saturating_sub(2));

        // Rows from a failed refresh are carried over; dim them like other stale values
        let row_style = match snapshot.sample(Metric::ProcessCpu).quality() {
            Quality::Fresh => theme.styles.table_row,
            Quality::Stale => theme.styles.table_row.patch(theme.styles.value_stale),
            Quality::Unavailable => theme.styles.value_missing,
        };

        if snapshot.processes.is_empty() {
            let span = Span::styled(
                "No process data yet",
                Style::default().fg(theme.colors.fg_muted),
            );
            buf.set_span(inner.x + 1, inner.y + 1, &span, inner.width.saturating_sub(2));
            return;
        }

        for (i, process) in snapshot.processes.iter().enumerate() {
            let y = inner.y + 1 + i as u16;
            if y >= inner.y + inner.height {
                break;
            }
            let line = Line::from(Span::styled(
                format!(
                    "{:>7}  {:<28} {:>8.1} {:>11}",
                    process.pid,
                    truncate(&process.name, 28),
                    process.cpu_percent,
                    Unit::Bytes.format(process.memory_bytes as f64),
                ),
                row_style,
            ));
            buf.set_line(inner.x + 1, y, &line, inner.width.saturating_sub(2));
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("WindowServer", 28), "WindowServer");
        assert_eq!(truncate("Ünïcödé Helper (Renderer)", 8), "Ünïcödé…");
    }
}
