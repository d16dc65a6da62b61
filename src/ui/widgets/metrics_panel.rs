//! Rolling history graphs, one sparkline row per tracked metric

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

use super::{format_duration, panel};
use crate::telemetry::{downsample, Metric};
use crate::ui::renderer::RenderContext;

const BAR_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const LABEL_WIDTH: u16 = 9;
const VALUE_WIDTH: u16 = 11;

/// Scale values between the row minimum and maximum, so negative rates still
/// show their shape. A flat or empty row renders as the floor.
fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;
    values
        .iter()
        .map(|&v| {
            if span <= 0.0 {
                return BAR_CHARS[0];
            }
            let idx = (((v - min) / span) * (BAR_CHARS.len() - 1) as f64).round() as usize;
            BAR_CHARS[idx.min(BAR_CHARS.len() - 1)]
        })
        .collect()
}

pub struct MetricsPanel<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> MetricsPanel<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

impl<'a> Widget for MetricsPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let state = self.ctx.state;
        let telemetry = self.ctx.telemetry;

        let title = format!("HISTORY · last {}", format_duration(state.window));
        let block = panel(&title, theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let graph_width = inner.width.saturating_sub(LABEL_WIDTH + VALUE_WIDTH) as usize;
        let metrics: Vec<Metric> = telemetry.history.metrics().collect();

        for (row, metric) in metrics.into_iter().enumerate() {
            let y = inner.y + row as u16;
            if y >= inner.y + inner.height {
                break;
            }

            let latest = telemetry.snapshot.sample(metric);
            let window = telemetry.history.range_at(metric, state.window, self.ctx.now);
            let points = downsample(window, graph_width);

            let line = Line::from(vec![
                Span::styled(
                    format!("{:<width$}", metric.label(), width = LABEL_WIDTH as usize),
                    theme.styles.label,
                ),
                Span::styled(
                    format!("{:>width$} ", latest.format(), width = VALUE_WIDTH as usize - 1),
                    theme.value_style(latest.quality()),
                ),
                Span::styled(sparkline(&points), theme.styles.graph),
            ]);
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkline_scales_to_row_range() {
        assert_eq!(sparkline(&[0.0, 5.0, 10.0]), "▁▅█");
        assert_eq!(sparkline(&[20.0, 25.0, 30.0]), "▁▅█");
    }

    #[test]
    fn negative_rates_are_not_flattened() {
        assert_eq!(sparkline(&[-12.0, -6.0, 0.0]), "▁▅█");
        assert_eq!(sparkline(&[-30.0, -10.0, -20.0]), "▁█▅");
    }

    #[test]
    fn flat_zero_row_stays_on_floor() {
        assert_eq!(sparkline(&[0.0, 0.0]), "▁▁");
        assert_eq!(sparkline(&[-4.0, -4.0]), "▁▁");
        assert_eq!(sparkline(&[]), "");
    }
}
