//! Battery gauge and registry readouts

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget},
};

use super::{format_duration, panel, reading_line};
use crate::telemetry::{ChargeState, Metric, Quality, SourceKind};
use crate::ui::renderer::RenderContext;

pub struct BatteryPanel<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> BatteryPanel<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

impl<'a> Widget for BatteryPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let snapshot = &self.ctx.telemetry.snapshot;

        let block = panel("BATTERY", theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(inner);

        let charge = snapshot.sample(Metric::BatteryPercent);
        let gauge = match charge.value() {
            Some(percent) => {
                let mut style = Style::default()
                    .fg(theme.charge_color(percent))
                    .bg(theme.colors.bg_panel);
                if charge.quality() == Quality::Stale {
                    style = style.patch(theme.styles.value_stale);
                }
                Gauge::default()
                    .gauge_style(style)
                    .ratio((percent / 100.0).clamp(0.0, 1.0))
                    .label(charge.format())
            }
            None => {
                let label = match snapshot.source(SourceKind::Battery) {
                    Some(status) if status.disabled => "no battery".to_string(),
                    _ => charge.format(),
                };
                Gauge::default()
                    .gauge_style(theme.styles.gauge)
                    .ratio(0.0)
                    .label(label)
            }
        };
        gauge.render(rows[0], buf);

        let status = match (snapshot.charge_state, snapshot.time_remaining) {
            (ChargeState::Unknown, _) => "—".to_string(),
            (state @ (ChargeState::Charging | ChargeState::Discharging), Some(left)) => {
                format!("{}, {} left", state.label(), format_duration(left))
            }
            (state, _) => state.label().to_string(),
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(format!("{:<9}", "State"), theme.styles.label),
            Span::styled(status, theme.styles.table_row),
        ])];
        lines.extend(
            [
                Metric::BatteryPercent,
                Metric::BatteryChargeRate,
                Metric::BatteryHealth,
                Metric::BatteryCycles,
                Metric::BatteryTemperature,
            ]
            .into_iter()
            .map(|metric| reading_line(metric.label(), &snapshot.sample(metric), theme)),
        );

        Paragraph::new(lines).render(rows[1], buf);
    }
}
