//! SoC power readouts

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use super::{panel, reading_line};
use crate::telemetry::{Metric, PowerMode};
use crate::ui::renderer::RenderContext;

pub struct PowerPanel<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> PowerPanel<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

impl<'a> Widget for PowerPanel<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let snapshot = &self.ctx.telemetry.snapshot;

        let block = panel("POWER", theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let mode_style = match snapshot.power_mode {
            PowerMode::LowPower => theme.styles.status_warn,
            PowerMode::HighPerformance => theme.styles.status_error,
            PowerMode::Automatic => theme.styles.status_ok,
            PowerMode::Unknown => theme.styles.value_missing,
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(format!("{:<9}", "Mode"), theme.styles.label),
            Span::styled(snapshot.power_mode.label(), mode_style),
        ])];
        lines.extend(
            [
                Metric::PackagePower,
                Metric::CpuPower,
                Metric::GpuPower,
                Metric::AnePower,
            ]
            .into_iter()
            .map(|metric| reading_line(metric.label(), &snapshot.sample(metric), theme)),
        );

        Paragraph::new(lines).render(inner, buf);
    }
}
