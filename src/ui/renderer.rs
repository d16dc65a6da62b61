//! Main UI renderer

use ratatui::{style::Style, widgets::Block, Frame};
use std::time::Instant;

use crate::core::state::AppState;
use crate::core::store::Telemetry;
use crate::ui::layout::LayoutManager;
use crate::ui::theme::Theme;
use crate::ui::widgets::*;

/// Everything a frame is drawn from. Telemetry is borrowed read-only.
pub struct RenderContext<'a> {
    pub state: &'a AppState,
    pub telemetry: &'a Telemetry,
    pub theme: &'a Theme,
    pub now: Instant,
}

pub struct Renderer;

impl Renderer {
    pub fn render(frame: &mut Frame, ctx: &RenderContext) {
        let area = frame.area();

        frame.render_widget(
            Block::default().style(Style::default().bg(ctx.theme.colors.bg)),
            area,
        );

        let layout = LayoutManager::compute(area, ctx.state);

        frame.render_widget(Header::new(ctx), layout.header);
        frame.render_widget(Footer::new(ctx), layout.footer);

        if let Some(area) = layout.battery_panel {
            frame.render_widget(BatteryPanel::new(ctx), area);
        }
        if let Some(area) = layout.power_panel {
            frame.render_widget(PowerPanel::new(ctx), area);
        }
        if let Some(area) = layout.graphs_panel {
            frame.render_widget(MetricsPanel::new(ctx), area);
        }
        if let Some(area) = layout.process_panel {
            frame.render_widget(ProcessPanel::new(ctx), area);
        }
        if let Some(area) = layout.sources_panel {
            frame.render_widget(SourcesPanel::new(ctx), area);
        }

        if ctx.state.show_help {
            frame.render_widget(HelpOverlay::new(ctx.theme), layout.overlay_area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::state::View;
    use crate::core::store::TelemetryStore;
    use crate::telemetry::{HistoryStore, Metric, Sample, Snapshot};
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(state: &AppState, store: &TelemetryStore) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        let theme = Theme::default();
        let telemetry = store.read();
        let ctx = RenderContext {
            state,
            telemetry: &telemetry,
            theme: &theme,
            now: Instant::now(),
        };
        terminal.draw(|frame| Renderer::render(frame, &ctx)).unwrap();

        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn store_with_battery() -> TelemetryStore {
        let store = TelemetryStore::new(HistoryStore::new(Metric::ALL, 16));
        let now = Instant::now();
        let sample = Sample::fresh(Metric::BatteryPercent, now, 42.0);
        let mut snapshot = Snapshot::empty(now);
        snapshot.tick = 1;
        snapshot.samples.insert(Metric::BatteryPercent, sample);
        store.commit([sample], snapshot);
        store
    }

    #[test]
    fn every_view_renders_without_data() {
        let store = TelemetryStore::new(HistoryStore::new(Metric::ALL, 16));
        let mut state = AppState::new(&Config::default());
        for view in View::ALL {
            state.view = view;
            let screen = draw(&state, &store);
            assert!(screen.contains("AMPERAGE"));
        }
    }

    #[test]
    fn overview_shows_values_and_gaps() {
        let store = store_with_battery();
        let state = AppState::new(&Config::default());
        let screen = draw(&state, &store);

        assert!(screen.contains("42.0%"));
        // power never sampled
        assert!(screen.contains("—"));
    }

    #[test]
    fn help_overlay_lists_bindings() {
        let store = store_with_battery();
        let mut state = AppState::new(&Config::default());
        state.show_help = true;
        let screen = draw(&state, &store);
        assert!(screen.contains("Refresh now"));
    }
}
