//! Screen layout for each view

use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::core::state::{AppState, View};

/// Computed layout rects for all panels
#[derive(Debug, Clone, Default)]
pub struct ComputedLayout {
    pub header: Rect,
    pub footer: Rect,
    pub battery_panel: Option<Rect>,
    pub power_panel: Option<Rect>,
    pub graphs_panel: Option<Rect>,
    pub process_panel: Option<Rect>,
    pub sources_panel: Option<Rect>,
    pub overlay_area: Rect,
}

pub struct LayoutManager;

impl LayoutManager {
    pub fn compute(area: Rect, state: &AppState) -> ComputedLayout {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Min(6),    // Body
                Constraint::Length(1), // Footer
            ])
            .split(area);

        let mut layout = ComputedLayout {
            header: main_chunks[0],
            footer: main_chunks[2],
            overlay_area: Self::centered_rect(60, 70, area),
            ..Default::default()
        };

        let body = main_chunks[1];
        match state.view {
            View::Overview => Self::overview(body, &mut layout),
            View::Processes => layout.process_panel = Some(body),
            View::Sources => layout.sources_panel = Some(body),
        }
        layout
    }

    /// Battery and power readouts side by side above the history graphs
    fn overview(body: Rect, layout: &mut ComputedLayout) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(4)])
            .split(body);

        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        layout.battery_panel = Some(top[0]);
        layout.power_panel = Some(top[1]);
        layout.graphs_panel = Some(rows[1]);
    }

    /// Create a centered rect with given percentage width/height
    pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(area);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn overview_has_readouts_and_graphs() {
        let state = AppState::new(&Config::default());
        let layout = LayoutManager::compute(Rect::new(0, 0, 120, 40), &state);

        assert_eq!(layout.header.height, 1);
        assert_eq!(layout.footer.y, 39);
        assert!(layout.battery_panel.is_some());
        assert!(layout.graphs_panel.is_some());
        assert!(layout.process_panel.is_none());
    }

    #[test]
    fn other_views_use_the_whole_body() {
        let mut state = AppState::new(&Config::default());
        state.view = View::Processes;
        let layout = LayoutManager::compute(Rect::new(0, 0, 80, 24), &state);

        let body = layout.process_panel.unwrap();
        assert_eq!(body.height, 22);
        assert!(layout.battery_panel.is_none());
    }
}
