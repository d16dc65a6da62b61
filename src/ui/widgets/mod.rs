//! UI Widgets

pub mod battery_panel;
pub mod footer;
pub mod header;
pub mod help_overlay;
pub mod metrics_panel;
pub mod power_panel;
pub mod process_panel;
pub mod sources_panel;

pub use battery_panel::BatteryPanel;
pub use footer::Footer;
pub use header::Header;
pub use help_overlay::HelpOverlay;
pub use metrics_panel::MetricsPanel;
pub use power_panel::PowerPanel;
pub use process_panel::ProcessPanel;
pub use sources_panel::SourcesPanel;

use ratatui::{
    text::{Line, Span},
    widgets::{Block, Borders},
};
use std::time::Duration;

use crate::telemetry::Sample;
use crate::ui::theme::Theme;

fn panel<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(Span::styled(format!(" {} ", title), theme.styles.panel_title))
        .borders(Borders::ALL)
        .border_style(theme.styles.panel_border)
}

/// `label  value` with the value styled by its quality
fn reading_line<'a>(label: &'a str, sample: &Sample, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<9}", label), theme.styles.label),
        Span::styled(sample.format(), theme.value_style(sample.quality())),
    ])
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
