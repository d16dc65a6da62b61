//! Help overlay widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::core::events::keys_for;
use crate::core::state::Action;
use crate::ui::theme::Theme;

const SECTIONS: &[(&str, &[(Action, &str)])] = &[
    (
        "Sampling",
        &[
            (Action::Refresh, "Refresh now"),
            (Action::TogglePause, "Pause or resume sampling"),
            (Action::FasterInterval, "Sample more often"),
            (Action::SlowerInterval, "Sample less often"),
        ],
    ),
    (
        "Display",
        &[
            (Action::NextView, "Next view"),
            (Action::PrevView, "Previous view"),
            (Action::CycleWindow, "Cycle graph window"),
            (Action::ToggleSort, "Sort processes by CPU or memory"),
        ],
    ),
    (
        "General",
        &[
            (Action::ToggleHelp, "Toggle help"),
            (Action::CloseHelp, "Close help"),
            (Action::Quit, "Quit"),
        ],
    ),
];

pub struct HelpOverlay<'a> {
    theme: &'a Theme,
}

impl<'a> HelpOverlay<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }
}

impl<'a> Widget for HelpOverlay<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .title(Span::styled(" Amperage Help ", self.theme.styles.panel_title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.colors.accent))
            .style(Style::default().bg(self.theme.colors.bg_panel));

        let inner = block.inner(area);
        block.render(area, buf);

        let bottom = inner.y + inner.height;
        let mut y = inner.y;

        for (section, bindings) in SECTIONS {
            if y >= bottom {
                break;
            }

            let header = Line::from(Span::styled(
                format!("─── {} ", section),
                Style::default()
                    .fg(self.theme.colors.accent)
                    .add_modifier(Modifier::BOLD),
            ));
            buf.set_line(inner.x + 1, y, &header, inner.width.saturating_sub(2));
            y += 1;

            for (action, desc) in bindings.iter() {
                if y >= bottom {
                    break;
                }
                let line = Line::from(vec![
                    Span::styled(
                        format!("  {:>8}  ", keys_for(*action)),
                        self.theme.styles.keybind_key,
                    ),
                    Span::styled(*desc, self.theme.styles.keybind),
                ]);
                buf.set_line(inner.x + 1, y, &line, inner.width.saturating_sub(2));
                y += 1;
            }

            y += 1;
        }
    }
}
