//! Footer widget with keybindings

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::Widget,
};

use crate::core::state::View;
use crate::ui::renderer::RenderContext;

pub struct Footer<'a> {
    ctx: &'a RenderContext<'a>,
}

impl<'a> Footer<'a> {
    pub fn new(ctx: &'a RenderContext<'a>) -> Self {
        Self { ctx }
    }
}

impl<'a> Widget for Footer<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let theme = self.ctx.theme;
        let state = self.ctx.state;
        buf.set_style(area, theme.styles.footer);

        let mut bindings = if state.show_help {
            vec![("Esc", "Close"), ("q", "Quit")]
        } else {
            vec![
                ("r", "Refresh"),
                ("p", if state.paused { "Resume" } else { "Pause" }),
                ("+/-", "Rate"),
                ("w", "Window"),
                ("Tab", "View"),
            ]
        };
        if !state.show_help {
            if state.view == View::Processes {
                bindings.push(("s", "Sort"));
            }
            bindings.push(("?", "Help"));
            bindings.push(("q", "Quit"));
        }

        let mut spans = Vec::new();
        for (i, (key, action)) in bindings.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", theme.styles.keybind));
            }
            spans.push(Span::styled(format!("[{}]", key), theme.styles.keybind_key));
            spans.push(Span::styled(format!(" {}", action), theme.styles.keybind));
        }

        let line = Line::from(spans);
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));
    }
}
