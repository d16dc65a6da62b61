//! Color palettes and the styles derived from them

use ratatui::style::{Color, Modifier, Style};

use crate::telemetry::Quality;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
    pub styles: ThemeStyles,
}

#[derive(Debug, Clone)]
pub struct ThemeColors {
    pub bg: Color,
    pub bg_panel: Color,
    pub fg: Color,
    pub fg_muted: Color,
    pub accent: Color,
    pub accent_alt: Color,
    pub good: Color,
    pub warn: Color,
    pub bad: Color,
    pub border: Color,
}

#[derive(Debug, Clone)]
pub struct ThemeStyles {
    pub header: Style,
    pub footer: Style,
    pub panel_title: Style,
    pub panel_border: Style,
    pub label: Style,
    pub value_fresh: Style,
    pub value_stale: Style,
    pub value_missing: Style,
    pub graph: Style,
    pub gauge: Style,
    pub table_header: Style,
    pub table_row: Style,
    pub status_ok: Style,
    pub status_warn: Style,
    pub status_error: Style,
    pub keybind: Style,
    pub keybind_key: Style,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "catppuccin" | "catppuccin-mocha" => Self::catppuccin_mocha(),
            "nord" => Self::nord(),
            "gruvbox" => Self::gruvbox(),
            _ => Self::tokyo_night(),
        }
    }

    pub fn tokyo_night() -> Self {
        Self::from_colors(
            "Tokyo Night",
            ThemeColors {
                bg: Color::Rgb(26, 27, 38),
                bg_panel: Color::Rgb(36, 40, 59),
                fg: Color::Rgb(192, 202, 245),
                fg_muted: Color::Rgb(86, 95, 137),
                accent: Color::Rgb(122, 162, 247),
                accent_alt: Color::Rgb(187, 154, 247),
                good: Color::Rgb(158, 206, 106),
                warn: Color::Rgb(224, 175, 104),
                bad: Color::Rgb(247, 118, 142),
                border: Color::Rgb(59, 66, 97),
            },
        )
    }

    pub fn catppuccin_mocha() -> Self {
        Self::from_colors(
            "Catppuccin Mocha",
            ThemeColors {
                bg: Color::Rgb(30, 30, 46),
                bg_panel: Color::Rgb(49, 50, 68),
                fg: Color::Rgb(205, 214, 244),
                fg_muted: Color::Rgb(127, 132, 156),
                accent: Color::Rgb(137, 180, 250),
                accent_alt: Color::Rgb(203, 166, 247),
                good: Color::Rgb(166, 227, 161),
                warn: Color::Rgb(249, 226, 175),
                bad: Color::Rgb(243, 139, 168),
                border: Color::Rgb(69, 71, 90),
            },
        )
    }

    pub fn nord() -> Self {
        Self::from_colors(
            "Nord",
            ThemeColors {
                bg: Color::Rgb(46, 52, 64),
                bg_panel: Color::Rgb(59, 66, 82),
                fg: Color::Rgb(236, 239, 244),
                fg_muted: Color::Rgb(118, 128, 150),
                accent: Color::Rgb(136, 192, 208),
                accent_alt: Color::Rgb(180, 142, 173),
                good: Color::Rgb(163, 190, 140),
                warn: Color::Rgb(235, 203, 139),
                bad: Color::Rgb(191, 97, 106),
                border: Color::Rgb(67, 76, 94),
            },
        )
    }

    pub fn gruvbox() -> Self {
        Self::from_colors(
            "Gruvbox",
            ThemeColors {
                bg: Color::Rgb(40, 40, 40),
                bg_panel: Color::Rgb(60, 56, 54),
                fg: Color::Rgb(235, 219, 178),
                fg_muted: Color::Rgb(146, 131, 116),
                accent: Color::Rgb(131, 165, 152),
                accent_alt: Color::Rgb(211, 134, 155),
                good: Color::Rgb(184, 187, 38),
                warn: Color::Rgb(250, 189, 47),
                bad: Color::Rgb(251, 73, 52),
                border: Color::Rgb(80, 73, 69),
            },
        )
    }

    fn from_colors(name: &str, colors: ThemeColors) -> Self {
        let styles = ThemeStyles {
            header: Style::default().bg(colors.bg_panel).fg(colors.fg),
            footer: Style::default().bg(colors.bg_panel).fg(colors.fg_muted),
            panel_title: Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
            panel_border: Style::default().fg(colors.border),
            label: Style::default().fg(colors.fg_muted),
            value_fresh: Style::default().fg(colors.fg).add_modifier(Modifier::BOLD),
            value_stale: Style::default()
                .fg(colors.warn)
                .add_modifier(Modifier::DIM),
            value_missing: Style::default().fg(colors.fg_muted),
            graph: Style::default().fg(colors.accent),
            gauge: Style::default().fg(colors.good).bg(colors.bg_panel),
            table_header: Style::default()
                .fg(colors.accent_alt)
                .add_modifier(Modifier::BOLD),
            table_row: Style::default().fg(colors.fg),
            status_ok: Style::default().fg(colors.good),
            status_warn: Style::default().fg(colors.warn),
            status_error: Style::default().fg(colors.bad),
            keybind: Style::default().fg(colors.fg_muted),
            keybind_key: Style::default()
                .fg(colors.accent_alt)
                .add_modifier(Modifier::BOLD),
        };

        Self {
            name: name.to_string(),
            colors,
            styles,
        }
    }

    /// How a value of the given quality is drawn
    pub fn value_style(&self, quality: Quality) -> Style {
        match quality {
            Quality::Fresh => self.styles.value_fresh,
            Quality::Stale => self.styles.value_stale,
            Quality::Unavailable => self.styles.value_missing,
        }
    }

    /// Gauge color for a battery charge level
    pub fn charge_color(&self, percent: f64) -> Color {
        if percent < 15.0 {
            self.colors.bad
        } else if percent < 35.0 {
            self.colors.warn
        } else {
            self.colors.good
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::tokyo_night()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_default() {
        assert_eq!(Theme::from_name("no-such-theme").name, "Tokyo Night");
        assert_eq!(Theme::from_name("NORD").name, "Nord");
    }

    #[test]
    fn stale_values_are_dimmed() {
        let theme = Theme::default();
        assert!(theme
            .value_style(Quality::Stale)
            .add_modifier
            .contains(Modifier::DIM));
        assert_ne!(theme.value_style(Quality::Fresh), theme.value_style(Quality::Stale));
    }
}
