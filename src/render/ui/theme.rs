//! Color themes.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, PartialEq)]
pub struct ColorTheme {
    /// Field text (None keeps the terminal default)
    pub normal_text: Option<Color>,
    /// Search match inside a field or ignored line
    pub search_match: Style,
    /// Rows matched by the highlight regex
    pub highlight_row: Style,
    /// Lines excluded from column layout
    pub ignored_row: Style,
    /// Column names above the rows
    pub header: Style,
    /// Line number or offset gutter
    pub line_number: Style,
    pub status_bg: Color,
    pub status_fg: Color,
    pub error_text: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            normal_text: None,
            search_match: Style::default().fg(Color::Black).bg(Color::Yellow),
            highlight_row: Style::default().fg(Color::LightCyan).add_modifier(Modifier::BOLD),
            ignored_row: Style::default().fg(Color::DarkGray),
            header: Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            line_number: Style::default().fg(Color::Yellow),
            status_bg: Color::Blue,
            status_fg: Color::White,
            error_text: Color::Red,
        }
    }
}

impl ColorTheme {
    /// For terminals without color support.
    pub fn monochrome() -> Self {
        Self {
            normal_text: None,
            search_match: Style::default().add_modifier(Modifier::REVERSED),
            highlight_row: Style::default().add_modifier(Modifier::BOLD),
            ignored_row: Style::default().add_modifier(Modifier::DIM),
            header: Style::default().add_modifier(Modifier::UNDERLINED),
            line_number: Style::default(),
            status_bg: Color::Black,
            status_fg: Color::White,
            error_text: Color::White,
        }
    }

    pub fn high_contrast() -> Self {
        Self {
            normal_text: Some(Color::White),
            search_match: Style::default().fg(Color::Black).bg(Color::LightYellow),
            highlight_row: Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
            ignored_row: Style::default().fg(Color::Gray),
            header: Style::default().fg(Color::White).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            line_number: Style::default().fg(Color::LightYellow),
            status_bg: Color::White,
            status_fg: Color::Black,
            error_text: Color::LightRed,
        }
    }

    /// Theme by config name; unknown names fall back to the default.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "monochrome" | "mono" => Self::monochrome(),
            "high-contrast" | "high_contrast" => Self::high_contrast(),
            "default" => Self::default(),
            other => {
                log::warn!("unknown theme '{other}', using default");
                Self::default()
            }
        }
    }

    pub fn text_style(&self) -> Style {
        self.normal_text
            .map_or_else(Style::default, |color| Style::default().fg(color))
    }

    pub fn status_style(&self) -> Style {
        Style::default().bg(self.status_bg).fg(self.status_fg)
    }

    pub fn error_style(&self) -> Style {
        self.status_style().fg(self.error_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_theme() {
        let theme = ColorTheme::default();
        assert_eq!(theme.normal_text, None);
        assert_eq!(theme.search_match.bg, Some(Color::Yellow));
        assert_eq!(theme.status_style().bg, Some(Color::Blue));
    }

    #[test]
    fn themes_by_name() {
        assert_eq!(ColorTheme::from_name("monochrome"), ColorTheme::monochrome());
        assert_eq!(
            ColorTheme::from_name("High-Contrast"),
            ColorTheme::high_contrast()
        );
        assert_eq!(ColorTheme::from_name("neon"), ColorTheme::default());
    }

    #[test]
    fn error_style_keeps_status_background() {
        let theme = ColorTheme::high_contrast();
        let style = theme.error_style();
        assert_eq!(style.bg, Some(Color::White));
        assert_eq!(style.fg, Some(Color::LightRed));
    }
}
