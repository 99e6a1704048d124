use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub title: Style,
    pub ok: Style,
    pub caution: Style,
    pub label: Style,
    pub faint: Style,
}

impl Theme {
    /// Colored on an interactive terminal unless colors are disabled
    pub fn detect() -> Self {
        if console::Term::stdout().is_term() && console::colors_enabled() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            title: Style::new().green().bold(),
            ok: Style::new().green(),
            caution: Style::new().yellow().bold(),
            label: Style::new().cyan(),
            faint: Style::new().bright_black(),
        }
    }

    pub fn plain() -> Self {
        Self {
            title: Style::new(),
            ok: Style::new(),
            caution: Style::new(),
            label: Style::new(),
            faint: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
