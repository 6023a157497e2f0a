use owo_colors::Style;
use std::sync::OnceLock;
use crate::term::{Resource, Value};

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles for CLI messages and for the RDF terms printed by `match` and `search`
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
    pub muted: Style,
    pub iri: Style,
    pub blank: Style,
    pub literal: Style,
}

impl Theme {
    /// Colored on an interactive terminal unless `NO_COLOR` or `CLICOLOR=0` is set
    pub fn detect() -> Self {
        if console::Term::stdout().is_term() && console::colors_enabled() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            muted: Style::new().bright_black(),
            iri: Style::new().blue(),
            blank: Style::new().yellow(),
            literal: Style::new().green(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            success: none,
            error: none,
            warn: none,
            info: none,
            dim: none,
            muted: none,
            iri: none,
            blank: none,
            literal: none,
        }
    }

    pub fn value(&self, value: &Value) -> Style {
        match value {
            Value::Iri(_) => self.iri,
            Value::Blank(_) => self.blank,
            Value::Literal(_) => self.literal,
        }
    }

    pub fn resource(&self, resource: &Resource) -> Style {
        match resource {
            Resource::Iri(_) => self.iri,
            Resource::Blank(_) => self.blank,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
