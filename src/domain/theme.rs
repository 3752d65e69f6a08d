//! Reading themes.

use serde::{Deserialize, Serialize};

/// Color treatment applied to rendered pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    /// Pages as the document draws them
    #[default]
    Light,

    /// Inverted, hue rotated back so images keep their colors
    Dark,

    /// Warm paper tint
    Sepia,
}

impl std::fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeMode::Light => write!(f, "light"),
            ThemeMode::Dark => write!(f, "dark"),
            ThemeMode::Sepia => write!(f, "sepia"),
        }
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" | "night" => Ok(ThemeMode::Dark),
            "sepia" => Ok(ThemeMode::Sepia),
            _ => anyhow::bail!("Unknown theme: {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_from_str() {
        assert_eq!("light".parse::<ThemeMode>().unwrap(), ThemeMode::Light);
        assert_eq!("Dark".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert_eq!("night".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert_eq!("sepia".parse::<ThemeMode>().unwrap(), ThemeMode::Sepia);
        assert!("neon".parse::<ThemeMode>().is_err());
    }

    #[test]
    fn test_theme_display_round_trips() {
        for theme in [ThemeMode::Light, ThemeMode::Dark, ThemeMode::Sepia] {
            assert_eq!(theme.to_string().parse::<ThemeMode>().unwrap(), theme);
        }
    }
}
