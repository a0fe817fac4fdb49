use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub cover_art: Option<PathBuf>,
}

impl Track {
    pub fn new(title: &str, artist: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: None,
            path: path.into(),
            cover_art: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(default)]
    pub theme: ThemeMode,
    #[serde(default = "default_saved_volume")]
    pub saved_volume: f32,
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(default)]
    pub visit_count: u64,
    #[serde(default)]
    pub reduced_motion: Option<bool>,
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

fn default_saved_volume() -> f32 {
    0.3
}

fn default_autoplay() -> bool {
    true
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            theme: ThemeMode::default(),
            saved_volume: default_saved_volume(),
            autoplay: default_autoplay(),
            visit_count: 0,
            reduced_motion: None,
            catalog: None,
        }
    }
}
