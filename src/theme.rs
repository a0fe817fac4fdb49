use crate::model::ThemeMode;
use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub danger: Color,
    pub background: Color,
    pub card_bg: Color,
    pub border: Color,
    pub text: Color,
    pub muted: Color,
}

pub fn palette(mode: ThemeMode) -> Palette {
    match mode {
        ThemeMode::Dark => Palette {
            primary: Color::Rgb(77, 157, 224),
            secondary: Color::Rgb(1, 22, 39),
            accent: Color::Rgb(46, 196, 182),
            danger: Color::Rgb(255, 51, 102),
            background: Color::Rgb(1, 22, 39),
            card_bg: Color::Rgb(5, 30, 51),
            border: Color::Rgb(24, 62, 94),
            text: Color::Rgb(255, 255, 255),
            muted: Color::Rgb(160, 174, 192),
        },
        ThemeMode::Light => Palette {
            primary: Color::Rgb(26, 111, 176),
            secondary: Color::Rgb(255, 255, 255),
            accent: Color::Rgb(22, 166, 153),
            danger: Color::Rgb(224, 30, 90),
            background: Color::Rgb(240, 245, 250),
            card_bg: Color::Rgb(255, 255, 255),
            border: Color::Rgb(186, 208, 228),
            text: Color::Rgb(26, 32, 44),
            muted: Color::Rgb(74, 85, 104),
        },
    }
}

/// Process-wide colour mode. Read by every widget, flipped only by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeProvider {
    mode: ThemeMode,
}

impl ThemeProvider {
    /// A saved preference wins; otherwise the terminal's `COLORFGBG` hint is
    /// consulted, and dark is the fallback.
    pub fn resolve(saved: Option<ThemeMode>, colorfgbg: Option<&str>) -> Self {
        let mode = saved
            .or_else(|| colorfgbg.and_then(mode_from_colorfgbg))
            .unwrap_or_default();
        Self { mode }
    }

    pub fn mode(&self) -> ThemeMode {
        self.mode
    }

    pub fn colors(&self) -> Palette {
        palette(self.mode)
    }

    pub fn toggle(&mut self) -> ThemeMode {
        self.mode = self.mode.toggled();
        log::info!("theme switched to {}", self.mode.label());
        self.mode
    }
}

fn mode_from_colorfgbg(raw: &str) -> Option<ThemeMode> {
    let background: u8 = raw.rsplit(';').next()?.trim().parse().ok()?;
    Some(match background {
        7 | 15 => ThemeMode::Light,
        _ => ThemeMode::Dark,
    })
}
