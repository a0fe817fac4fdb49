use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

pub const SEEK_STEP: f64 = 0.05;
pub const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePlay,
    Next,
    Previous,
    SeekBy(f64),
    SeekTo(f64),
    VolumeBy(f32),
    ToggleMute,
    ToggleAutoplay,
    ToggleMinimized,
    ToggleTheme,
    JumpTo(usize),
    Quit,
}

pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    let command = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char(' ') | KeyCode::Enter => Command::TogglePlay,
        KeyCode::Char('n') => Command::Next,
        KeyCode::Char('b') | KeyCode::Char('p') => Command::Previous,
        KeyCode::Right => Command::SeekBy(SEEK_STEP),
        KeyCode::Left => Command::SeekBy(-SEEK_STEP),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => Command::VolumeBy(VOLUME_STEP),
        KeyCode::Char('-') | KeyCode::Down => Command::VolumeBy(-VOLUME_STEP),
        KeyCode::Char('m') => Command::ToggleMute,
        KeyCode::Char('a') => Command::ToggleAutoplay,
        KeyCode::Char('z') => Command::ToggleMinimized,
        KeyCode::Char('t') => Command::ToggleTheme,
        KeyCode::Char(digit @ '1'..='9') => {
            Command::JumpTo(digit.to_digit(10).map_or(0, |d| d as usize - 1))
        }
        _ => return None,
    };
    Some(command)
}

/// Collapses bursts of the same transport command. Play, next, previous and
/// track jumps are throttled; everything else passes straight through.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last_play: Option<Instant>,
    last_next: Option<Instant>,
    last_previous: Option<Instant>,
    last_jump: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_play: None,
            last_next: None,
            last_previous: None,
            last_jump: None,
        }
    }

    pub fn allow(&mut self, command: Command, now: Instant) -> bool {
        let window = self.window;
        let slot = match command {
            Command::TogglePlay => &mut self.last_play,
            Command::Next => &mut self.last_next,
            Command::Previous => &mut self.last_previous,
            Command::JumpTo(_) => &mut self.last_jump,
            _ => return true,
        };
        if let Some(last) = *slot
            && now.saturating_duration_since(last) < window
        {
            return false;
        }
        *slot = Some(now);
        true
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn digits_jump_to_zero_based_index() {
        assert_eq!(command_for_key(key(KeyCode::Char('1'))), Some(Command::JumpTo(0)));
        assert_eq!(command_for_key(key(KeyCode::Char('9'))), Some(Command::JumpTo(8)));
        assert_eq!(command_for_key(key(KeyCode::Char('0'))), None);
    }

    #[test]
    fn ctrl_c_quits() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(command_for_key(event), Some(Command::Quit));
        assert_eq!(command_for_key(key(KeyCode::Char('c'))), None);
    }

    #[test]
    fn arrows_seek_and_adjust_volume() {
        assert_eq!(command_for_key(key(KeyCode::Right)), Some(Command::SeekBy(SEEK_STEP)));
        assert_eq!(command_for_key(key(KeyCode::Left)), Some(Command::SeekBy(-SEEK_STEP)));
        assert_eq!(command_for_key(key(KeyCode::Up)), Some(Command::VolumeBy(VOLUME_STEP)));
    }

    #[test]
    fn double_press_collapses_to_one() {
        let mut debounce = Debounce::default();
        let start = Instant::now();
        assert!(debounce.allow(Command::TogglePlay, start));
        assert!(!debounce.allow(Command::TogglePlay, start + Duration::from_millis(100)));
        assert!(debounce.allow(Command::TogglePlay, start + Duration::from_millis(300)));
    }

    #[test]
    fn commands_are_throttled_independently() {
        let mut debounce = Debounce::default();
        let start = Instant::now();
        assert!(debounce.allow(Command::Next, start));
        assert!(debounce.allow(Command::Previous, start));
        assert!(debounce.allow(Command::TogglePlay, start));
        assert!(debounce.allow(Command::VolumeBy(0.05), start));
        assert!(debounce.allow(Command::VolumeBy(0.05), start));
    }

    #[test]
    fn repeated_jumps_collapse_inside_the_window() {
        let mut debounce = Debounce::default();
        let start = Instant::now();
        assert!(debounce.allow(Command::JumpTo(1), start));
        assert!(!debounce.allow(Command::JumpTo(1), start + Duration::from_millis(40)));
        assert!(!debounce.allow(Command::JumpTo(2), start + Duration::from_millis(80)));
        assert!(debounce.allow(Command::Next, start + Duration::from_millis(80)));
        assert!(debounce.allow(Command::JumpTo(2), start + DEFAULT_DEBOUNCE));
    }
}
