use crate::audio::{AudioBackend, NullBackend, RodioBackend};
use crate::config;
use crate::cover::CoverCache;
use crate::input::{Command, Debounce, command_for_key};
use crate::library;
use crate::model::{PersistedState, Track};
use crate::playlist::Playlist;
use crate::profile::{DeviceCapabilities, PerformanceProfile};
use crate::theme::ThemeProvider;
use crate::transport::{Player, PlayerSettings};
use crate::ui::{self, Regions, View};
use crate::visualizer::Visualizer;
use anyhow::{Context, Result, bail};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One scheduling tick of the transport.
const TICK_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_REDRAW: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub catalog: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub null_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub fn run(options: AppOptions) -> Result<()> {
    if let Err(err) = config::init_logging() {
        eprintln!("logging disabled: {err:#}");
    }

    let mut state = config::load_state()?;
    state.visit_count += 1;
    if let Some(catalog) = &options.catalog {
        state.catalog = Some(catalog.clone());
    }

    let playlist = Playlist::new(resolve_catalog(&options, &state)?).context("nothing to play")?;
    let profile = PerformanceProfile::resolve(&DeviceCapabilities::detect(state.reduced_motion));
    log::info!(
        "visit #{} with {} tracks, {:?} profile",
        state.visit_count,
        playlist.len(),
        profile.tier
    );

    let colorfgbg = std::env::var("COLORFGBG").ok();
    let mut theme = ThemeProvider::resolve(
        (state.visit_count > 1).then_some(state.theme),
        colorfgbg.as_deref(),
    );

    let backend = open_backend(options.null_audio);
    let output = backend.output_name();
    let mut player = Player::new(
        playlist,
        backend,
        PlayerSettings {
            volume: state.saved_volume,
            autoplay: state.autoplay,
            ..PlayerSettings::default()
        },
    );
    let mut visualizer = Visualizer::new(profile.visualizer_bars, profile.frame_interval())
        .with_gradient(profile.enable_complex_animations);

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = event_loop(
        &mut terminal,
        &mut player,
        &mut theme,
        &mut visualizer,
        &output,
        state.visit_count,
    );

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    player.unmount();
    state.theme = theme.mode();
    state.saved_volume = player.session().volume;
    state.autoplay = player.session().autoplay;
    let save_result = config::save_state(&state);
    result?;
    save_result?;
    Ok(())
}

fn resolve_catalog(options: &AppOptions, state: &PersistedState) -> Result<Vec<Track>> {
    if let Some(dir) = &options.dir {
        let tracks = library::scan_folder(dir);
        if tracks.is_empty() {
            bail!("no audio files under {}", dir.display());
        }
        return Ok(tracks);
    }

    let path = match options.catalog.clone().or_else(|| state.catalog.clone()) {
        Some(path) => path,
        None => config::default_catalog_path()?,
    };
    library::load_catalog(&path)
}

fn open_backend(null_audio: bool) -> Box<dyn AudioBackend> {
    if null_audio {
        return Box::new(NullBackend::new());
    }
    match RodioBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            log::warn!("no audio output, running silent: {err:#}");
            Box::new(NullBackend::new())
        }
    }
}

fn event_loop<B: AudioBackend>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    player: &mut Player<B>,
    theme: &mut ThemeProvider,
    visualizer: &mut Visualizer,
    output: &str,
    visit_count: u64,
) -> Result<()> {
    let mut debounce = Debounce::default();
    let mut covers = CoverCache::default();
    let mut rng = SmallRng::from_os_rng();
    let mut regions = Regions::default();
    let mut shuffled = false;
    let mut dirty = true;
    let mut next_tick = Instant::now();
    let mut last_draw = Instant::now();

    loop {
        let now = Instant::now();
        if now >= next_tick {
            player.tick();
            next_tick = now + TICK_INTERVAL;
        }

        visualizer.observe(player.is_playing());
        let frame_due = visualizer.take_due(now);
        if dirty || frame_due || last_draw.elapsed() > IDLE_REDRAW {
            let snapshot = player.frequency_snapshot();
            let playing = player.is_playing();
            let colors = theme.colors();
            let theme_label = theme.mode().label();
            let gradient = visualizer.gradient();
            terminal.draw(|frame| {
                regions = ui::layout(frame.area(), player.session().minimized);
                let stage = ui::inner(regions.visualizer);
                let surface = (!player.session().minimized).then_some((stage.width, stage.height));
                let plan = visualizer.frame(playing, snapshot.as_ref(), surface);

                let art = ui::inner(regions.cover);
                let cover = if player.session().minimized {
                    None
                } else {
                    covers.get(player.playlist().current(), art.width, art.height)
                };

                let view = View {
                    playlist: player.playlist(),
                    session: player.session(),
                    colors,
                    theme_label,
                    plan,
                    gradient,
                    cover,
                    output,
                    visit_count,
                };
                ui::draw(frame, &view);
            })?;
            dirty = false;
            last_draw = Instant::now();

            if !shuffled {
                shuffled = true;
                dirty = player.apply_deferred_shuffle(&mut rng);
            }
        }

        let now = Instant::now();
        let until_tick = next_tick.saturating_duration_since(now);
        let timeout = visualizer
            .scheduler()
            .time_until_due(now)
            .map_or(until_tick, |due| due.min(until_tick));
        if !event::poll(timeout)? {
            continue;
        }

        let command = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => command_for_key(key),
            Event::Mouse(mouse) => command_for_mouse(mouse, &regions),
            Event::Resize(_, _) => {
                dirty = true;
                None
            }
            _ => None,
        };
        let Some(command) = command else {
            continue;
        };
        if !debounce.allow(command, Instant::now()) {
            log::debug!("debounced {command:?}");
            continue;
        }
        if dispatch(player, theme, command) == Flow::Quit {
            return Ok(());
        }
        dirty = true;
    }
}

fn command_for_mouse(mouse: MouseEvent, regions: &Regions) -> Option<Command> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            ui::seek_fraction(regions.progress, mouse.column, mouse.row).map(Command::SeekTo)
        }
        _ => None,
    }
}

pub fn dispatch<B: AudioBackend>(
    player: &mut Player<B>,
    theme: &mut ThemeProvider,
    command: Command,
) -> Flow {
    match command {
        Command::TogglePlay => player.toggle_play(),
        Command::Next => player.next(),
        Command::Previous => player.previous(),
        Command::SeekBy(delta) => player.seek_by(delta),
        Command::SeekTo(fraction) => player.seek(fraction),
        Command::VolumeBy(delta) => player.nudge_volume(delta),
        Command::ToggleMute => player.toggle_mute(),
        Command::ToggleAutoplay => {
            let enabled = player.toggle_autoplay();
            log::info!("autoplay {}", if enabled { "on" } else { "off" });
        }
        Command::ToggleMinimized => {
            player.toggle_minimized();
        }
        Command::ToggleTheme => {
            theme.toggle();
        }
        Command::JumpTo(index) => {
            if let Err(err) = player.jump_to(index) {
                log::debug!("jump ignored: {err}");
            }
        }
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}
