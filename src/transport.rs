use crate::audio::{AudioBackend, FrequencySnapshot, GraphManager, PlaybackError};
use crate::audio::analyser::DEFAULT_FFT_SIZE;
use crate::playlist::{Direction, Playlist, PlaylistError};
use rand::rngs::SmallRng;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_VOLUME: f32 = 0.3;

/// Ticks a pending transition waits for the new element before giving up.
const READY_TIMEOUT_TICKS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStatus {
    Loading,
    PlaybackFailed,
    LoadFailed(String),
    NewTrackFailed,
    ClickToContinue,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading audio..."),
            Self::PlaybackFailed => write!(f, "Playback failed - try clicking again"),
            Self::LoadFailed(title) => write!(f, "Failed to load: {title}"),
            Self::NewTrackFailed => write!(f, "Failed to play new track"),
            Self::ClickToContinue => write!(f, "Click play to continue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub playing: bool,
    /// Seconds into the current track.
    pub position: f64,
    /// Seconds; 0 until metadata arrives.
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub remembered_volume: f32,
    pub status: Option<PlayerStatus>,
    pub autoplay: bool,
    pub loaded: bool,
    pub minimized: bool,
}

impl PlaybackSession {
    fn new(volume: f32, autoplay: bool) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            playing: false,
            position: 0.0,
            duration: 0.0,
            volume,
            muted: volume == 0.0,
            remembered_volume: if volume > 0.0 { volume } else { DEFAULT_VOLUME },
            status: None,
            autoplay,
            loaded: false,
            minimized: false,
        }
    }

    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub resume_playback: bool,
    pub due_tick: u64,
    waited: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub volume: f32,
    pub autoplay: bool,
    pub fft_size: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            autoplay: true,
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

/// The transport: playlist cursor, playback session and the audio graph,
/// advanced one scheduling tick at a time.
pub struct Player<B: AudioBackend> {
    playlist: Playlist,
    graph: GraphManager<B>,
    session: PlaybackSession,
    pending: Option<PendingTransition>,
    unmounted: bool,
}

impl<B: AudioBackend> Player<B> {
    pub fn new(playlist: Playlist, backend: B, settings: PlayerSettings) -> Self {
        let mut player = Self {
            playlist,
            graph: GraphManager::with_fft_size(backend, settings.fft_size),
            session: PlaybackSession::new(settings.volume, settings.autoplay),
            pending: None,
            unmounted: false,
        };
        let volume = player.session.effective_volume();
        player.graph.backend_mut().set_volume(volume);
        player.load_current();
        player
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn graph(&self) -> &GraphManager<B> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut GraphManager<B> {
        &mut self.graph
    }

    pub fn backend(&self) -> &B {
        self.graph.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.graph.backend_mut()
    }

    pub fn pending_transition(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn is_playing(&self) -> bool {
        self.session.playing
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    pub fn frequency_snapshot(&mut self) -> Option<FrequencySnapshot> {
        self.graph.frequency_snapshot()
    }

    /// Post-mount shuffle. The first draw shows the declared order; this
    /// permutes it once and reloads whatever track now sits first.
    pub fn apply_deferred_shuffle(&mut self, rng: &mut SmallRng) -> bool {
        if self.unmounted || !self.playlist.apply_deferred_shuffle(rng) {
            return false;
        }
        let resume = self.session.playing;
        self.begin_transition(resume);
        true
    }

    pub fn toggle_play(&mut self) {
        if self.unmounted {
            return;
        }

        if self.pending.is_some() {
            log::debug!("play toggle ignored while the track changes");
            return;
        }

        if self.session.playing {
            self.graph.backend_mut().pause();
            self.session.playing = false;
            log::debug!("paused {:?}", self.playlist.current().title);
            return;
        }

        self.session.minimized = false;
        if self.graph.backend().element().is_none() {
            self.load_current();
            if self.graph.backend().element().is_none() {
                return;
            }
        }
        if !self.graph.backend().ready_state().can_play() {
            self.session.status = Some(PlayerStatus::Loading);
            return;
        }

        self.session.status = None;
        self.graph.resume_context();
        if let Err(err) = self.graph.setup() {
            log::debug!("visualizer unavailable: {err}");
        }
        match self.graph.backend_mut().play() {
            Ok(()) => {
                self.session.playing = true;
                log::info!("playing {:?}", self.playlist.current().title);
            }
            Err(err) => {
                log::warn!("play request failed: {err}");
                self.session.status = Some(PlayerStatus::PlaybackFailed);
                self.session.playing = false;
            }
        }
    }

    pub fn next(&mut self) {
        let next = self.playlist.advance(Direction::Forward);
        self.change_track(next, self.session.playing);
    }

    pub fn previous(&mut self) {
        let previous = self.playlist.advance(Direction::Backward);
        self.change_track(previous, self.session.playing);
    }

    pub fn jump_to(&mut self, index: usize) -> Result<(), PlaylistError> {
        let target = self.playlist.jump_to(index)?;
        if index == self.playlist.current_index() && self.graph.backend().element().is_some() {
            return Ok(());
        }
        self.change_track(target, self.session.playing);
        Ok(())
    }

    /// The single track-change path used by manual skips and by auto-advance:
    /// teardown now, load the new element, and leave setup plus optional
    /// playback to a transition that runs once the element is ready.
    pub fn change_track(&mut self, next: Playlist, resume_playback: bool) {
        if self.unmounted {
            return;
        }
        self.playlist = next;
        self.begin_transition(resume_playback);
    }

    fn begin_transition(&mut self, resume_playback: bool) {
        self.graph.teardown();
        self.graph.backend_mut().pause();
        self.pending = None;
        self.session.playing = false;

        if self.load_current() {
            self.session.playing = resume_playback;
            self.pending = Some(PendingTransition {
                resume_playback,
                due_tick: self.graph.current_tick() + 1,
                waited: 0,
            });
        }
    }

    fn load_current(&mut self) -> bool {
        self.session.position = 0.0;
        self.session.duration = 0.0;
        self.session.loaded = false;
        self.session.status = None;

        let track = self.playlist.current();
        match self.graph.backend_mut().load(&track.path) {
            Ok(_) => true,
            Err(err) => {
                log::warn!("failed to load {}: {err:#}", track.path.display());
                self.session.status = Some(PlayerStatus::LoadFailed(track.title.clone()));
                self.session.playing = false;
                false
            }
        }
    }

    pub fn seek(&mut self, fraction: f64) {
        if self.unmounted || self.session.duration <= 0.0 || !fraction.is_finite() {
            return;
        }
        let target = fraction.clamp(0.0, 1.0) * self.session.duration;
        match self
            .graph
            .backend_mut()
            .seek_to(Duration::from_secs_f64(target))
        {
            Ok(()) => self.session.position = target,
            Err(err) => log::debug!("seek ignored: {err:#}"),
        }
    }

    pub fn seek_by(&mut self, delta_fraction: f64) {
        let current = self.session.progress();
        self.seek(current + delta_fraction);
    }

    pub fn set_volume(&mut self, level: f32) {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        self.session.volume = level;
        self.session.muted = level == 0.0;
        if level > 0.0 {
            self.session.remembered_volume = level;
        }
        self.graph.backend_mut().set_volume(level);
    }

    /// Steps the volume on a 1% grid. Stepping down keeps the level the
    /// descent started from, so unmuting after reaching zero restores it.
    pub fn nudge_volume(&mut self, delta: f32) {
        let base = if self.session.muted { 0.0 } else { self.session.volume };
        let remembered = self.session.remembered_volume;
        self.set_volume(snap_volume(base + delta));
        if delta < 0.0 {
            self.session.remembered_volume = remembered;
        }
    }

    pub fn toggle_mute(&mut self) {
        if self.session.muted {
            if self.session.volume == 0.0 {
                self.session.volume = self.session.remembered_volume;
            }
            self.session.muted = false;
        } else {
            if self.session.volume > 0.0 {
                self.session.remembered_volume = self.session.volume;
            }
            self.session.muted = true;
        }
        let effective = self.session.effective_volume();
        self.graph.backend_mut().set_volume(effective);
    }

    pub fn toggle_autoplay(&mut self) -> bool {
        self.session.autoplay = !self.session.autoplay;
        self.session.autoplay
    }

    pub fn toggle_minimized(&mut self) -> bool {
        self.session.minimized = !self.session.minimized;
        self.session.minimized
    }

    /// One scheduling tick: poll the backend, run a due graph retry, advance
    /// a pending transition and react to the element ending.
    pub fn tick(&mut self) {
        if self.unmounted {
            return;
        }
        self.graph.tick();
        self.sync_from_backend();
        self.run_pending_transition();
        self.handle_ended();
    }

    fn sync_from_backend(&mut self) {
        let backend = self.graph.backend();
        if backend.element().is_none() {
            return;
        }
        let ready = backend.ready_state();
        self.session.position = backend.position().as_secs_f64();
        if ready.has_metadata()
            && let Some(duration) = backend.duration()
        {
            self.session.duration = duration.as_secs_f64();
        }
        self.session.loaded = ready.can_play();
        if self.session.loaded && self.session.status == Some(PlayerStatus::Loading) {
            self.session.status = None;
        }
    }

    fn run_pending_transition(&mut self) {
        let Some(mut pending) = self.pending else {
            return;
        };
        if self.graph.current_tick() < pending.due_tick {
            return;
        }
        if !self.graph.backend().ready_state().can_play() {
            pending.waited += 1;
            if pending.waited > READY_TIMEOUT_TICKS {
                log::warn!("{:?} never became ready", self.playlist.current().title);
                self.pending = None;
                if pending.resume_playback {
                    self.session.status = Some(PlayerStatus::NewTrackFailed);
                }
                self.session.playing = false;
            } else {
                self.pending = Some(pending);
            }
            return;
        }

        self.pending = None;
        if let Err(err) = self.graph.setup() {
            log::debug!("visualizer unavailable: {err}");
        }
        if !pending.resume_playback {
            return;
        }

        self.graph.resume_context();
        match self.graph.backend_mut().play() {
            Ok(()) => {
                self.session.playing = true;
                log::info!("playing {:?}", self.playlist.current().title);
            }
            Err(PlaybackError::NotReady) => {
                self.session.playing = false;
                self.session.status = Some(PlayerStatus::NewTrackFailed);
            }
            Err(err) => {
                log::warn!("new track did not start: {err}");
                self.session.playing = false;
                self.session.status = Some(PlayerStatus::ClickToContinue);
            }
        }
    }

    fn handle_ended(&mut self) {
        if self.pending.is_some() || !self.graph.backend().is_ended() {
            return;
        }
        log::info!("{:?} ended", self.playlist.current().title);
        if self.session.autoplay {
            let next = self.playlist.advance(Direction::Forward);
            self.change_track(next, true);
        } else {
            let same = self.playlist.clone();
            self.change_track(same, false);
        }
    }

    /// Cancels deferred work and closes the output. Every later call is a
    /// no-op.
    pub fn unmount(&mut self) {
        if self.unmounted {
            return;
        }
        self.pending = None;
        self.session.playing = false;
        self.graph.close();
        self.unmounted = true;
        log::info!("player unmounted");
    }
}

fn snap_volume(level: f32) -> f32 {
    (level * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{GraphState, NullBackend, ReadyState};
    use crate::model::Track;
    use rand::SeedableRng;

    fn playlist(titles: &[&str]) -> Playlist {
        Playlist::new(
            titles
                .iter()
                .map(|title| Track::new(title, "artist", format!("{title}.mp3")))
                .collect(),
        )
        .expect("playlist")
    }

    fn player(backend: NullBackend) -> Player<NullBackend> {
        Player::new(playlist(&["A", "B", "C"]), backend, PlayerSettings::default())
    }

    fn settle(player: &mut Player<NullBackend>, ticks: usize) {
        for _ in 0..ticks {
            player.tick();
        }
    }

    #[test]
    fn new_player_loads_first_track_without_playing() {
        let player = player(NullBackend::new());
        assert!(!player.is_playing());
        assert_eq!(player.backend().loaded_paths().len(), 1);
        assert_eq!(player.backend().volume(), DEFAULT_VOLUME);
        assert_eq!(player.graph().state(), GraphState::Unattached);
    }

    #[test]
    fn toggle_play_attaches_graph_and_plays() {
        let mut player = player(NullBackend::new());
        player.toggle_play();
        assert!(player.is_playing());
        assert_eq!(player.graph().state(), GraphState::Attached);
        assert!(player.frequency_snapshot().is_some());

        player.toggle_play();
        assert!(!player.is_playing());
        assert!(player.backend().is_paused());
    }

    #[test]
    fn toggle_play_while_buffering_reports_loading() {
        let mut player = player(NullBackend::new().with_load_latency(5).with_duration(None));
        player.toggle_play();
        assert!(!player.is_playing());
        assert_eq!(player.session().status, Some(PlayerStatus::Loading));
        assert_eq!(player.backend().play_calls(), 0);

        settle(&mut player, 5);
        assert_eq!(player.session().status, None);
        player.toggle_play();
        assert!(player.is_playing());
    }

    #[test]
    fn rejected_play_reports_retryable_failure() {
        let mut backend = NullBackend::new();
        backend.set_reject_playback(true);
        let mut player = player(backend);
        player.toggle_play();
        assert!(!player.is_playing());
        assert_eq!(player.session().status, Some(PlayerStatus::PlaybackFailed));
    }

    #[test]
    fn play_expands_minimized_player() {
        let mut player = player(NullBackend::new());
        assert!(player.toggle_minimized());
        player.toggle_play();
        assert!(!player.session().minimized);
    }

    #[test]
    fn next_while_playing_resumes_on_new_track() {
        let mut player = player(NullBackend::new());
        player.toggle_play();
        player.next();
        assert_eq!(player.playlist().current_index(), 1);
        assert_eq!(player.graph().state(), GraphState::Unattached);
        assert!(player.pending_transition().is_some());

        player.tick();
        assert!(player.pending_transition().is_none());
        assert!(player.is_playing());
        assert!(!player.backend().is_paused());
        assert_eq!(player.graph().state(), GraphState::Attached);
    }

    #[test]
    fn next_while_paused_stays_paused() {
        let mut player = player(NullBackend::new());
        player.next();
        player.tick();
        assert!(!player.is_playing());
        assert_eq!(player.graph().state(), GraphState::Attached);
        assert_eq!(player.backend().play_calls(), 0);
    }

    #[test]
    fn transition_waits_for_readiness() {
        let mut player = player(NullBackend::new().with_load_latency(3));
        player.backend_mut().set_ready_state(ReadyState::EnoughData);
        player.toggle_play();
        assert!(player.is_playing());

        player.next();
        player.tick();
        assert!(player.pending_transition().is_some());
        assert_eq!(player.backend().play_calls(), 1);

        settle(&mut player, 3);
        assert!(player.pending_transition().is_none());
        assert_eq!(player.backend().play_calls(), 2);
        assert!(!player.backend().is_paused());
    }

    #[test]
    fn rejected_transition_asks_for_a_click() {
        let mut player = player(NullBackend::new());
        player.toggle_play();
        player.backend_mut().set_reject_playback(true);
        player.next();
        player.tick();
        assert!(!player.is_playing());
        assert_eq!(player.session().status, Some(PlayerStatus::ClickToContinue));
    }

    #[test]
    fn toggle_mid_transition_is_ignored() {
        let mut player = player(NullBackend::new().with_load_latency(2));
        player.next();
        player.toggle_play();
        assert!(!player.pending_transition().expect("pending").resume_playback);
        assert_eq!(player.backend().play_calls(), 0);

        settle(&mut player, 3);
        assert!(!player.is_playing());
        player.toggle_play();
        assert!(player.is_playing());
    }

    #[test]
    fn failed_load_surfaces_title_and_stops() {
        let mut backend = NullBackend::new();
        backend.fail_loads_of("B.mp3");
        let mut player = player(backend);
        player.toggle_play();
        player.next();
        assert!(!player.is_playing());
        assert_eq!(
            player.session().status.as_ref().map(ToString::to_string),
            Some(String::from("Failed to load: B"))
        );
        assert!(player.pending_transition().is_none());
    }

    #[test]
    fn ended_without_autoplay_stops_at_zero() {
        let mut player = player(NullBackend::new());
        player.toggle_autoplay();
        player.toggle_play();
        settle(&mut player, 4);
        player.backend_mut().finish();
        player.tick();
        assert_eq!(player.playlist().current_index(), 0);
        assert!(!player.is_playing());
        assert_eq!(player.session().position, 0.0);

        settle(&mut player, 2);
        assert!(!player.is_playing());
    }

    #[test]
    fn last_track_ending_wraps_to_first() {
        let mut player = player(NullBackend::new());
        player.jump_to(2).expect("jump");
        player.tick();
        player.toggle_play();
        player.backend_mut().finish();
        player.tick();
        assert_eq!(player.playlist().current_index(), 0);
        player.tick();
        assert!(player.is_playing());
    }

    #[test]
    fn jump_out_of_range_keeps_current_track() {
        let mut player = player(NullBackend::new());
        assert!(player.jump_to(7).is_err());
        assert_eq!(player.playlist().current_index(), 0);
        assert_eq!(player.backend().loaded_paths().len(), 1);
    }

    #[test]
    fn seek_requires_known_duration() {
        let mut player = player(NullBackend::new().with_duration(None));
        player.tick();
        player.seek(0.5);
        assert_eq!(player.session().position, 0.0);
        assert_eq!(player.backend().position(), Duration::ZERO);
    }

    #[test]
    fn seek_maps_fraction_onto_duration() {
        let mut player = player(NullBackend::new().with_duration(Some(Duration::from_secs(200))));
        player.tick();
        player.seek(0.5);
        assert_eq!(player.session().position, 100.0);
        assert_eq!(player.backend().position(), Duration::from_secs(100));
    }

    #[test]
    fn mute_round_trip_restores_volume() {
        let mut player = player(NullBackend::new());
        player.set_volume(0.4);
        player.toggle_mute();
        assert!(player.session().muted);
        assert_eq!(player.backend().volume(), 0.0);
        player.toggle_mute();
        assert!(!player.session().muted);
        assert_eq!(player.session().volume, 0.4);
        assert_eq!(player.backend().volume(), 0.4);
    }

    #[test]
    fn volume_zero_counts_as_muted_and_unmute_restores_last_level() {
        let mut player = player(NullBackend::new());
        player.set_volume(0.6);
        player.set_volume(0.0);
        assert!(player.session().muted);
        player.toggle_mute();
        assert_eq!(player.session().volume, 0.6);
        player.set_volume(3.0);
        assert_eq!(player.session().volume, 1.0);
    }

    #[test]
    fn stepping_down_reaches_exact_silence_and_unmute_restores_start() {
        let mut player = player(NullBackend::new());
        player.set_volume(0.3);
        for _ in 0..5 {
            player.nudge_volume(-0.05);
        }
        assert!(!player.session().muted);
        assert!((player.session().volume - 0.05).abs() < 1e-6);

        player.nudge_volume(-0.05);
        assert_eq!(player.session().volume, 0.0);
        assert!(player.session().muted);
        assert_eq!(player.backend().volume(), 0.0);

        player.toggle_mute();
        assert!(!player.session().muted);
        assert_eq!(player.session().volume, 0.3);
        assert_eq!(player.backend().volume(), 0.3);
    }

    #[test]
    fn stepping_up_lands_on_the_grid() {
        let mut player = player(NullBackend::new());
        player.set_volume(0.0);
        for _ in 0..3 {
            player.nudge_volume(0.1);
        }
        assert_eq!(player.session().volume, 0.3);
        assert_eq!(player.session().remembered_volume, 0.3);
    }

    #[test]
    fn deferred_shuffle_reloads_first_track_once() {
        let mut player = Player::new(
            playlist(&["A", "B", "C", "D", "E", "F", "G", "H"]),
            NullBackend::new(),
            PlayerSettings::default(),
        );
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(player.apply_deferred_shuffle(&mut rng));
        assert!(!player.apply_deferred_shuffle(&mut rng));
        assert_eq!(player.backend().loaded_paths().len(), 2);
        assert_eq!(
            player.backend().loaded_paths()[1],
            player.playlist().current().path
        );
    }

    #[test]
    fn unmount_closes_graph_and_ignores_later_calls() {
        let mut player = player(NullBackend::new());
        player.toggle_play();
        player.next();
        player.unmount();
        assert!(player.pending_transition().is_none());
        assert!(player.graph().is_closed());

        player.tick();
        player.toggle_play();
        player.next();
        assert!(!player.is_playing());
        assert_eq!(player.playlist().current_index(), 1);
    }
}
