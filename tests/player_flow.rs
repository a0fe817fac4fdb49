use spectra::audio::{AudioBackend, GraphState, NullBackend};
use spectra::model::Track;
use spectra::playlist::Playlist;
use spectra::transport::{Player, PlayerSettings, PlayerStatus};
use std::path::PathBuf;
use std::time::Duration;

fn abc() -> Playlist {
    Playlist::new(vec![
        Track::new("A", "Artist", "a.mp3"),
        Track::new("B", "Artist", "b.mp3"),
        Track::new("C", "Artist", "c.mp3"),
    ])
    .expect("playlist")
}

#[test]
fn autoplay_advances_to_the_next_track_once_ready() {
    let mut player = Player::new(
        abc(),
        NullBackend::new().with_load_latency(2),
        PlayerSettings::default(),
    );
    for _ in 0..3 {
        player.tick();
    }
    player.toggle_play();
    assert!(player.is_playing());

    player.backend_mut().finish();
    player.tick();
    assert_eq!(player.playlist().current_index(), 1);
    assert_eq!(player.graph().state(), GraphState::Unattached);

    for _ in 0..3 {
        player.tick();
    }
    assert!(player.pending_transition().is_none());
    assert!(player.is_playing());
    assert!(!player.backend().is_paused());
    assert_eq!(player.graph().state(), GraphState::Attached);
    assert_eq!(player.backend().loaded_paths().last(), Some(&PathBuf::from("b.mp3")));
}

#[test]
fn next_from_the_last_track_wraps() {
    let mut player = Player::new(abc(), NullBackend::new(), PlayerSettings::default());
    player.jump_to(2).expect("jump");
    player.next();
    assert_eq!(player.playlist().current_index(), 0);
    player.previous();
    assert_eq!(player.playlist().current_index(), 2);
}

#[test]
fn playback_runs_until_the_track_ends() {
    let backend = NullBackend::new()
        .with_duration(Some(Duration::from_millis(200)))
        .with_tick_step(Duration::from_millis(50));
    let mut player = Player::new(abc(), backend, PlayerSettings::default());
    player.tick();
    player.toggle_play();

    player.tick();
    assert!(player.session().position > 0.0);
    assert_eq!(player.session().duration, 0.2);

    for _ in 0..5 {
        player.tick();
    }
    assert_eq!(player.playlist().current_index(), 1);
}

#[test]
fn seek_and_mute_reach_the_backend() {
    let backend = NullBackend::new().with_duration(Some(Duration::from_secs(200)));
    let mut player = Player::new(abc(), backend, PlayerSettings::default());
    player.tick();

    player.seek(0.25);
    assert_eq!(player.backend().position(), Duration::from_secs(50));

    player.set_volume(0.4);
    player.toggle_mute();
    assert_eq!(player.backend().volume(), 0.0);
    player.toggle_mute();
    assert_eq!(player.backend().volume(), 0.4);
}

#[test]
fn unknown_duration_and_buffering_never_start_playback() {
    let backend = NullBackend::new()
        .with_duration(None)
        .with_load_latency(50);
    let mut player = Player::new(abc(), backend, PlayerSettings::default());
    player.toggle_play();
    player.seek(0.5);
    assert!(!player.is_playing());
    assert_eq!(player.session().status, Some(PlayerStatus::Loading));
    assert_eq!(player.session().position, 0.0);
}

#[test]
fn unmount_silences_everything() {
    let mut player = Player::new(abc(), NullBackend::new(), PlayerSettings::default());
    player.toggle_play();
    player.next();
    player.unmount();
    player.unmount();

    assert!(player.is_unmounted());
    assert!(player.graph().is_closed());
    let calls = player.backend().play_calls();
    for _ in 0..5 {
        player.tick();
    }
    assert_eq!(player.backend().play_calls(), calls);
    assert!(player.frequency_snapshot().is_none());
}
