#![no_main]

use libfuzzer_sys::fuzz_target;
use spectra::audio::{AudioBackend, NullBackend};
use spectra::model::Track;
use spectra::playlist::Playlist;
use spectra::transport::{Player, PlayerSettings};

fuzz_target!(|data: &[u8]| {
    let len = (data.len() % 12).max(1);
    let tracks = (0..len)
        .map(|idx| Track::new(&format!("track {idx}"), "fuzz", format!("track_{idx}.mp3")))
        .collect();
    let Ok(playlist) = Playlist::new(tracks) else {
        return;
    };
    let mut player = Player::new(playlist, NullBackend::new(), PlayerSettings::default());

    for byte in data {
        match byte % 10 {
            0 => player.toggle_play(),
            1 => player.next(),
            2 => player.previous(),
            3 => player.seek(f64::from(*byte) / 255.0),
            4 => player.set_volume(f32::from(*byte) / 200.0),
            5 => player.toggle_mute(),
            6 => {
                player.toggle_autoplay();
            }
            7 => {
                let _ = player.jump_to(usize::from(*byte) % (len + 2));
            }
            8 => player.backend_mut().finish(),
            _ => player.tick(),
        }
        assert!(player.playlist().current_index() < len);
        assert!((0.0..=1.0).contains(&player.session().volume));
        assert!(player.backend().volume() <= 1.0);
    }
    player.unmount();
});
