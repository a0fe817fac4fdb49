use crate::model::Track;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistError {
    Empty,
    OutOfRange { index: usize, len: usize },
}

impl fmt::Display for PlaylistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "playlist has no tracks"),
            Self::OutOfRange { index, len } => {
                write!(f, "track {index} is out of range for {len} tracks")
            }
        }
    }
}

impl std::error::Error for PlaylistError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistOrder {
    /// Catalog order, as seen on the first frame.
    Declared,
    /// Permuted once after mount; never reshuffled.
    Shuffled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    tracks: Vec<Track>,
    current: usize,
    order: PlaylistOrder,
}

impl Playlist {
    pub fn new(catalog: Vec<Track>) -> Result<Self, PlaylistError> {
        if catalog.is_empty() {
            return Err(PlaylistError::Empty);
        }
        Ok(Self {
            tracks: catalog,
            current: 0,
            order: PlaylistOrder::Declared,
        })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Track {
        &self.tracks[self.current]
    }

    pub fn order(&self) -> PlaylistOrder {
        self.order
    }

    /// Fisher–Yates permutation of the tracks; the cursor goes back to the
    /// first slot.
    pub fn shuffled(&self, rng: &mut SmallRng) -> Self {
        let mut tracks = self.tracks.clone();
        tracks.shuffle(rng);
        Self {
            tracks,
            current: 0,
            order: PlaylistOrder::Shuffled,
        }
    }

    /// Runs the post-mount shuffle exactly once. Returns `false` when the
    /// order has already been randomized.
    pub fn apply_deferred_shuffle(&mut self, rng: &mut SmallRng) -> bool {
        if self.order == PlaylistOrder::Shuffled {
            return false;
        }
        *self = self.shuffled(rng);
        log::debug!("playlist shuffled, first track {:?}", self.current().title);
        true
    }

    pub fn advance(&self, direction: Direction) -> Self {
        let mut next = self.clone();
        next.step(direction);
        next
    }

    pub fn step(&mut self, direction: Direction) {
        let len = self.tracks.len();
        self.current = match direction {
            Direction::Forward => (self.current + 1) % len,
            Direction::Backward => (self.current + len - 1) % len,
        };
    }

    pub fn jump_to(&self, index: usize) -> Result<Self, PlaylistError> {
        if index >= self.tracks.len() {
            return Err(PlaylistError::OutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        let mut next = self.clone();
        next.current = index;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use rand::SeedableRng;

    fn catalog(len: usize) -> Vec<Track> {
        (0..len)
            .map(|n| Track::new(&format!("song_{n}"), "artist", format!("song_{n}.mp3")))
            .collect()
    }

    fn titles(playlist: &Playlist) -> Vec<String> {
        playlist.tracks().iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert_eq!(Playlist::new(Vec::new()), Err(PlaylistError::Empty));
    }

    #[test]
    fn next_from_last_wraps_to_first() {
        let playlist = Playlist::new(catalog(3)).expect("playlist");
        let at_end = playlist.jump_to(2).expect("jump");
        assert_eq!(at_end.advance(Direction::Forward).current_index(), 0);
    }

    #[test]
    fn previous_from_first_wraps_to_last() {
        let playlist = Playlist::new(catalog(3)).expect("playlist");
        assert_eq!(playlist.advance(Direction::Backward).current_index(), 2);
    }

    #[test]
    fn single_track_stays_put() {
        let mut playlist = Playlist::new(catalog(1)).expect("playlist");
        playlist.step(Direction::Forward);
        assert_eq!(playlist.current_index(), 0);
        playlist.step(Direction::Backward);
        assert_eq!(playlist.current_index(), 0);
    }

    #[test]
    fn jump_out_of_range_is_an_error() {
        let playlist = Playlist::new(catalog(3)).expect("playlist");
        assert_eq!(
            playlist.jump_to(3),
            Err(PlaylistError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(playlist.current_index(), 0);
    }

    #[test]
    fn deferred_shuffle_runs_once() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut playlist = Playlist::new(catalog(8)).expect("playlist").jump_to(5).expect("jump");
        assert_eq!(playlist.order(), PlaylistOrder::Declared);

        assert!(playlist.apply_deferred_shuffle(&mut rng));
        assert_eq!(playlist.order(), PlaylistOrder::Shuffled);
        assert_eq!(playlist.current_index(), 0);

        let after_first = titles(&playlist);
        assert!(!playlist.apply_deferred_shuffle(&mut rng));
        assert_eq!(titles(&playlist), after_first);
    }

    #[test]
    fn different_seeds_give_different_orders() {
        let playlist = Playlist::new(catalog(12)).expect("playlist");
        let a = playlist.shuffled(&mut SmallRng::seed_from_u64(1));
        let b = playlist.shuffled(&mut SmallRng::seed_from_u64(2));
        assert_ne!(titles(&a), titles(&b));
    }

    proptest::proptest! {
        #[test]
        fn full_cycle_returns_to_start(len in 1usize..40, start in 0usize..40) {
            let start = start % len;
            let mut playlist = Playlist::new(catalog(len)).expect("playlist").jump_to(start).expect("jump");
            for _ in 0..len {
                playlist.step(Direction::Forward);
                prop_assert!(playlist.current_index() < len);
            }
            prop_assert_eq!(playlist.current_index(), start);

            for _ in 0..len {
                playlist.step(Direction::Backward);
            }
            prop_assert_eq!(playlist.current_index(), start);
        }

        #[test]
        fn shuffle_is_a_permutation(len in 1usize..40, seed in proptest::prelude::any::<u64>()) {
            let playlist = Playlist::new(catalog(len)).expect("playlist");
            let shuffled = playlist.shuffled(&mut SmallRng::seed_from_u64(seed));

            let mut before = titles(&playlist);
            let mut after = titles(&shuffled);
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
            prop_assert_eq!(shuffled.current_index(), 0);
        }
    }
}
