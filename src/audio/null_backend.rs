use super::tap::{TAP_CAPACITY, TapPort};
use super::{AudioBackend, ContextState, ElementId, GraphError, PlaybackError, ReadyState, SourceNode};
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

struct NullElement {
    id: ElementId,
    port: TapPort,
    source_bound: bool,
    ticks_until_ready: u32,
    ready: ReadyState,
    position: Duration,
    ended: bool,
}

/// Silent backend with a logical clock that moves one `tick_step` per tick
/// while playing. Readiness, durations and failures are configurable so the
/// transport can be driven without a sound card.
pub struct NullBackend {
    element: Option<NullElement>,
    paused: bool,
    next_id: u64,
    volume: f32,
    context: ContextState,
    duration: Option<Duration>,
    load_latency_ticks: u32,
    tick_step: Duration,
    reject_playback: bool,
    failing_paths: HashSet<PathBuf>,
    loaded: Vec<PathBuf>,
    play_calls: usize,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            element: None,
            paused: true,
            next_id: 1,
            volume: 1.0,
            context: ContextState::Suspended,
            duration: Some(Duration::from_secs(180)),
            load_latency_ticks: 0,
            tick_step: Duration::from_millis(50),
            reject_playback: false,
            failing_paths: HashSet::new(),
            loaded: Vec::new(),
            play_calls: 0,
        }
    }

    /// Duration reported for every element loaded afterwards. `None` models a
    /// stream whose length is unknown.
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Ticks a freshly loaded element spends buffering before it can play.
    pub fn with_load_latency(mut self, ticks: u32) -> Self {
        self.load_latency_ticks = ticks;
        self
    }

    pub fn with_tick_step(mut self, step: Duration) -> Self {
        self.tick_step = step;
        self
    }

    pub fn set_reject_playback(&mut self, reject: bool) {
        self.reject_playback = reject;
    }

    pub fn fail_loads_of(&mut self, path: impl Into<PathBuf>) {
        self.failing_paths.insert(path.into());
    }

    pub fn set_ready_state(&mut self, ready: ReadyState) {
        if let Some(element) = &mut self.element {
            element.ready = ready;
            element.ticks_until_ready = 0;
        }
    }

    /// Jumps the current element to its end, as if it had played out.
    pub fn finish(&mut self) {
        let duration = self.duration;
        if let Some(element) = &mut self.element {
            element.position = duration.unwrap_or(element.position);
            element.ended = true;
            self.paused = true;
        }
    }

    /// Feeds mono samples through the current element's tap.
    pub fn feed(&self, samples: &[f32]) -> bool {
        self.element
            .as_ref()
            .is_some_and(|element| element.port.push_samples(samples))
    }

    pub fn loaded_paths(&self) -> &[PathBuf] {
        &self.loaded
    }

    pub fn play_calls(&self) -> usize {
        self.play_calls
    }

    fn element_duration(&self) -> Option<Duration> {
        let element = self.element.as_ref()?;
        if element.ready.has_metadata() {
            self.duration
        } else {
            None
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn load(&mut self, path: &Path) -> Result<ElementId> {
        self.unload();
        if self.context == ContextState::Closed {
            return Err(anyhow::anyhow!("audio context is closed"));
        }
        if self.failing_paths.contains(path) {
            return Err(anyhow::anyhow!("failed to decode {}", path.display()));
        }

        let id = ElementId(self.next_id);
        self.next_id += 1;
        let ready = if self.load_latency_ticks == 0 {
            ReadyState::EnoughData
        } else {
            ReadyState::Nothing
        };
        self.element = Some(NullElement {
            id,
            port: TapPort::new(TAP_CAPACITY),
            source_bound: false,
            ticks_until_ready: self.load_latency_ticks,
            ready,
            position: Duration::ZERO,
            ended: false,
        });
        self.paused = true;
        self.loaded.push(path.to_path_buf());
        Ok(id)
    }

    fn unload(&mut self) {
        if let Some(element) = self.element.take() {
            element.port.disconnect();
        }
        self.paused = true;
    }

    fn element(&self) -> Option<ElementId> {
        self.element.as_ref().map(|element| element.id)
    }

    fn ready_state(&self) -> ReadyState {
        self.element
            .as_ref()
            .map_or(ReadyState::Nothing, |element| element.ready)
    }

    fn play(&mut self) -> std::result::Result<(), PlaybackError> {
        self.play_calls += 1;
        if self.context == ContextState::Closed {
            return Err(PlaybackError::Rejected(String::from("audio context is closed")));
        }
        if self.reject_playback {
            return Err(PlaybackError::Rejected(String::from("playback not allowed")));
        }
        let Some(element) = &mut self.element else {
            return Err(PlaybackError::NotReady);
        };
        if element.ended {
            element.position = Duration::ZERO;
            element.ended = false;
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_ended(&self) -> bool {
        self.element.as_ref().is_some_and(|element| element.ended)
    }

    fn position(&self) -> Duration {
        self.element
            .as_ref()
            .map_or(Duration::ZERO, |element| element.position)
    }

    fn duration(&self) -> Option<Duration> {
        self.element_duration()
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        let duration = self.element_duration();
        let Some(element) = &mut self.element else {
            return Err(anyhow::anyhow!("no active track"));
        };
        element.position = duration.map_or(position, |duration| position.min(duration));
        element.ended = false;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn context_state(&self) -> ContextState {
        self.context
    }

    fn resume_context(&mut self) -> Result<()> {
        match self.context {
            ContextState::Closed => Err(anyhow::anyhow!("audio context is closed")),
            _ => {
                self.context = ContextState::Running;
                Ok(())
            }
        }
    }

    fn create_media_source(&mut self) -> std::result::Result<SourceNode, GraphError> {
        if self.context == ContextState::Closed {
            return Err(GraphError::Closed);
        }
        let element = self.element.as_mut().ok_or(GraphError::NoElement)?;
        if element.source_bound {
            return Err(GraphError::AlreadyBound);
        }
        element.source_bound = true;
        Ok(SourceNode::new(element.id, element.port.clone()))
    }

    fn tick(&mut self) {
        let duration = self.duration;
        let paused = self.paused;
        let step = self.tick_step;
        let Some(element) = &mut self.element else {
            return;
        };

        if element.ticks_until_ready > 0 {
            element.ticks_until_ready -= 1;
            element.ready = if element.ticks_until_ready == 0 {
                ReadyState::EnoughData
            } else {
                ReadyState::Metadata
            };
            return;
        }

        if paused || element.ended {
            return;
        }
        element.position = element.position.saturating_add(step);
        if let Some(duration) = duration
            && element.position >= duration
        {
            element.position = duration;
            element.ended = true;
            self.paused = true;
        }
    }

    fn close(&mut self) {
        self.unload();
        self.context = ContextState::Closed;
    }

    fn output_name(&self) -> String {
        String::from("Null audio output")
    }
}
