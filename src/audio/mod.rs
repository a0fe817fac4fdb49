pub mod analyser;
pub mod graph;
pub mod null_backend;
pub mod rodio_backend;
pub mod tap;

pub use analyser::{Analyser, FrequencySnapshot};
pub use graph::{GraphManager, GraphState};
pub use null_backend::NullBackend;
pub use rodio_backend::RodioBackend;
pub use tap::TapPort;

use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Identity of one loaded media element. A new id is issued on every load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// How much of the current element is buffered, ordered from nothing to
/// everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Nothing,
    Metadata,
    CurrentData,
    EnoughData,
}

impl ReadyState {
    pub fn can_play(self) -> bool {
        self >= Self::CurrentData
    }

    pub fn has_metadata(self) -> bool {
        self >= Self::Metadata
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// No media element is loaded.
    NoElement,
    /// The element already feeds a source node.
    AlreadyBound,
    /// The output context was closed.
    Closed,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoElement => write!(f, "no media element loaded"),
            Self::AlreadyBound => write!(f, "media element is already bound to a source node"),
            Self::Closed => write!(f, "audio context is closed"),
        }
    }
}

impl std::error::Error for GraphError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    NotReady,
    Rejected(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "media is not ready to play"),
            Self::Rejected(reason) => write!(f, "playback was rejected: {reason}"),
        }
    }
}

impl std::error::Error for PlaybackError {}

/// A capture tap bound to one media element. Dropping the node does not
/// release the element; only one node is ever handed out per element.
pub struct SourceNode {
    element: ElementId,
    port: TapPort,
}

impl SourceNode {
    pub fn new(element: ElementId, port: TapPort) -> Self {
        Self { element, port }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn port(&self) -> &TapPort {
        &self.port
    }

    pub fn connect(&self) {
        self.port.connect();
    }

    pub fn disconnect(&self) {
        self.port.disconnect();
    }
}

/// Output context plus the single current media element.
pub trait AudioBackend {
    fn load(&mut self, path: &Path) -> Result<ElementId>;
    fn unload(&mut self);
    fn element(&self) -> Option<ElementId>;
    fn ready_state(&self) -> ReadyState;
    fn play(&mut self) -> std::result::Result<(), PlaybackError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn is_ended(&self) -> bool;
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn context_state(&self) -> ContextState;
    fn resume_context(&mut self) -> Result<()>;
    fn create_media_source(&mut self) -> std::result::Result<SourceNode, GraphError>;
    fn tick(&mut self);
    fn close(&mut self);
    fn output_name(&self) -> String;
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn load(&mut self, path: &Path) -> Result<ElementId> {
        (**self).load(path)
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn element(&self) -> Option<ElementId> {
        (**self).element()
    }

    fn ready_state(&self) -> ReadyState {
        (**self).ready_state()
    }

    fn play(&mut self) -> std::result::Result<(), PlaybackError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn is_ended(&self) -> bool {
        (**self).is_ended()
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        (**self).seek_to(position)
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn context_state(&self) -> ContextState {
        (**self).context_state()
    }

    fn resume_context(&mut self) -> Result<()> {
        (**self).resume_context()
    }

    fn create_media_source(&mut self) -> std::result::Result<SourceNode, GraphError> {
        (**self).create_media_source()
    }

    fn tick(&mut self) {
        (**self).tick()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn output_name(&self) -> String {
        (**self).output_name()
    }
}
