use super::tap::{CaptureSource, TAP_CAPACITY, TapPort};
use super::{AudioBackend, ContextState, ElementId, GraphError, PlaybackError, ReadyState, SourceNode};
use crate::library;
use anyhow::{Context, Result};
use rodio::Source;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

struct MediaElement {
    id: ElementId,
    sink: Sink,
    port: TapPort,
    source_bound: bool,
    path: PathBuf,
    duration: Option<Duration>,
}

/// Plays through the default output device. The stream is opened once and
/// kept until `close`; each track gets its own sink.
pub struct RodioBackend {
    stream: Option<OutputStream>,
    element: Option<MediaElement>,
    next_id: u64,
    volume: f32,
    context: ContextState,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let stream = open_output_stream()?;
        log::info!("opened default audio output");
        Ok(Self {
            stream: Some(stream),
            element: None,
            next_id: 1,
            volume: 1.0,
            context: ContextState::Suspended,
        })
    }
}

/// Some decoders cannot tell the length of a stream, so the container
/// headers are consulted before giving up.
fn known_duration(reported: Option<Duration>, path: &Path) -> Option<Duration> {
    reported
        .filter(|duration| !duration.is_zero())
        .or_else(|| library::container_duration(path))
}

fn open_output_stream() -> Result<OutputStream> {
    let mut stream = with_silenced_stderr(|| {
        OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            })
    })?;
    stream.log_on_drop(false);
    Ok(stream)
}

impl AudioBackend for RodioBackend {
    fn load(&mut self, path: &Path) -> Result<ElementId> {
        self.unload();
        let stream = self
            .stream
            .as_ref()
            .context("audio context is closed")?;

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        let duration = known_duration(source.total_duration(), path);
        let port = TapPort::new(TAP_CAPACITY);
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(CaptureSource::new(source, port.clone()));

        let id = ElementId(self.next_id);
        self.next_id += 1;
        log::debug!("loaded {} as element {}", path.display(), id.0);
        self.element = Some(MediaElement {
            id,
            sink,
            port,
            source_bound: false,
            path: path.to_path_buf(),
            duration,
        });
        Ok(id)
    }

    fn unload(&mut self) {
        if let Some(element) = self.element.take() {
            element.port.disconnect();
            element.sink.stop();
        }
    }

    fn element(&self) -> Option<ElementId> {
        self.element.as_ref().map(|element| element.id)
    }

    fn ready_state(&self) -> ReadyState {
        // Decoding is synchronous, so a loaded element is fully playable.
        if self.element.is_some() {
            ReadyState::EnoughData
        } else {
            ReadyState::Nothing
        }
    }

    fn play(&mut self) -> std::result::Result<(), PlaybackError> {
        if self.context == ContextState::Closed {
            return Err(PlaybackError::Rejected(String::from("audio context is closed")));
        }
        let Some(element) = self.element.as_ref() else {
            return Err(PlaybackError::NotReady);
        };
        if element.sink.empty() {
            return Err(PlaybackError::Rejected(format!(
                "nothing left to play in {}",
                element.path.display()
            )));
        }
        element.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(element) = &self.element {
            element.sink.pause();
        }
    }

    fn is_paused(&self) -> bool {
        self.element
            .as_ref()
            .is_none_or(|element| element.sink.is_paused())
    }

    fn is_ended(&self) -> bool {
        self.element.as_ref().is_some_and(|element| element.sink.empty())
    }

    fn position(&self) -> Duration {
        self.element
            .as_ref()
            .map_or(Duration::ZERO, |element| element.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.element.as_ref()?.duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        let element = self.element.as_ref().context("no active track")?;
        element
            .sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(element) = &self.element {
            element.sink.set_volume(self.volume);
        }
    }

    fn context_state(&self) -> ContextState {
        self.context
    }

    fn resume_context(&mut self) -> Result<()> {
        match self.context {
            ContextState::Suspended => {
                self.context = ContextState::Running;
                Ok(())
            }
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(anyhow::anyhow!("audio context is closed")),
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

    fn tick(&mut self) {}

    fn close(&mut self) {
        self.unload();
        if self.stream.take().is_some() {
            log::info!("closed audio output");
        }
        self.context = ContextState::Closed;
    }

    fn output_name(&self) -> String {
        String::from("System default output")
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}
