use super::analyser::{Analyser, DEFAULT_FFT_SIZE, FrequencySnapshot};
use super::{AudioBackend, ContextState, GraphError, SourceNode};

/// Retries allowed after the element reports it is already bound.
const MAX_BIND_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Unattached,
    Attaching,
    Attached,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRetry {
    pub due_tick: u64,
}

/// Owns the backend and the source → analyser → output chain hanging off its
/// current element.
pub struct GraphManager<B: AudioBackend> {
    backend: B,
    state: GraphState,
    source: Option<SourceNode>,
    analyser: Option<Analyser>,
    fft_size: usize,
    pending_retry: Option<PendingRetry>,
    retries_used: u32,
    tick: u64,
    scratch: Vec<f32>,
    closed: bool,
}

impl<B: AudioBackend> GraphManager<B> {
    pub fn new(backend: B) -> Self {
        Self::with_fft_size(backend, DEFAULT_FFT_SIZE)
    }

    pub fn with_fft_size(backend: B, fft_size: usize) -> Self {
        Self {
            backend,
            state: GraphState::Unattached,
            source: None,
            analyser: None,
            fft_size,
            pending_retry: None,
            retries_used: 0,
            tick: 0,
            scratch: vec![0.0; fft_size],
            closed: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn pending_retry(&self) -> Option<PendingRetry> {
        self.pending_retry
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Binds a source node to the current element and connects it to a fresh
    /// analyser. A no-op while attached to the same element. On a double-bind
    /// the references are dropped and one retry is queued for the next tick.
    pub fn setup(&mut self) -> Result<(), GraphError> {
        self.attach()
    }

    fn attach(&mut self) -> Result<(), GraphError> {
        if self.closed {
            return Err(GraphError::Closed);
        }
        let element = self.backend.element().ok_or(GraphError::NoElement)?;
        if self.state == GraphState::Attached {
            if self.source.as_ref().map(SourceNode::element) == Some(element) {
                return Ok(());
            }
            self.teardown();
        }

        self.state = GraphState::Attaching;
        match self.backend.create_media_source() {
            Ok(source) => {
                source.connect();
                self.source = Some(source);
                self.analyser = Some(Analyser::new(self.fft_size));
                self.state = GraphState::Attached;
                self.pending_retry = None;
                self.retries_used = 0;
                log::debug!("audio graph attached to element {}", element.0);
                Ok(())
            }
            Err(GraphError::AlreadyBound) => {
                self.release();
                self.state = GraphState::Unattached;
                if self.retries_used < MAX_BIND_RETRIES {
                    self.retries_used += 1;
                    self.pending_retry = Some(PendingRetry {
                        due_tick: self.tick + 1,
                    });
                    log::info!("element {} already bound, retrying next tick", element.0);
                } else {
                    self.pending_retry = None;
                    log::warn!(
                        "element {} still bound after retry; playing without visualizer",
                        element.0
                    );
                }
                Err(GraphError::AlreadyBound)
            }
            Err(err) => {
                self.release();
                self.state = GraphState::Unattached;
                Err(err)
            }
        }
    }

    /// Cancels any queued retry and disconnects the chain. Safe to call in any
    /// state, any number of times.
    pub fn teardown(&mut self) {
        self.pending_retry = None;
        self.retries_used = 0;
        if self.source.is_some() || self.analyser.is_some() {
            self.state = GraphState::Detached;
            self.release();
            log::debug!("audio graph detached");
        }
        self.state = GraphState::Unattached;
    }

    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            source.disconnect();
        }
        self.analyser = None;
    }

    /// Advances the graph clock by one tick: the backend is polled and a due
    /// retry runs.
    pub fn tick(&mut self) {
        self.tick += 1;
        if self.closed {
            return;
        }
        self.backend.tick();

        if let Some(retry) = self.pending_retry
            && retry.due_tick <= self.tick
        {
            self.pending_retry = None;
            if let Err(err) = self.attach() {
                log::debug!("graph retry failed: {err}");
            }
        }
    }

    pub fn frequency_snapshot(&mut self) -> Option<FrequencySnapshot> {
        if self.state != GraphState::Attached {
            return None;
        }
        let source = self.source.as_ref()?;
        let analyser = self.analyser.as_mut()?;
        source.port().latest(&mut self.scratch);
        Some(analyser.byte_frequency_data(&self.scratch))
    }

    pub fn resume_context(&mut self) {
        if self.backend.context_state() != ContextState::Suspended {
            return;
        }
        if let Err(err) = self.backend.resume_context() {
            log::warn!("failed to resume audio context: {err:#}");
        }
    }

    /// Tears the graph down and closes the output context. Nothing runs
    /// afterwards; later ticks and setups are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.teardown();
        self.backend.close();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<B: AudioBackend> Drop for GraphManager<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullBackend;
    use std::path::Path;

    fn loaded_graph() -> GraphManager<NullBackend> {
        let mut graph = GraphManager::new(NullBackend::new());
        graph
            .backend_mut()
            .load(Path::new("a.mp3"))
            .expect("load");
        graph
    }

    #[test]
    fn snapshot_is_none_until_attached() {
        let mut graph = loaded_graph();
        assert!(graph.frequency_snapshot().is_none());

        graph.setup().expect("setup");
        let snapshot = graph.frequency_snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), DEFAULT_FFT_SIZE / 2);
        assert_eq!(graph.frequency_snapshot().map(|s| s.len()), Some(128));
    }

    #[test]
    fn setup_without_element_fails_cleanly() {
        let mut graph = GraphManager::new(NullBackend::new());
        assert_eq!(graph.setup(), Err(GraphError::NoElement));
        assert_eq!(graph.state(), GraphState::Unattached);
        assert!(graph.pending_retry().is_none());
    }

    #[test]
    fn second_setup_is_a_noop() {
        let mut graph = loaded_graph();
        graph.setup().expect("first setup");
        graph.setup().expect("second setup");
        assert_eq!(graph.state(), GraphState::Attached);
        assert!(graph.pending_retry().is_none());
    }

    #[test]
    fn teardown_twice_is_harmless() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        graph.teardown();
        assert_eq!(graph.state(), GraphState::Unattached);
        graph.teardown();
        assert_eq!(graph.state(), GraphState::Unattached);
        assert!(graph.frequency_snapshot().is_none());
    }

    #[test]
    fn rebinding_same_element_retries_once_then_gives_up() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        graph.teardown();

        assert_eq!(graph.setup(), Err(GraphError::AlreadyBound));
        assert_eq!(graph.state(), GraphState::Unattached);
        let retry = graph.pending_retry().expect("retry queued");
        assert_eq!(retry.due_tick, graph.current_tick() + 1);

        graph.tick();
        assert_eq!(graph.state(), GraphState::Unattached);
        assert!(graph.pending_retry().is_none());

        graph.tick();
        assert!(graph.pending_retry().is_none());
    }

    #[test]
    fn retry_succeeds_once_a_new_element_is_loaded() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        graph.teardown();
        assert_eq!(graph.setup(), Err(GraphError::AlreadyBound));

        graph
            .backend_mut()
            .load(Path::new("b.mp3"))
            .expect("load");
        graph.tick();
        assert_eq!(graph.state(), GraphState::Attached);
    }

    #[test]
    fn retry_after_unload_leaves_graph_unattached() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        graph.teardown();
        assert_eq!(graph.setup(), Err(GraphError::AlreadyBound));

        graph.backend_mut().unload();
        graph.tick();
        assert_eq!(graph.state(), GraphState::Unattached);
        assert!(graph.pending_retry().is_none());
        assert!(graph.frequency_snapshot().is_none());

        graph
            .backend_mut()
            .load(Path::new("b.mp3"))
            .expect("load");
        graph.setup().expect("setup after reload");
        assert_eq!(graph.state(), GraphState::Attached);
    }

    #[test]
    fn teardown_cancels_a_pending_retry() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        graph.teardown();
        let _ = graph.setup();
        assert!(graph.pending_retry().is_some());

        graph.teardown();
        assert!(graph.pending_retry().is_none());
    }

    #[test]
    fn fed_samples_reach_the_snapshot() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        let tone: Vec<f32> = (0..DEFAULT_FFT_SIZE)
            .map(|i| (i as f32 * 0.7).sin() * 0.5)
            .collect();
        assert!(graph.backend().feed(&tone));

        let snapshot = graph.frequency_snapshot().expect("snapshot");
        assert!(snapshot.bins().iter().any(|bin| *bin > 0));
    }

    #[test]
    fn close_stops_everything() {
        let mut graph = loaded_graph();
        graph.setup().expect("setup");
        graph.close();
        assert!(graph.is_closed());
        assert_eq!(graph.backend().context_state(), ContextState::Closed);
        assert_eq!(graph.setup(), Err(GraphError::Closed));
        graph.close();
    }

    #[test]
    fn resume_context_wakes_a_suspended_backend() {
        let mut graph = loaded_graph();
        assert_eq!(graph.backend().context_state(), ContextState::Suspended);
        graph.resume_context();
        assert_eq!(graph.backend().context_state(), ContextState::Running);
    }
}
