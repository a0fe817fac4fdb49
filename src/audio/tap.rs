use rodio::Source;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mono samples kept per element. Several analyser windows deep so a slow
/// frame still sees recent audio.
pub const TAP_CAPACITY: usize = 4_096;

const FLUSH_EVERY: usize = 256;

struct TapShared {
    samples: Mutex<VecDeque<f32>>,
    connected: AtomicBool,
    capacity: usize,
}

/// The capture side of one media element. Cloned into the decoder chain on
/// the mixer thread and into the graph on the UI thread.
#[derive(Clone)]
pub struct TapPort {
    shared: Arc<TapShared>,
}

impl TapPort {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(TapShared {
                samples: Mutex::new(VecDeque::with_capacity(capacity)),
                connected: AtomicBool::new(false),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn connect(&self) {
        self.shared.connected.store(true, Ordering::Release);
    }

    /// Stops capture and drops whatever was buffered. Calling it on an
    /// already disconnected port does nothing.
    pub fn disconnect(&self) {
        if !self.shared.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut samples) = self.shared.samples.lock() {
            samples.clear();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Appends mono samples. Never blocks: if the reader holds the lock the
    /// batch is dropped and `false` is returned.
    pub fn push_samples(&self, batch: &[f32]) -> bool {
        if !self.is_connected() {
            return true;
        }
        let Ok(mut samples) = self.shared.samples.try_lock() else {
            return false;
        };
        for &sample in batch {
            if samples.len() >= self.shared.capacity {
                samples.pop_front();
            }
            samples.push_back(sample);
        }
        true
    }

    /// Copies the newest samples into `out`, zero-filling the front when
    /// fewer are buffered. Returns how many real samples were copied.
    pub fn latest(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let Ok(samples) = self.shared.samples.lock() else {
            return 0;
        };
        let count = samples.len().min(out.len());
        let skip = samples.len() - count;
        let offset = out.len() - count;
        for (slot, sample) in out[offset..].iter_mut().zip(samples.iter().skip(skip)) {
            *slot = *sample;
        }
        count
    }
}

/// Passes samples through untouched while down-mixing a copy to mono for the
/// analyser.
pub struct CaptureSource<S> {
    inner: S,
    port: TapPort,
    channels: usize,
    channel_cursor: usize,
    frame_sum: f32,
    discard_frame: bool,
    pending: Vec<f32>,
}

impl<S> CaptureSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, port: TapPort) -> Self {
        let channels = usize::from(u16::from(inner.channels())).max(1);
        Self {
            inner,
            port,
            channels,
            channel_cursor: 0,
            frame_sum: 0.0,
            discard_frame: false,
            pending: Vec::with_capacity(FLUSH_EVERY),
        }
    }

    fn flush(&mut self) {
        if self.port.push_samples(&self.pending) || self.pending.len() >= TAP_CAPACITY {
            self.pending.clear();
        }
    }
}

impl<S> Iterator for CaptureSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;

        self.frame_sum += sample;
        self.channel_cursor += 1;
        if self.channel_cursor == self.channels {
            if !self.discard_frame {
                self.pending.push(self.frame_sum / self.channels as f32);
            }
            self.discard_frame = false;
            self.frame_sum = 0.0;
            self.channel_cursor = 0;
            if self.pending.len() >= FLUSH_EVERY {
                self.flush();
            }
        }

        Some(sample)
    }
}

impl<S> Source for CaptureSource<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    /// rodio keeps the channel order across a seek, so the cursor stays put
    /// and only the straddling frame is dropped.
    fn try_seek(&mut self, pos: Duration) -> Result<(), rodio::source::SeekError> {
        self.inner.try_seek(pos)?;
        self.pending.clear();
        self.frame_sum = 0.0;
        self.discard_frame = self.channel_cursor != 0;
        Ok(())
    }
}
