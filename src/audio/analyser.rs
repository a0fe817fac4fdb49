//! Byte frequency data in the shape a Web Audio analyser node reports it:
//! Blackman-windowed FFT, exponential smoothing across calls, magnitudes
//! mapped from a decibel range onto 0..=255.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub const DEFAULT_FFT_SIZE: usize = 256;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

/// One analyser reading: `fft_size / 2` bins, 0 is silence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Vec<u8>,
}

impl FrequencySnapshot {
    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl Analyser {
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft,
            fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    /// `time_domain` shorter than the FFT size is treated as zero-padded at
    /// the front; longer input contributes only its newest samples.
    pub fn byte_frequency_data(&mut self, time_domain: &[f32]) -> FrequencySnapshot {
        let skip = time_domain.len().saturating_sub(self.fft_size);
        let recent = &time_domain[skip..];
        let offset = self.fft_size - recent.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i >= offset { recent[i - offset] } else { 0.0 };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let range = (self.max_decibels - self.min_decibels).max(f32::EPSILON);
        let bins = self
            .smoothed
            .iter_mut()
            .zip(self.buffer.iter())
            .map(|(smoothed, value)| {
                let magnitude = value.norm() * scale;
                *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
                if !smoothed.is_finite() {
                    *smoothed = 0.0;
                }

                let db = 20.0 * smoothed.max(f32::MIN_POSITIVE).log10();
                let scaled = 255.0 * (db - self.min_decibels) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect();

        FrequencySnapshot { bins }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_bin: usize, fft_size: usize, amplitude: f32) -> Vec<f32> {
        (0..fft_size)
            .map(|i| amplitude * (2.0 * PI * freq_bin as f32 * i as f32 / fft_size as f32).sin())
            .collect()
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = Analyser::new(DEFAULT_FFT_SIZE);
        let snapshot = analyser.byte_frequency_data(&[0.0; DEFAULT_FFT_SIZE]);
        assert_eq!(snapshot.len(), DEFAULT_FFT_SIZE / 2);
        assert!(snapshot.bins().iter().all(|bin| *bin == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyser = Analyser::new(DEFAULT_FFT_SIZE).with_smoothing(0.0);
        let snapshot = analyser.byte_frequency_data(&sine(16, DEFAULT_FFT_SIZE, 0.05));
        let (peak, _) = snapshot
            .bins()
            .iter()
            .enumerate()
            .max_by_key(|(_, value)| **value)
            .expect("bins");
        assert_eq!(peak, 16);
        assert!(snapshot.bins()[16] > 200);
    }

    #[test]
    fn smoothing_carries_energy_into_the_next_frame() {
        let mut analyser = Analyser::new(DEFAULT_FFT_SIZE);
        let loud = sine(8, DEFAULT_FFT_SIZE, 0.8);
        let first = analyser.byte_frequency_data(&loud);
        let decayed = analyser.byte_frequency_data(&[0.0; DEFAULT_FFT_SIZE]);
        assert!(decayed.bins()[8] > 0);
        assert!(decayed.bins()[8] <= first.bins()[8]);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut analyser = Analyser::new(64);
        let snapshot = analyser.byte_frequency_data(&[0.25; 10]);
        assert_eq!(snapshot.len(), 32);
    }
}
