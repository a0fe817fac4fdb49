//! Device capability probing and the settings every animated widget reads.
//!
//! The profile is resolved once at startup and never changes afterwards.

use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub cores: usize,
    pub memory_mb: Option<u64>,
    pub reduced_motion: bool,
}

impl DeviceCapabilities {
    /// `reduced_motion_override` comes from the persisted state; otherwise the
    /// `SPECTRA_REDUCED_MOTION` / `NO_MOTION` environment variables decide.
    pub fn detect(reduced_motion_override: Option<bool>) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let reduced_motion = reduced_motion_override.unwrap_or_else(|| {
            std::env::var_os("SPECTRA_REDUCED_MOTION").is_some()
                || std::env::var_os("NO_MOTION").is_some()
        });

        Self {
            cores,
            memory_mb: total_memory_mb(),
            reduced_motion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceTier {
    Low,
    Balanced,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceProfile {
    pub tier: PerformanceTier,
    pub frame_rate: u32,
    pub visualizer_bars: usize,
    /// Gradient-shaded spectrum bars. Off on low-end machines and under
    /// reduced motion, where the bars are painted in one colour.
    pub enable_complex_animations: bool,
}

impl PerformanceProfile {
    pub fn resolve(caps: &DeviceCapabilities) -> Self {
        let low_memory = caps.memory_mb.is_some_and(|mb| mb < 4_096);
        let tier = if caps.cores <= 2 || low_memory {
            PerformanceTier::Low
        } else if caps.cores >= 8 && !caps.memory_mb.is_some_and(|mb| mb < 8_192) {
            PerformanceTier::High
        } else {
            PerformanceTier::Balanced
        };

        let (frame_rate, visualizer_bars) = match tier {
            PerformanceTier::Low => (30, 16),
            PerformanceTier::Balanced => (45, 32),
            PerformanceTier::High => (60, 32),
        };

        let animate = !caps.reduced_motion;
        Self {
            tier,
            frame_rate: if animate { frame_rate } else { frame_rate.min(15) },
            visualizer_bars,
            enable_complex_animations: animate && tier != PerformanceTier::Low,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1_000 / u64::from(self.frame_rate.max(1)))
    }
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self::resolve(&DeviceCapabilities {
            cores: 4,
            memory_mb: None,
            reduced_motion: false,
        })
    }
}

fn total_memory_mb() -> Option<u64> {
    let raw = fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_total_mb(&raw)
}

fn parse_meminfo_total_mb(raw: &str) -> Option<u64> {
    let line = raw.lines().find(|line| line.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1_024)
}
