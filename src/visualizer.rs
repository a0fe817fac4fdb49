use crate::audio::FrequencySnapshot;
use crate::theme::Palette;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;
use std::time::{Duration, Instant};

pub const DEFAULT_BAR_COUNT: usize = 32;

const EIGHTHS: [&str; 9] = [" ", "▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];

/// Terminal stand-in for a display-synced frame callback: at most one frame
/// is outstanding, and it only becomes due once the frame interval elapsed.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Duration,
    requested: bool,
    last_frame: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            requested: false,
            last_frame: None,
        }
    }

    pub fn request(&mut self) {
        self.requested = true;
    }

    pub fn cancel(&mut self) {
        self.requested = false;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Consumes the outstanding request if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if !self.requested {
            return false;
        }
        if let Some(last) = self.last_frame
            && now.saturating_duration_since(last) < self.interval
        {
            return false;
        }
        self.requested = false;
        self.last_frame = Some(now);
        true
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        if !self.requested {
            return None;
        }
        Some(
            self.last_frame
                .map_or(Duration::ZERO, |last| {
                    self.interval
                        .saturating_sub(now.saturating_duration_since(last))
                }),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePlan {
    /// Nothing to paint: the surface is hidden or has no room.
    Skip,
    /// The flat line shown when there is no signal.
    Baseline,
    /// Bar heights in eighths of a row.
    Bars(Vec<u16>),
}

pub struct Visualizer {
    bar_count: usize,
    scheduler: FrameScheduler,
    was_playing: bool,
    last_plan: FramePlan,
    gradient: bool,
}

impl Visualizer {
    pub fn new(bar_count: usize, frame_interval: Duration) -> Self {
        Self {
            bar_count: bar_count.max(1),
            scheduler: FrameScheduler::new(frame_interval),
            was_playing: false,
            last_plan: FramePlan::Baseline,
            gradient: true,
        }
    }

    /// Shaded bars are the default; low-end profiles turn them off.
    pub fn with_gradient(mut self, gradient: bool) -> Self {
        self.gradient = gradient;
        self
    }

    pub fn gradient(&self) -> bool {
        self.gradient
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn last_plan(&self) -> &FramePlan {
        &self.last_plan
    }

    /// Called once per loop with the transport state. A change in `playing`
    /// always buys one frame so the final state gets painted.
    pub fn observe(&mut self, playing: bool) {
        if playing != self.was_playing {
            self.scheduler.request();
        }
        self.was_playing = playing;
    }

    pub fn take_due(&mut self, now: Instant) -> bool {
        self.scheduler.take_due(now)
    }

    /// Plans one frame. `area` is `(width, height)` of the drawing surface,
    /// `None` while it is hidden.
    pub fn frame(
        &mut self,
        playing: bool,
        snapshot: Option<&FrequencySnapshot>,
        area: Option<(u16, u16)>,
    ) -> &FramePlan {
        let Some((_, height)) = area.filter(|(w, h)| *w > 0 && *h > 0) else {
            self.scheduler.cancel();
            self.last_plan = FramePlan::Skip;
            return &self.last_plan;
        };

        if !playing {
            self.scheduler.cancel();
            self.last_plan = FramePlan::Baseline;
            return &self.last_plan;
        }

        self.scheduler.request();
        self.last_plan = match snapshot {
            Some(snapshot) if !snapshot.is_empty() => {
                FramePlan::Bars(bar_heights(snapshot.bins(), self.bar_count, height))
            }
            _ => FramePlan::Baseline,
        };
        &self.last_plan
    }
}

/// Samples `bar_count` bins at a fixed stride and scales 0..=255 onto
/// `height` rows, in eighths.
pub fn bar_heights(bins: &[u8], bar_count: usize, height: u16) -> Vec<u16> {
    if bins.is_empty() || bar_count == 0 {
        return Vec::new();
    }
    let stride = (bins.len() / bar_count).max(1);
    let max_eighths = u32::from(height) * 8;
    (0..bar_count)
        .map(|bar| {
            let value = bins.get(bar * stride).copied().unwrap_or(0);
            (u32::from(value) * max_eighths / 255) as u16
        })
        .collect()
}

/// Paints a [`FramePlan`] with a bottom-to-top blend from the muted colour to
/// the accent colour, or in flat accent when the gradient is off.
pub struct SpectrumBars<'a> {
    plan: &'a FramePlan,
    palette: Palette,
    gradient: bool,
}

impl<'a> SpectrumBars<'a> {
    pub fn new(plan: &'a FramePlan, palette: Palette) -> Self {
        Self {
            plan,
            palette,
            gradient: true,
        }
    }

    pub fn gradient(mut self, gradient: bool) -> Self {
        self.gradient = gradient;
        self
    }
}

impl Widget for SpectrumBars<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let bottom = area.y + area.height - 1;

        match self.plan {
            FramePlan::Skip => {}
            FramePlan::Baseline => {
                for x in area.x..area.x + area.width {
                    if let Some(cell) = buf.cell_mut((x, bottom)) {
                        cell.set_symbol(EIGHTHS[1]).set_fg(self.palette.muted);
                    }
                }
            }
            FramePlan::Bars(heights) => {
                let count = heights.len().max(1) as u16;
                let slot = (area.width / count).max(1);
                let bar_width = if slot > 2 { slot - 1 } else { slot };
                let rows = area.height;

                for (index, eighths) in heights.iter().enumerate() {
                    let left = area.x + index as u16 * slot;
                    if left >= area.x + area.width {
                        break;
                    }
                    let full_rows = eighths / 8;
                    let remainder = (eighths % 8) as usize;

                    for row in 0..rows {
                        let symbol = if row < full_rows {
                            EIGHTHS[8]
                        } else if row == full_rows && remainder > 0 {
                            EIGHTHS[remainder]
                        } else if row == 0 {
                            EIGHTHS[1]
                        } else {
                            break;
                        };
                        let color = if self.gradient && rows > 1 {
                            let t = f32::from(row) / f32::from(rows - 1);
                            blend(self.palette.muted, self.palette.accent, t)
                        } else {
                            self.palette.accent
                        };
                        let y = bottom - row;
                        for x in left..(left + bar_width).min(area.x + area.width) {
                            if let Some(cell) = buf.cell_mut((x, y)) {
                                cell.set_symbol(symbol).set_fg(color);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn blend(from: Color, to: Color, t: f32) -> Color {
    match (from, to) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
            let t = t.clamp(0.0, 1.0);
            let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
            Color::Rgb(mix(r1, r2), mix(g1, g2), mix(b1, b2))
        }
        _ => to,
    }
}
