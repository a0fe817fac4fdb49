use crate::library;
use crate::model::Track;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;
use std::path::PathBuf;

const PLACEHOLDER_GLYPH: &str = "♪";

/// A cover image downsampled to terminal cells; each cell carries two pixel
/// rows painted with an upper half block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    cols: u16,
    rows: u16,
    pixels: RgbImage,
}

impl CoverArt {
    pub fn from_image(img: &DynamicImage, cols: u16, rows: u16) -> Option<Self> {
        if cols == 0 || rows == 0 || img.width() == 0 || img.height() == 0 {
            return None;
        }
        let pixels = img
            .resize_exact(u32::from(cols), u32::from(rows) * 2, FilterType::Triangle)
            .to_rgb8();
        Some(Self { cols, rows, pixels })
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    fn color_at(&self, x: u32, y: u32) -> Color {
        let [r, g, b] = self.pixels.get_pixel(x, y).0;
        Color::Rgb(r, g, b)
    }
}

fn decode(track: &Track) -> Option<DynamicImage> {
    if let Some(path) = &track.cover_art {
        match image::open(path) {
            Ok(img) => return Some(img),
            Err(err) => log::debug!("cover {} unreadable: {err}", path.display()),
        }
    }
    let bytes = library::embedded_cover_art(&track.path)?;
    image::load_from_memory(&bytes).ok()
}

/// Remembers the last decoded cover so a redraw does not touch the disk.
#[derive(Debug, Default)]
pub struct CoverCache {
    key: Option<(PathBuf, u16, u16)>,
    art: Option<CoverArt>,
}

impl CoverCache {
    pub fn get(&mut self, track: &Track, cols: u16, rows: u16) -> Option<&CoverArt> {
        let key = (track.path.clone(), cols, rows);
        if self.key.as_ref() != Some(&key) {
            self.art = decode(track).and_then(|img| CoverArt::from_image(&img, cols, rows));
            self.key = Some(key);
        }
        self.art.as_ref()
    }
}

pub struct CoverView<'a> {
    art: Option<&'a CoverArt>,
    placeholder: Color,
}

impl<'a> CoverView<'a> {
    pub fn new(art: Option<&'a CoverArt>, placeholder: Color) -> Self {
        Self { art, placeholder }
    }
}

impl Widget for CoverView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let Some(art) = self.art else {
            let x = area.x + area.width / 2;
            let y = area.y + area.height / 2;
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(PLACEHOLDER_GLYPH).set_fg(self.placeholder);
            }
            return;
        };

        for row in 0..art.rows().min(area.height) {
            for col in 0..art.cols().min(area.width) {
                let top = art.color_at(u32::from(col), u32::from(row) * 2);
                let bottom = art.color_at(u32::from(col), u32::from(row) * 2 + 1);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol("▀").set_fg(top).set_bg(bottom);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn split_image() -> DynamicImage {
        let mut img = RgbImage::new(8, 8);
        for (_, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = if y < 4 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) };
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn downsampled_cover_paints_half_blocks() {
        let art = CoverArt::from_image(&split_image(), 2, 2).expect("art");
        let area = Rect::new(0, 0, 2, 2);
        let mut buf = Buffer::empty(area);
        CoverView::new(Some(&art), Color::Gray).render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), "▀");
        assert_eq!(buf[(0, 0)].fg, Color::Rgb(255, 0, 0));
        assert_eq!(buf[(1, 1)].bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn missing_cover_draws_placeholder_glyph() {
        let area = Rect::new(0, 0, 5, 3);
        let mut buf = Buffer::empty(area);
        CoverView::new(None, Color::Gray).render(area, &mut buf);
        assert_eq!(buf[(2, 1)].symbol(), PLACEHOLDER_GLYPH);
    }

    #[test]
    fn unreadable_cover_falls_back_to_none() {
        let mut track = Track::new("A", "B", "missing.mp3");
        track.cover_art = Some(PathBuf::from("missing.png"));
        let mut cache = CoverCache::default();
        assert!(cache.get(&track, 4, 4).is_none());
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        assert!(CoverArt::from_image(&split_image(), 0, 3).is_none());
    }
}
