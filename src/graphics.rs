use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;

/// Luminance ramp, dark to bright.
const ASCII_RAMP: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

/// Resize `image` to cover `area` at 16:9, for the given cell geometry.
pub fn fit_thumbnail(image: &DynamicImage, area: Rect, mode: DisplayMode) -> DynamicImage {
  let target_w = u32::from(area.width).max(1);
  // Terminal cells are roughly twice as tall as wide.
  let target_h = (target_w as f32 * 9.0 / 32.0 * mode.rows_per_cell() as f32).round() as u32;
  let max_h = u32::from(area.height) * mode.rows_per_cell();
  image.resize_to_fill(target_w, target_h.clamp(1, max_h.max(1)), FilterType::Triangle)
}

/// Draws a pre-sized thumbnail centred in its area.
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_half_blocks(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

/// Cell offset that centres `used` cells within `available`.
fn centre(available: u16, used: u32) -> u16 {
  (u32::from(available).saturating_sub(used) / 2) as u16
}

fn render_half_blocks(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let width = rgb.width().min(u32::from(area.width));
  let rows = rgb.height().div_ceil(2).min(u32::from(area.height));
  let left = area.x + centre(area.width, width);
  let top = area.y + centre(area.height, rows);

  for row in 0..rows {
    for col in 0..width {
      let upper = rgb.get_pixel(col, row * 2);
      let lower_y = row * 2 + 1;
      let bg = if lower_y < rgb.height() {
        let lower = rgb.get_pixel(col, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(
        left + col as u16,
        top + row as u16,
        "▀",
        Style::default().fg(Color::Rgb(upper[0], upper[1], upper[2])).bg(bg),
      );
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let width = luma.width().min(u32::from(area.width));
  let rows = luma.height().min(u32::from(area.height));
  let left = area.x + centre(area.width, width);
  let top = area.y + centre(area.height, rows);
  let last = ASCII_RAMP.len() - 1;

  for row in 0..rows {
    for col in 0..width {
      let level = luma.get_pixel(col, row)[0];
      let idx = ((f32::from(level) / 255.0) * last as f32).round() as usize;
      buf.set_string(left + col as u16, top + row as u16, ASCII_RAMP[idx.min(last)], Style::default());
    }
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage};

  use super::*;

  #[test]
  fn half_blocks_pair_two_pixel_rows_per_cell() {
    let mut img = RgbImage::new(2, 2);
    img.put_pixel(0, 0, Rgb([255, 0, 0]));
    img.put_pixel(0, 1, Rgb([0, 0, 255]));
    let image = DynamicImage::ImageRgb8(img);
    let area = Rect::new(0, 0, 2, 1);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &image, display_mode: DisplayMode::Direct }.render(area, &mut buf);
    let cell = &buf[(0, 0)];
    assert_eq!(cell.symbol(), "▀");
    assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
    assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
  }

  #[test]
  fn ascii_maps_brightness_to_ramp_ends() {
    let mut img = RgbImage::new(2, 1);
    img.put_pixel(1, 0, Rgb([255, 255, 255]));
    let image = DynamicImage::ImageRgb8(img);
    let area = Rect::new(0, 0, 2, 1);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &image, display_mode: DisplayMode::Ascii }.render(area, &mut buf);
    assert_eq!(buf[(0, 0)].symbol(), " ");
    assert_eq!(buf[(1, 0)].symbol(), "@");
  }

  #[test]
  fn small_images_are_centred() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, Rgb([255, 255, 255])));
    let area = Rect::new(0, 0, 6, 3);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &image, display_mode: DisplayMode::Ascii }.render(area, &mut buf);
    assert_eq!(buf[(2, 1)].symbol(), "@");
    assert_eq!(buf[(0, 0)].symbol(), " ");
  }

  #[test]
  fn fit_keeps_within_area() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(1280, 720));
    let area = Rect::new(0, 0, 40, 8);
    let fitted = fit_thumbnail(&image, area, DisplayMode::Direct);
    assert_eq!(fitted.width(), 40);
    assert!(fitted.height() <= 16);
    let fitted = fit_thumbnail(&image, area, DisplayMode::Ascii);
    assert!(fitted.height() <= 8);
  }
}
