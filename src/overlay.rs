//! Picture-in-picture thumbnails of the content and style inputs.
use image::{imageops, Rgb, RgbImage};

use crate::vision::image::resize_smooth;

pub const BORDER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Which thumbnails get pasted on the bottom-left corner of an output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub add_content: bool,
    pub add_style: bool,
    pub line_width: u32,
}

impl Default for Overlay {
    fn default() -> Self {
        Overlay { add_content: false, add_style: false, line_width: 2 }
    }
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        !self.add_content && !self.add_style
    }
}

/// Draws a rectangle outline of the given width, inset from the corners and
/// clipped to the image.
pub fn draw_outline(
    img: &mut RgbImage,
    min: (i64, i64),
    max: (i64, i64),
    width: u32,
    color: Rgb<u8>,
) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let mut put = |x: i64, y: i64| {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            img.put_pixel(x as u32, y as u32, color);
        }
    };
    for i in 0..width as i64 {
        let (x0, y0, x1, y1) = (min.0 + i, min.1 + i, max.0 - i, max.1 - i);
        if x0 > x1 || y0 > y1 {
            break;
        }
        for x in x0.max(0)..=x1.min(w - 1) {
            put(x, y0);
            put(x, y1);
        }
        for y in y0.max(0)..=y1.min(h - 1) {
            put(x0, y);
            put(x1, y);
        }
    }
}

// The outline leaves the left and bottom edges out of the thumbnail so that
// only the sides facing the frame are visible.
fn framed(mut thumb: RgbImage, line_width: u32) -> RgbImage {
    let (w, h) = (thumb.width() as i64, thumb.height() as i64);
    draw_outline(&mut thumb, (-10, 0), (w - 3, h + 10), line_width, BORDER_COLOR);
    thumb
}

/// Content thumbnail, a third of the output resolution.
pub fn content_thumbnail(content: &RgbImage, out: (u32, u32), line_width: u32) -> RgbImage {
    let size = ((out.0 / 3).max(1), (out.1 / 3).max(1));
    framed(resize_smooth(content, size.0, size.1), line_width)
}

/// Style thumbnail, the network style input shrunk by
/// `round(source_width / out_width * 0.8)`.
pub fn style_thumbnail(
    style: &RgbImage,
    source_width: u32,
    out: (u32, u32),
    line_width: u32,
) -> RgbImage {
    let ratio = (source_width as f64 / out.0.max(1) as f64 * 0.8).round().max(1.0) as u32;
    let size = ((style.width() / ratio).max(1), (style.height() / ratio).max(1));
    framed(resize_smooth(style, size.0, size.1), line_width)
}

/// Pastes the requested thumbnails on the bottom-left corner of `frame`, the
/// style one stacked above the content one when both are enabled.
pub fn compose(
    frame: &mut RgbImage,
    content: &RgbImage,
    style: &RgbImage,
    source_width: u32,
    overlay: &Overlay,
) {
    if overlay.is_empty() {
        return;
    }
    let out = frame.dimensions();
    let mut bottom = out.1 as i64;
    if overlay.add_content {
        let thumb = content_thumbnail(content, out, overlay.line_width);
        bottom -= thumb.height() as i64;
        imageops::replace(frame, &thumb, 0, bottom);
    }
    if overlay.add_style {
        let thumb = style_thumbnail(style, source_width, out, overlay.line_width);
        bottom -= thumb.height() as i64;
        imageops::replace(frame, &thumb, 0, bottom);
    }
}
