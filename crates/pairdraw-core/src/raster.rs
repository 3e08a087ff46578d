//! Fixed-size RGBA raster surfaces.
//!
//! Pixels are stored as straight (non-premultiplied) RGBA8, row-major. Strokes are
//! rasterized as round-capped segments with one pixel of anti-aliasing, which is
//! what a 2D canvas produces for `lineCap = "round"`.

use crate::pen::Rgb;
use kurbo::{Point, Rect};
use std::fmt;

/// An RGBA8 pixel.
pub type Pixel = [u8; 4];

/// A fixed-size raster surface.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Raster {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        self.pixels.as_flattened()
    }

    /// Surface bounds in pixel coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Read a pixel, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[self.offset(x, y)])
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.pixels.fill([0; 4]);
    }

    /// Whether every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|px| px[3] == 0)
    }

    /// Stroke a round-capped segment with source-over blending.
    pub fn stroke_segment(&mut self, from: Point, to: Point, width: f64, color: Rgb, alpha: f64) {
        let alpha = crate::pen::clamp_alpha(alpha);
        if alpha <= 0.0 || width <= 0.0 {
            return;
        }
        let src = color.channels();
        self.cover_segment(from, to, width / 2.0, |px, coverage| {
            blend_over(px, src, alpha * coverage);
        });
    }

    /// Remove coverage along a round-capped segment (destination-out).
    pub fn erase_segment(&mut self, from: Point, to: Point, size: f64) {
        if size <= 0.0 {
            return;
        }
        self.cover_segment(from, to, size / 2.0, |px, coverage| {
            let remaining = px[3] as f64 * (1.0 - coverage);
            px[3] = remaining.round() as u8;
            if px[3] == 0 {
                *px = [0; 4];
            }
        });
    }

    /// Visit every pixel touched by a segment of the given radius with its coverage.
    fn cover_segment(
        &mut self,
        from: Point,
        to: Point,
        radius: f64,
        mut apply: impl FnMut(&mut Pixel, f64),
    ) {
        if !(from.is_finite() && to.is_finite() && radius.is_finite()) {
            return;
        }
        let reach = radius + 1.0;
        let area = Rect::from_points(from, to)
            .inflate(reach, reach)
            .intersect(self.bounds());
        if area.width() <= 0.0 || area.height() <= 0.0 {
            return;
        }

        let x0 = area.x0.floor() as u32;
        let y0 = area.y0.floor() as u32;
        let x1 = (area.x1.ceil() as u32).min(self.width);
        let y1 = (area.y1.ceil() as u32).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let distance = distance_to_segment(center, from, to);
                let coverage = (radius + 0.5 - distance).clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let i = self.offset(x, y);
                apply(&mut self.pixels[i], coverage);
            }
        }
    }

    /// Draw `src` over this surface at full opacity (source-over).
    pub fn draw_over(&mut self, src: &Raster) {
        debug_assert_eq!((self.width, self.height), (src.width, src.height));
        for (dst, src) in self.pixels.iter_mut().zip(&src.pixels) {
            if src[3] == 0 {
                continue;
            }
            blend_over(dst, [src[0], src[1], src[2]], src[3] as f64 / 255.0);
        }
    }

    /// Nearest-neighbour resample to a new size.
    pub fn scaled(&self, width: u32, height: u32) -> Raster {
        let mut out = Raster::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let sx = (x as u64 * self.width as u64 / width as u64) as u32;
                let di = out.offset(x, y);
                out.pixels[di] = self.pixels[self.offset(sx, sy)];
            }
        }
        out
    }
}

/// Distance from `p` to the segment `a`-`b`.
fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.hypot2();
    if len_sq < f64::EPSILON {
        return ap.hypot();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    let projection = a + ab * t;
    (p - projection).hypot()
}

/// Straight-alpha source-over of a color with the given alpha.
fn blend_over(dst: &mut Pixel, src: [u8; 3], src_alpha: f64) {
    if src_alpha <= 0.0 {
        return;
    }
    let dst_alpha = dst[3] as f64 / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        *dst = [0; 4];
        return;
    }
    for c in 0..3 {
        let value =
            (src[c] as f64 * src_alpha + dst[c] as f64 * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}
