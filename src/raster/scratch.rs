use std::sync::atomic::{AtomicU32, Ordering};

use super::bitmask::IslandBitmap;
use super::brush::Brush;
use super::primitives::{build_kernel, draw_line, draw_line_stepped, kernel_width, reflect};

/// Dirty rectangle in pixel coordinates, inclusive on both ends.
/// Starts empty; every rasterization step widens it by what it touched.
#[derive(Clone, Copy, Debug)]
pub struct DirtyRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl DirtyRect {
    pub const EMPTY: Self = Self {
        min_x: i32::MAX,
        min_y: i32::MAX,
        max_x: i32::MIN,
        max_y: i32::MIN,
    };

    /// Grow to cover the given span.
    pub fn include(&mut self, min_x: i32, min_y: i32, max_x: i32, max_y: i32) {
        self.min_x = self.min_x.min(min_x);
        self.min_y = self.min_y.min(min_y);
        self.max_x = self.max_x.max(max_x);
        self.max_y = self.max_y.max(max_y);
    }

    /// Pad on all four sides by a step's reach.
    pub fn expand(&mut self, pad: i32) {
        if self.is_empty() {
            return;
        }
        self.min_x -= pad;
        self.min_y -= pad;
        self.max_x += pad;
        self.max_y += pad;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Intersect with the canvas. An off-canvas rect comes back empty.
    pub fn clamped(&self, w: usize, h: usize) -> Self {
        Self {
            min_x: self.min_x.max(0),
            min_y: self.min_y.max(0),
            max_x: self.max_x.min(w as i32 - 1),
            max_y: self.max_y.min(h as i32 - 1),
        }
    }
}

/// Lock-free max-blend of a non-negative f32 into a shared accumulator cell.
///
/// Bit patterns of non-negative floats order like the floats themselves, but
/// the CAS loop compares as f32 to stay correct for every input. `max` is
/// commutative and associative, so concurrent merges at triangle-seam pixels
/// land in either order with the same result.
#[inline]
pub fn atomic_max(cell: &AtomicU32, val: f32) {
    let mut current = cell.load(Ordering::Relaxed);
    while val > f32::from_bits(current) {
        match cell.compare_exchange_weak(current, val.to_bits(), Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => break,
            Err(now) => current = now,
        }
    }
}

/// Per-worker single-channel float buffer.
///
/// One line's footprint is built up here (ink → brush → blur), then merged
/// into the shared accumulator through the island's dilated mask and wiped.
/// Invariant: outside `rect` the buffer is zero, so merge-and-clear only has
/// to walk the rectangle.
pub struct Scratch {
    width: usize,
    height: usize,
    buf: Vec<f32>,
    rect: DirtyRect,
}

impl Scratch {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            buf: vec![0.0; width * height],
            rect: DirtyRect::EMPTY,
        }
    }

    #[inline]
    pub fn buf(&self) -> &[f32] {
        &self.buf
    }

    #[inline]
    pub fn rect(&self) -> DirtyRect {
        self.rect
    }

    /// Ink a line's boundary band: Bresenham over the pixel line, each step
    /// writing 1.0 through the edge-aware decorator so staircase gaps along
    /// the island edge get filled without crossing into other islands.
    pub fn ink_edge_aware(
        &mut self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        bitmap: &IslandBitmap,
        mask: u64,
    ) {
        self.rect = DirtyRect::EMPTY;
        self.rect
            .include(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1));
        self.rect.expand(2);

        let (w, h) = (self.width as i32, self.height as i32);
        let (buf, stride) = (&mut self.buf, self.width);
        let bits = bitmap.bits();

        draw_line(x0, y0, x1, y1, &mut |x, y| {
            super::bitmask::plot_edge_aware(x, y, w, h, bits, mask, &mut |px, py| {
                buf[py as usize * stride + px as usize] = 1.0;
            });
        });
    }

    /// Stamp the line's thickness: walk the float line at sub-pixel spacing,
    /// max-blending the brush at every position. The brush is built here and
    /// dropped with the call; it is the only per-line allocation.
    pub fn stamp_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, thickness: f32) {
        let brush = Brush::new(thickness);
        self.rect.include(
            x0.min(x1).floor() as i32,
            y0.min(y1).floor() as i32,
            x0.max(x1).ceil() as i32,
            y0.max(y1).ceil() as i32,
        );
        self.rect.expand(thickness.ceil() as i32 + 1);

        let (w, h) = (self.width as i32, self.height as i32);
        let buf = &mut self.buf;
        let spacing = (thickness / 10.0).max(0.01);

        draw_line_stepped(x0, y0, x1, y1, spacing, &mut |x, y| {
            brush.stamp(x, y, w, h, buf);
        });
    }

    /// Separable Gaussian over the dirty rectangle, vertical then horizontal.
    ///
    /// The rectangle is widened by the kernel radius first so the whole halo
    /// stays inside it and no energy is dropped at the rectangle border. The
    /// vertical pass samples the buffer reflected against the canvas height;
    /// the horizontal pass reflects within the widened rectangle, whose
    /// margin is zero-valued by the scratch invariant.
    pub fn blur(&mut self, blur: f32) {
        if blur <= 0.0 {
            return;
        }

        let kw = kernel_width(blur);
        let kc = (kw / 2) as i32;
        self.rect.expand(kc);

        let area = self.rect.clamped(self.width, self.height);
        if area.is_empty() {
            return;
        }

        let area_w = (area.max_x - area.min_x + 1) as usize;
        let area_h = (area.max_y - area.min_y + 1) as usize;
        let kernel = build_kernel(kw, blur);
        let mut temp = vec![0.0f32; area_w * area_h];

        // Vertical pass into temp.
        for y in 0..area_h {
            for x in 0..area_w {
                let x_real = x as i32 + area.min_x;
                let y_real = y as i32 + area.min_y;
                let mut sum = 0.0;
                for i in -kc..=kc {
                    let sy = reflect(self.height as i32, y_real + i);
                    if sy < 0 || sy >= self.height as i32 {
                        continue; // canvas narrower than the kernel
                    }
                    sum += kernel[(i + kc) as usize] * self.buf[sy as usize * self.width + x_real as usize];
                }
                temp[y * area_w + x] = sum;
            }
        }

        // Horizontal pass back into the scratch.
        for y in 0..area_h {
            for x in 0..area_w {
                let x_real = x as i32 + area.min_x;
                let y_real = y as i32 + area.min_y;
                let mut sum = 0.0;
                for i in -kc..=kc {
                    let sx = reflect(area_w as i32, x as i32 + i);
                    if sx < 0 || sx >= area_w as i32 {
                        continue; // rect narrower than the kernel
                    }
                    sum += kernel[(i + kc) as usize] * temp[y * area_w + sx as usize];
                }
                self.buf[y_real as usize * self.width + x_real as usize] = sum;
            }
        }
    }

    /// Flush into the shared accumulator and wipe.
    ///
    /// Each pixel of the rectangle is gated by the dilated mask — this is
    /// the island-confinement guarantee — scaled by the layer multiplier,
    /// clamped, and max-blended. The scratch is zeroed on the way out and
    /// the rectangle reset, restoring the all-zero-outside-rect invariant.
    pub fn merge_into(
        &mut self,
        accum: &[AtomicU32],
        bitmap: &IslandBitmap,
        mask: u64,
        multiplier: f32,
    ) {
        let area = self.rect.clamped(self.width, self.height);
        if !area.is_empty() {
            let dilated = bitmap.dilated();
            for y in area.min_y..=area.max_y {
                for x in area.min_x..=area.max_x {
                    let idx = y as usize * self.width + x as usize;
                    if dilated[idx] & mask != 0 {
                        let v = (self.buf[idx] * multiplier).clamp(0.0, 1.0);
                        atomic_max(&accum[idx], v);
                    }
                    self.buf[idx] = 0.0;
                }
            }
        }
        self.rect = DirtyRect::EMPTY;
    }
}
