use rayon::prelude::*;

use super::primitives::{draw_line, fill_triangle, in_bounds, plot_plus, uv_to_px};
use crate::geometry::IslandMesh;

/// Per-pixel island membership for one batch of up to 64 islands.
///
/// `bits[p]` has bit *b* set when pixel *p* lies inside island *b* of the
/// batch; `dilated[p]` additionally grants each island a one-pixel bleed ring
/// into unoccupied pixels. The dilated plane is the merge gate: a line may
/// only land ink on pixels whose dilated word carries its island's bit.
pub struct IslandBitmap {
    width: usize,
    height: usize,
    bits: Vec<u64>,
    dilated: Vec<u64>,
}

impl IslandBitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![0; width * height],
            dilated: vec![0; width * height],
        }
    }

    #[inline]
    pub fn bits(&self) -> &[u64] {
        &self.bits
    }

    #[inline]
    pub fn dilated(&self) -> &[u64] {
        &self.dilated
    }

    /// Rasterize one batch of islands. Island `b` of the slice owns bit `b`.
    ///
    /// Each triangle is solid-filled, then its three edges are re-traced with
    /// a 3×3-plus stamp: the triangulator leaves single-pixel cracks along
    /// shared triangle edges, and an unsealed crack lets the distance-field
    /// flood escape the island.
    pub fn build(&mut self, islands: &[IslandMesh]) {
        assert!(islands.len() <= 64, "a batch holds at most 64 islands");
        self.bits.fill(0);

        let (w, h) = (self.width, self.height);
        let (wi, hi) = (w as i32, h as i32);

        for (b, island) in islands.iter().enumerate() {
            let mask = 1u64 << b;
            let bits = &mut self.bits;
            let mut or_bit = |x: i32, y: i32| {
                if in_bounds(x, y, wi, hi) {
                    bits[y as usize * w + x as usize] |= mask;
                }
            };

            for tri in island.triangles.chunks_exact(6) {
                let x0 = uv_to_px(tri[0], w);
                let y0 = uv_to_px(tri[1], h);
                let x1 = uv_to_px(tri[2], w);
                let y1 = uv_to_px(tri[3], h);
                let x2 = uv_to_px(tri[4], w);
                let y2 = uv_to_px(tri[5], h);

                fill_triangle(x0, y0, x1, y1, x2, y2, &mut or_bit);
                for (ax, ay, bx, by) in [(x0, y0, x1, y1), (x1, y1, x2, y2), (x2, y2, x0, y0)] {
                    draw_line(ax, ay, bx, by, &mut |x, y| plot_plus(x, y, &mut or_bit));
                }
            }
        }

        self.dilate();
    }

    /// `dilated[p]` = `bits[p]` when occupied, else the OR of the 8 neighbors.
    /// Bleed only reaches outward into empty pixels; occupied pixels never
    /// pick up foreign bits here.
    fn dilate(&mut self) {
        let (w, h) = (self.width, self.height);
        let (wi, hi) = (w as i32, h as i32);
        let bits = &self.bits;

        self.dilated
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let own = bits[y * w + x];
                    if own != 0 {
                        *out = own;
                        continue;
                    }
                    let mut val = 0u64;
                    for j in 0..9usize {
                        let ox = x as i32 + (j % 3) as i32 - 1;
                        let oy = y as i32 + (j / 3) as i32 - 1;
                        if in_bounds(ox, oy, wi, hi) {
                            val |= bits[oy as usize * w + ox as usize];
                        }
                    }
                    *out = val;
                }
            });
    }
}

/// Edge-aware plot decorator for line inking.
///
/// For each cardinal neighbor `n` of the Bresenham pixel, write through to
/// `n` when `n` carries no foreign island bits and at least one of `n`'s own
/// cardinal neighbors falls off-canvas or outside the owning island. The
/// result is an inked band hugging the island boundary from the inside,
/// filling the staircase gaps a plain line leaves along diagonal edges
/// without ever bleeding across a seam into a neighboring island.
pub fn plot_edge_aware(
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    bits: &[u64],
    mask: u64,
    write: &mut impl FnMut(i32, i32),
) {
    const OFFSET_X: [i32; 4] = [0, -1, 1, 0];
    const OFFSET_Y: [i32; 4] = [-1, 0, 0, 1];

    for j in 0..4 {
        let nx = x + OFFSET_X[j];
        let ny = y + OFFSET_Y[j];
        if !in_bounds(nx, ny, w, h) {
            continue;
        }
        if bits[ny as usize * w as usize + nx as usize] & !mask != 0 {
            continue; // belongs to (or borders) another island
        }

        for k in 0..4 {
            let nx2 = nx + OFFSET_X[k];
            let ny2 = ny + OFFSET_Y[k];
            let outside = !in_bounds(nx2, ny2, w, h)
                || bits[ny2 as usize * w as usize + nx2 as usize] & mask == 0;
            if outside {
                write(nx, ny);
                break;
            }
        }
    }
}
