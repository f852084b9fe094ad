// ============================================================================
// DISTANCE FIELD — masked wavefront flood from the UV edge lines
// ============================================================================

use rayon::prelude::*;

use crate::canvas::Canvas;
use crate::raster::primitives::{
    draw_line, fill_triangle, in_bounds, plot_plus, uv_to_px, uv_to_px_centered,
};

/// Result of a distance-field bake: grayscale ramp canvas plus the average
/// wavefront depth, a proxy for island thickness used to tune later passes.
pub struct DistanceField {
    pub canvas: Canvas,
    pub average_depth: f32,
}

/// Flood a per-pixel distance (in wavefront steps) from the nearest UV edge
/// line, constrained to the triangulated-UV mask.
///
/// `uv_lines` is a flat `[x0, y0, x1, y1, ...]` sequence of seed lines;
/// `triangles` a flat `[x0, y0, x1, y1, x2, y2, ...]` sequence forming the
/// writable mask. `target` is the intensity floor at the farthest pixel:
/// output runs from 1.0 on a seed down to `target/255` at the deepest point.
/// Empty inputs or a zero-size canvas yield `None`.
pub fn generate_distance_field(
    uv_lines: &[f32],
    triangles: &[f32],
    width: usize,
    height: usize,
    target: u8,
) -> Option<DistanceField> {
    if uv_lines.is_empty() || triangles.is_empty() || width == 0 || height == 0 {
        return None;
    }

    let (wi, hi) = (width as i32, height as i32);

    // Writable-area mask: solid triangles, edges re-traced with the 3x3-plus
    // stamp so the flood cannot slip through cracks between adjacent
    // triangles of one island.
    let mut mask = vec![0u8; width * height];
    {
        let mut set_one = |x: i32, y: i32| {
            if in_bounds(x, y, wi, hi) {
                mask[y as usize * width + x as usize] = 1;
            }
        };
        for tri in triangles.chunks_exact(6) {
            let x0 = uv_to_px(tri[0], width);
            let y0 = uv_to_px(tri[1], height);
            let x1 = uv_to_px(tri[2], width);
            let y1 = uv_to_px(tri[3], height);
            let x2 = uv_to_px(tri[4], width);
            let y2 = uv_to_px(tri[5], height);

            fill_triangle(x0, y0, x1, y1, x2, y2, &mut set_one);
            for (ax, ay, bx, by) in [(x0, y0, x1, y1), (x1, y1, x2, y2), (x2, y2, x0, y0)] {
                draw_line(ax, ay, bx, by, &mut |x, y| plot_plus(x, y, &mut set_one));
            }
        }
    }

    // Seed plane: the edge lines themselves, pixel-centered.
    let mut seeds = vec![0u8; width * height];
    {
        let mut set_one = |x: i32, y: i32| {
            if in_bounds(x, y, wi, hi) {
                seeds[y as usize * width + x as usize] = 1;
            }
        };
        for line in uv_lines.chunks_exact(4) {
            let x0 = uv_to_px_centered(line[0], width);
            let y0 = uv_to_px_centered(line[1], height);
            let x1 = uv_to_px_centered(line[2], width);
            let y1 = uv_to_px_centered(line[3], height);
            draw_line(x0, y0, x1, y1, &mut set_one);
        }
    }

    let mut seen = vec![false; width * height];
    let mut map = vec![0i16; width * height];

    let mut open: Vec<(i16, i16)> = Vec::new();
    let mut swap: Vec<(i16, i16)> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if seeds[y * width + x] != 0 {
                seen[y * width + x] = true;
                open.push((x as i16, y as i16));
            }
        }
    }

    // Wavefront BFS, 8-connected, double-buffered. The depth counter only
    // advances once the previous round actually expanded into masked area,
    // so seed pixels that fall slightly outside their triangles do not count
    // as a step.
    let mut current: i32 = 0;
    let mut seen_any = true;
    let mut dist_sum: u64 = 0;
    let mut dist_pixels: u64 = 0;

    while !open.is_empty() {
        if seen_any {
            current += 1;
            seen_any = false;
        }
        dist_sum += current as u64 * open.len() as u64;
        dist_pixels += open.len() as u64;

        swap.clear();
        for &(xx, yy) in &open {
            for j in 0..9usize {
                let ox = xx as i32 + (j % 3) as i32 - 1;
                let oy = yy as i32 + (j / 3) as i32 - 1;
                if !in_bounds(ox, oy, wi, hi) {
                    continue;
                }
                let idx = oy as usize * width + ox as usize;
                if seen[idx] || mask[idx] == 0 {
                    continue;
                }
                seen_any = true;
                map[idx] = current as i16;
                seen[idx] = true;
                swap.push((ox as i16, oy as i16));
            }
        }
        std::mem::swap(&mut open, &mut swap);
    }

    // The counter runs one past the deepest recorded step (the final round
    // expands nothing); normalize by the depth actually reached so the
    // farthest pixel lands exactly on `target`.
    let depth = (current - 1).max(1);
    let pixel_diff = (255 - target as i32) as f32 / 255.0 / depth as f32;

    let mut canvas = Canvas::new(width, height);
    canvas
        .data_mut()
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let val = 1.0 - pixel_diff * map[y * width + x] as f32;
                row[x * 4..x * 4 + 4].copy_from_slice(&[val, val, val, 1.0]);
            }
        });

    let average_depth = if dist_pixels == 0 {
        0.0
    } else {
        dist_sum as f32 / dist_pixels as f32 * 4.0
    };

    Some(DistanceField {
        canvas,
        average_depth,
    })
}
