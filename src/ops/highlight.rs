// ============================================================================
// EDGE HIGHLIGHTS — island-aware line rasterization onto a shared canvas
// ============================================================================
//
// Islands are processed in batches of 64 so a single u64 per pixel can hold
// the whole batch's membership. Per batch: build the island bitmap once,
// then fan the batch's islands out across the worker pool. Each worker draws
// whole lines serially into its own scratch buffer and merges after every
// line, so the only cross-worker mutation is the atomic max-blend into the
// accumulator.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::canvas::Canvas;
use crate::geometry::{IslandLines, IslandMesh, LineRecord, parse_island_lines, parse_islands};
use crate::raster::bitmask::IslandBitmap;
use crate::raster::primitives::{fill_triangle, uv_to_px};
use crate::raster::scratch::Scratch;

/// Islands per bitmap generation; one bit of the per-pixel word each.
pub const BATCH_SIZE: usize = 64;

/// Bake the edge-highlight layer from packed geometry streams.
///
/// `line_layers` are the three per-layer packed line streams (every island
/// appears in each, possibly with zero lines); `islands` is the packed
/// triangulated-UV stream. The returned canvas is white with the line
/// intensity in alpha.
pub fn generate_edge_highlights(
    line_layers: [&[f32]; 3],
    islands: &[f32],
    multipliers: [f32; 3],
    num_islands: usize,
    width: usize,
    height: usize,
) -> Result<Canvas, String> {
    let layers = [
        parse_island_lines(line_layers[0], num_islands)?,
        parse_island_lines(line_layers[1], num_islands)?,
        parse_island_lines(line_layers[2], num_islands)?,
    ];
    let meshes = parse_islands(islands, num_islands)?;
    Ok(generate_edge_highlights_parsed(
        &layers,
        &meshes,
        multipliers,
        width,
        height,
    ))
}

/// Same bake over already-parsed geometry.
pub fn generate_edge_highlights_parsed(
    layers: &[Vec<IslandLines>; 3],
    meshes: &[IslandMesh],
    multipliers: [f32; 3],
    width: usize,
    height: usize,
) -> Canvas {
    if width == 0 || height == 0 {
        return Canvas::new(width, height);
    }
    for layer in layers {
        assert_eq!(layer.len(), meshes.len(), "one line entry per island per layer");
    }

    // One accumulator cell per pixel, one scratch per pool thread, one
    // bitmap reused across batches. Nothing else allocates per line except
    // the brush stamp.
    let accum: Vec<AtomicU32> = (0..width * height).map(|_| AtomicU32::new(0)).collect();
    let mut bitmap = IslandBitmap::new(width, height);
    let scratch_pool: Vec<Mutex<Scratch>> = (0..rayon::current_num_threads())
        .map(|_| Mutex::new(Scratch::new(width, height)))
        .collect();

    let num_islands = meshes.len();
    for start in (0..num_islands).step_by(BATCH_SIZE) {
        let end = (start + BATCH_SIZE).min(num_islands);
        bitmap.build(&meshes[start..end]);

        let bitmap_ref = &bitmap;
        let accum_ref = &accum;
        (start..end).into_par_iter().for_each(|k| {
            // Each pool thread owns one slot; the lock is uncontended.
            let slot = rayon::current_thread_index().unwrap_or(0) % scratch_pool.len();
            let mut scratch = scratch_pool[slot].lock().unwrap();
            for (layer, &multiplier) in layers.iter().zip(&multipliers) {
                draw_island_lines(
                    &layer[k],
                    bitmap_ref,
                    accum_ref,
                    &mut scratch,
                    multiplier,
                    width,
                    height,
                );
            }
        });
    }

    assemble(&accum, width, height)
}

fn draw_island_lines(
    lines: &IslandLines,
    bitmap: &IslandBitmap,
    accum: &[AtomicU32],
    scratch: &mut Scratch,
    multiplier: f32,
    width: usize,
    height: usize,
) {
    let mask = 1u64 << lines.mask_bit;
    for line in lines.lines {
        draw_line_footprint(line, bitmap, mask, scratch, width, height);
        scratch.merge_into(accum, bitmap, mask, multiplier);
    }
}

/// The per-line pipeline: edge-aware ink, thickness stamp, optional blur.
/// The merge afterwards is what confines all of it to the owning island.
fn draw_line_footprint(
    line: &LineRecord,
    bitmap: &IslandBitmap,
    mask: u64,
    scratch: &mut Scratch,
    width: usize,
    height: usize,
) {
    let x0 = uv_to_px(line.x_start, width);
    let y0 = uv_to_px(line.y_start, height);
    let x1 = uv_to_px(line.x_end, width);
    let y1 = uv_to_px(line.y_end, height);
    scratch.ink_edge_aware(x0, y0, x1, y1, bitmap, mask);

    scratch.stamp_line(
        line.x_start * width as f32,
        line.y_start * height as f32,
        line.x_end * width as f32,
        line.y_end * height as f32,
        line.thickness,
    );

    scratch.blur(line.blur);
}

/// Intensity plane → output canvas: hard-coded white, intensity in alpha.
fn assemble(accum: &[AtomicU32], width: usize, height: usize) -> Canvas {
    let mut canvas = Canvas::new(width, height);
    canvas
        .data_mut()
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let a = f32::from_bits(accum[y * width + x].load(Ordering::Relaxed));
                row[x * 4..x * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, a]);
            }
        });
    canvas
}

/// Debug view: solid-white rasterization of a range of islands' triangles,
/// no lines and no masking. Handy for eyeballing UV coverage.
pub fn render_island_coverage(
    islands: &[f32],
    num_islands: usize,
    width: usize,
    height: usize,
) -> Result<Canvas, String> {
    let meshes = parse_islands(islands, num_islands)?;
    let mut canvas = Canvas::new(width, height);
    if width == 0 || height == 0 {
        return Ok(canvas);
    }
    let (wi, hi) = (width as i32, height as i32);
    let data = canvas.data_mut();

    for mesh in &meshes {
        for tri in mesh.triangles.chunks_exact(6) {
            let x0 = uv_to_px(tri[0], width);
            let y0 = uv_to_px(tri[1], height);
            let x1 = uv_to_px(tri[2], width);
            let y1 = uv_to_px(tri[3], height);
            let x2 = uv_to_px(tri[4], width);
            let y2 = uv_to_px(tri[5], height);
            fill_triangle(x0, y0, x1, y1, x2, y2, &mut |x, y| {
                if crate::raster::primitives::in_bounds(x, y, wi, hi) {
                    let i = (y as usize * width + x as usize) * 4;
                    data[i..i + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
                }
            });
        }
    }
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Packed stream builders used across the tests.
    fn line_stream(entries: &[(u32, &[[f32; 6]])]) -> Vec<f32> {
        let mut out = Vec::new();
        for (mask_bit, lines) in entries {
            out.push(lines.len() as f32);
            out.push(*mask_bit as f32);
            for l in *lines {
                out.extend_from_slice(l);
            }
        }
        out
    }

    fn island_stream(islands: &[&[f32]]) -> Vec<f32> {
        let mut out = Vec::new();
        for tris in islands {
            out.push((tris.len() / 6) as f32);
            out.extend_from_slice(tris);
        }
        out
    }

    fn alpha(canvas: &Canvas, x: usize, y: usize) -> f32 {
        canvas.get(x, y)[3]
    }

    #[test]
    fn single_triangle_single_edge_no_blur() {
        // 8×8 canvas, right triangle hugging the top-left corner, one
        // thickness-1 line along its top edge.
        let islands = island_stream(&[&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]]);
        let lines = line_stream(&[(0, &[[0.0, 0.0, 1.0, 0.0, 1.0, 0.0]])]);
        let empty = line_stream(&[(0, &[])]);

        let canvas = generate_edge_highlights(
            [&lines, &empty, &empty],
            &islands,
            [1.0, 1.0, 1.0],
            1,
            8,
            8,
        )
        .unwrap();

        // The whole top row is inked at full intensity.
        for x in 0..8 {
            assert_eq!(alpha(&canvas, x, 0), 1.0, "({x},0)");
        }
        // The edge-aware band also fills the two boundary corners of row 1
        // (left canvas edge and the diagonal step); everything else is dark.
        for y in 1..8 {
            for x in 0..8 {
                let expect = if y == 1 && (x == 0 || x == 7) { 1.0 } else { 0.0 };
                assert_eq!(alpha(&canvas, x, y), expect, "({x},{y})");
            }
        }
    }

    #[test]
    fn multiplier_scales_and_clamps() {
        let islands = island_stream(&[&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]]);
        let lines = line_stream(&[(0, &[[0.0, 0.0, 1.0, 0.0, 1.0, 0.0]])]);
        let empty = line_stream(&[(0, &[])]);

        let half = generate_edge_highlights(
            [&lines, &empty, &empty],
            &islands,
            [0.5, 1.0, 1.0],
            1,
            8,
            8,
        )
        .unwrap();
        assert_eq!(alpha(&half, 3, 0), 0.5);

        let hot = generate_edge_highlights(
            [&lines, &empty, &empty],
            &islands,
            [3.0, 1.0, 1.0],
            1,
            8,
            8,
        )
        .unwrap();
        assert_eq!(alpha(&hot, 3, 0), 1.0);
    }

    #[test]
    fn line_reversal_is_pixel_identical() {
        // Thickness 3.5, fractional: the stepped line visits the same
        // position set in either direction, so the canvases match exactly.
        let islands = island_stream(&[&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]]);
        let fwd_lines = line_stream(&[(0, &[[0.0, 0.5, 1.0, 0.5, 3.5, 0.0]])]);
        let rev_lines = line_stream(&[(0, &[[1.0, 0.5, 0.0, 0.5, 3.5, 0.0]])]);
        let empty = line_stream(&[(0, &[])]);

        let fwd = generate_edge_highlights(
            [&fwd_lines, &empty, &empty],
            &islands,
            [1.0, 1.0, 1.0],
            1,
            8,
            8,
        )
        .unwrap();
        let rev = generate_edge_highlights(
            [&rev_lines, &empty, &empty],
            &islands,
            [1.0, 1.0, 1.0],
            1,
            8,
            8,
        )
        .unwrap();
        assert_eq!(fwd.data(), rev.data());
    }

    #[test]
    fn zero_length_line_writes_one_inked_pixel() {
        // Full-square island, degenerate line in the interior: the edge-aware
        // pass finds no boundary and the thickness-1 brush lights exactly the
        // line's own pixel.
        let islands = island_stream(&[&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]]);
        let lines = line_stream(&[(0, &[[0.5, 0.5, 0.5, 0.5, 1.0, 0.0]])]);
        let empty = line_stream(&[(0, &[])]);

        let canvas = generate_edge_highlights(
            [&lines, &empty, &empty],
            &islands,
            [1.0, 1.0, 1.0],
            1,
            16,
            16,
        )
        .unwrap();

        let mut lit = Vec::new();
        for y in 0..16 {
            for x in 0..16 {
                if alpha(&canvas, x, y) > 0.0 {
                    lit.push((x, y, alpha(&canvas, x, y)));
                }
            }
        }
        assert_eq!(lit, vec![(8, 8, 1.0)]);
    }

    #[test]
    fn empty_inputs_produce_a_blank_layer() {
        let canvas =
            generate_edge_highlights([&[], &[], &[]], &[], [1.0; 3], 0, 8, 8).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(alpha(&canvas, x, y), 0.0);
            }
        }
    }

    #[test]
    fn coverage_preview_fills_triangles_only() {
        let islands = island_stream(&[&[0.0, 0.0, 0.5, 0.0, 0.0, 0.5]]);
        let canvas = render_island_coverage(&islands, 1, 16, 16).unwrap();
        assert_eq!(canvas.get(0, 0), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(canvas.get(15, 15), [0.0, 0.0, 0.0, 0.0]);
    }
}
