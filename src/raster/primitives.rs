// ============================================================================
// RASTER PRIMITIVES — lines, triangle fill, kernel sampling helpers
// ============================================================================
//
// Every primitive takes a plot closure `(x, y)` instead of writing pixels
// itself. One line loop therefore serves plain inking, bitmap OR-stamping,
// seam sealing and edge-aware inking — the destination and the write rule
// live entirely in the closure.

/// True when (x, y) lies on a w×h grid.
#[inline]
pub fn in_bounds(x: i32, y: i32, w: i32, h: i32) -> bool {
    x >= 0 && x < w && y >= 0 && y < h
}

/// Map a normalized UV coordinate to a pixel index along an axis of `dim`
/// pixels. Float noise can push mesh UVs slightly past [0, 1], so the result
/// is clamped rather than mirrored.
#[inline]
pub fn uv_to_px(u: f32, dim: usize) -> i32 {
    ((u * dim as f32).floor() as i32).clamp(0, dim as i32 - 1)
}

/// Pixel-centered variant used for distance-field seed lines: 0.5 maps to
/// the pixel whose center is nearest, not the cell 0.5 falls into.
#[inline]
pub fn uv_to_px_centered(u: f32, dim: usize) -> i32 {
    ((u * dim as f32 - 0.5).round() as i32).clamp(0, dim as i32 - 1)
}

/// Integer Bresenham line from (x0, y0) to (x1, y1), inclusive of both
/// endpoints. Calls `plot` at every visited pixel; `plot` is responsible for
/// bounds checking.
pub fn draw_line(x0: i32, y0: i32, x1: i32, y1: i32, plot: &mut impl FnMut(i32, i32)) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };

    let mut x = x0;
    let mut y = y0;
    let mut err = dx + dy;

    loop {
        plot(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Walk a float line at fixed `spacing`, calling `stamp` at evenly spaced
/// positions including both endpoints.
///
/// Positions are generated from whichever endpoint is nearer, with an odd
/// step count so there is no middle position to disagree on: the position
/// set for A→B is bitwise identical to B→A, which is what keeps max-blended
/// brush strokes exactly reversible.
pub fn draw_line_stepped(
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    spacing: f32,
    stamp: &mut impl FnMut(f32, f32),
) {
    let dist = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    let mut steps = ((dist / spacing).ceil() as i32).max(1);
    if steps % 2 == 0 {
        steps += 1;
    }
    let dx = (x1 - x0) / steps as f32;
    let dy = (y1 - y0) / steps as f32;

    for i in 0..=steps {
        let j = steps - i;
        if i <= j {
            stamp(x0 + dx * i as f32, y0 + dy * i as f32);
        } else {
            stamp(x1 - dx * j as f32, y1 - dy * j as f32);
        }
    }
}

fn fill_flat_bottom(
    v0: (i32, i32),
    v1: (i32, i32),
    v2: (i32, i32),
    plot: &mut impl FnMut(i32, i32),
) {
    let inv_slope1 = (v1.0 - v0.0) as f32 / (v1.1 - v0.1) as f32;
    let inv_slope2 = (v2.0 - v0.0) as f32 / (v2.1 - v0.1) as f32;

    let mut cx1 = v0.0 as f32;
    let mut cx2 = v0.0 as f32;

    for y in v0.1..=v2.1 {
        draw_line(cx1 as i32, y, cx2 as i32, y, plot);
        cx1 += inv_slope1;
        cx2 += inv_slope2;
    }
}

fn fill_flat_top(v0: (i32, i32), v1: (i32, i32), v2: (i32, i32), plot: &mut impl FnMut(i32, i32)) {
    let inv_slope1 = (v2.0 - v0.0) as f32 / (v2.1 - v0.1) as f32;
    let inv_slope2 = (v2.0 - v1.0) as f32 / (v2.1 - v1.1) as f32;

    let mut cx1 = v2.0 as f32;
    let mut cx2 = v2.0 as f32;

    for y in (v0.1..=v2.1).rev() {
        draw_line(cx1 as i32, y, cx2 as i32, y, plot);
        cx1 -= inv_slope1;
        cx2 -= inv_slope2;
    }
}

/// Solid-fill a triangle by splitting it at the middle vertex into a
/// flat-bottom and a flat-top half, each scanned as horizontal line calls.
/// Zero-height triangles are skipped.
pub fn fill_triangle(
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    plot: &mut impl FnMut(i32, i32),
) {
    if y0 == y1 && y1 == y2 {
        return;
    }

    let mut v = [(x0, y0), (x1, y1), (x2, y2)];
    v.sort_by_key(|p| p.1);

    if v[1].1 == v[2].1 {
        fill_flat_bottom(v[0], v[1], v[2], plot);
    } else if v[0].1 == v[1].1 {
        fill_flat_top(v[0], v[1], v[2], plot);
    } else {
        // Split at the middle vertex's scanline.
        let x3 = (v[0].0 as f32
            + (v[1].1 - v[0].1) as f32 / (v[2].1 - v[0].1) as f32 * (v[2].0 - v[0].0) as f32)
            as i32;
        let y3 = v[1].1;
        fill_flat_bottom(v[0], v[1], (x3, y3), plot);
        fill_flat_top(v[1], (x3, y3), v[2], plot);
    }
}

/// Fan a plot out to the 5-connected cross (center + N/E/S/W). Used to seal
/// single-pixel cracks the triangulator leaves along shared triangle edges.
pub fn plot_plus(x: i32, y: i32, plot: &mut impl FnMut(i32, i32)) {
    const OFFSET_X: [i32; 5] = [0, 0, -1, 1, 0];
    const OFFSET_Y: [i32; 5] = [0, -1, 0, 0, 1];

    for j in 0..5 {
        plot(x + OFFSET_X[j], y + OFFSET_Y[j]);
    }
}

/// Reflect an out-of-range index back across the [0, m) boundary. Mirrors
/// about the boundary between pixels, so index -1 maps to 0 and m to m-1.
#[inline]
pub fn reflect(m: i32, x: i32) -> i32 {
    if x < 0 {
        return -x - 1;
    }
    if x >= m {
        return 2 * m - x - 1;
    }
    x
}

#[inline]
fn gaussian(x: f32, fac: f32) -> f32 {
    1.0 / (2.0 * std::f32::consts::PI).sqrt() * (-2.0 * x * x / (fac * fac)).exp()
}

/// Kernel width for a given blur radius.
#[inline]
pub fn kernel_width(blur: f32) -> usize {
    (blur as usize + 2) * 2 + 1
}

/// Build a centered 1-D Gaussian kernel of width `kw`, normalized to sum 1.
pub fn build_kernel(kw: usize, blur: f32) -> Vec<f32> {
    let kc = (kw / 2) as i32;
    let mut kernel = vec![0.0f32; kw];

    let mut sum = 0.0;
    for (x, k) in kernel.iter_mut().enumerate() {
        let d = gaussian((kc - x as i32) as f32, blur);
        sum += d;
        *k = d;
    }
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}
