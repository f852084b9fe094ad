// ============================================================================
// FINAL COMPOSITE — diffuse × AO × soft-light(edges) × distance alpha
// ============================================================================

use rayon::prelude::*;

use crate::canvas::Canvas;

/// sRGB → linear, standard piecewise curve.
#[inline]
pub fn to_linear(f: f32) -> f32 {
    if f <= 0.04045 {
        f / 12.92
    } else {
        ((f + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear → sRGB, standard piecewise curve.
#[inline]
pub fn to_srgb(f: f32) -> f32 {
    if f <= 0.0031308 {
        f * 12.92
    } else {
        1.055 * f.powf(1.0 / 2.4) - 0.055
    }
}

/// Soft-light one channel of `base` by `edge`: at e = 0.5 the base passes
/// through unchanged, lower darkens toward base², higher lightens.
#[inline]
fn soft_light(base: f32, edge: f32) -> f32 {
    (1.0 - 2.0 * edge) * base * base + 2.0 * edge * base
}

/// Fold the four baked layers into the final output map.
///
/// Per pixel: soft-light the diffuse by the edge highlight (weighted by the
/// highlight's alpha), multiply by AO raised to `multiply_count`, and carry
/// the linearized distance-field intensity in the output alpha.
pub fn composite_final(
    diffuse: &Canvas,
    ao: &Canvas,
    edge_highlight: &Canvas,
    distance_field: &Canvas,
    multiply_count: i32,
) -> Result<Canvas, String> {
    let (w, h) = (diffuse.width(), diffuse.height());
    for (name, c) in [
        ("ao", ao),
        ("edge highlight", edge_highlight),
        ("distance field", distance_field),
    ] {
        if c.width() != w || c.height() != h {
            return Err(format!(
                "{name} layer is {}x{}, expected {w}x{h}",
                c.width(),
                c.height()
            ));
        }
    }

    let mut out = Canvas::new(w, h);
    let diffuse = diffuse.data();
    let ao = ao.data();
    let edge = edge_highlight.data();
    let dist = distance_field.data();

    out.data_mut()
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let i = (y * w + x) * 4;
                let o = x * 4;

                // Distance field is grayscale; red carries it.
                let d = to_linear(dist[i]);

                let ea = edge[i + 3];
                for c in 0..3 {
                    let base = diffuse[i + c];
                    let lit = soft_light(base, edge[i + c]);
                    let blended = lit * ea + base * (1.0 - ea);
                    row[o + c] = blended * ao[i + c].powi(multiply_count);
                }
                row[o + 3] = d;
            }
        });

    Ok(out)
}
