// ============================================================================
// GPU TEXTURE DECODERS — raw format bytes → normalized float canvas
// ============================================================================
//
// All formats decode with a Y flip (GPU textures store bottom row first) and
// parallelize over output rows. DXT palettes are rebuilt per output row
// instead of per block; the endpoint math is a handful of operations and
// redoing it 4× keeps the row decode self-contained.

use rayon::prelude::*;

use crate::canvas::Canvas;

/// Source texture format, by the exporter's numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8888,
    Rgbx8888,
    Bgra8888,
    Dxt1,
    Dxt5,
    R8,
}

impl TextureFormat {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Rgba8888),
            2 => Some(Self::Rgbx8888),
            3 => Some(Self::Bgra8888),
            4 => Some(Self::Dxt1),
            6 => Some(Self::Dxt5),
            13 => Some(Self::R8),
            _ => None,
        }
    }

    /// Source bytes required for a width×height image.
    fn byte_len(&self, width: usize, height: usize) -> usize {
        match self {
            Self::Rgba8888 | Self::Rgbx8888 | Self::Bgra8888 => width * height * 4,
            Self::R8 => width * height,
            Self::Dxt1 => width.div_ceil(4) * height.div_ceil(4) * 8,
            Self::Dxt5 => width.div_ceil(4) * height.div_ceil(4) * 16,
        }
    }
}

/// Expand an RGB565 word to normalized floats, replicating the high bits
/// into the low ones so full-intensity endpoints decode to exactly 1.0.
#[inline]
fn rgb565_to_f32(c: u16) -> [f32; 3] {
    let r5 = (c >> 11) & 0x1f;
    let g6 = (c >> 5) & 0x3f;
    let b5 = c & 0x1f;
    [
        ((r5 << 3) | (r5 >> 2)) as f32 / 255.0,
        ((g6 << 2) | (g6 >> 4)) as f32 / 255.0,
        ((b5 << 3) | (b5 >> 2)) as f32 / 255.0,
    ]
}

/// Decode a DXT color block header (two RGB565 endpoints) into the 4-entry
/// palette. `c0 > c1` selects the two-interpolant mode; otherwise entry 2 is
/// the midpoint and entry 3 is transparent black (the 1-bit-alpha
/// convention).
fn dxt_color_palette(block: &[u8]) -> [[f32; 3]; 4] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let p0 = rgb565_to_f32(c0);
    let p1 = rgb565_to_f32(c1);

    let (p2, p3) = if c0 > c1 {
        (
            [
                (2.0 * p0[0] + p1[0]) / 3.0,
                (2.0 * p0[1] + p1[1]) / 3.0,
                (2.0 * p0[2] + p1[2]) / 3.0,
            ],
            [
                (p0[0] + 2.0 * p1[0]) / 3.0,
                (p0[1] + 2.0 * p1[1]) / 3.0,
                (p0[2] + 2.0 * p1[2]) / 3.0,
            ],
        )
    } else {
        (
            [
                (p0[0] + p1[0]) / 2.0,
                (p0[1] + p1[1]) / 2.0,
                (p0[2] + p1[2]) / 2.0,
            ],
            [0.0, 0.0, 0.0],
        )
    };
    [p0, p1, p2, p3]
}

/// Decode a DXT5 alpha block header into the 8-entry ramp plus the 48 bits
/// of 3-bit texel indices.
fn dxt5_alpha_ramp(block: &[u8]) -> ([f32; 8], u64) {
    let a0 = block[0] as f32;
    let a1 = block[1] as f32;

    let mut ramp = [0.0f32; 8];
    ramp[0] = a0;
    ramp[1] = a1;
    if a0 > a1 {
        for i in 1..7 {
            ramp[i + 1] = ((7 - i) as f32 * a0 + i as f32 * a1) / 7.0;
        }
    } else {
        for i in 1..5 {
            ramp[i + 1] = ((5 - i) as f32 * a0 + i as f32 * a1) / 5.0;
        }
        ramp[6] = 0.0;
        ramp[7] = 255.0;
    }
    for a in &mut ramp {
        *a /= 255.0;
    }

    let mut bits = 0u64;
    for i in 0..6 {
        bits |= (block[2 + i] as u64) << (i * 8);
    }
    (ramp, bits)
}

/// Decode raw texture bytes into a normalized RGBA float canvas, flipping Y.
pub fn decode_texture(
    data: &[u8],
    width: usize,
    height: usize,
    format: TextureFormat,
) -> Result<Canvas, String> {
    let needed = format.byte_len(width, height);
    if data.len() < needed {
        return Err(format!(
            "{format:?} texture needs {needed} bytes for {width}x{height}, got {}",
            data.len()
        ));
    }

    let mut canvas = Canvas::new(width, height);
    canvas
        .data_mut()
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = height - 1 - y; // Y flip: output row y reads source row sy
            match format {
                TextureFormat::Rgba8888 => {
                    let src = &data[sy * width * 4..(sy + 1) * width * 4];
                    for (out, &b) in row.iter_mut().zip(src) {
                        *out = b as f32 / 255.0;
                    }
                }
                TextureFormat::Rgbx8888 => {
                    let src = &data[sy * width * 4..(sy + 1) * width * 4];
                    for x in 0..width {
                        row[x * 4] = src[x * 4] as f32 / 255.0;
                        row[x * 4 + 1] = src[x * 4 + 1] as f32 / 255.0;
                        row[x * 4 + 2] = src[x * 4 + 2] as f32 / 255.0;
                        row[x * 4 + 3] = 1.0;
                    }
                }
                TextureFormat::Bgra8888 => {
                    let src = &data[sy * width * 4..(sy + 1) * width * 4];
                    for x in 0..width {
                        row[x * 4] = src[x * 4 + 2] as f32 / 255.0;
                        row[x * 4 + 1] = src[x * 4 + 1] as f32 / 255.0;
                        row[x * 4 + 2] = src[x * 4] as f32 / 255.0;
                        row[x * 4 + 3] = src[x * 4 + 3] as f32 / 255.0;
                    }
                }
                TextureFormat::R8 => {
                    let src = &data[sy * width..(sy + 1) * width];
                    for x in 0..width {
                        row[x * 4] = src[x] as f32 / 255.0;
                        row[x * 4 + 1] = 0.0;
                        row[x * 4 + 2] = 0.0;
                        row[x * 4 + 3] = 1.0;
                    }
                }
                TextureFormat::Dxt1 => {
                    let blocks_x = width.div_ceil(4);
                    let by = sy / 4;
                    let ry = sy % 4;
                    for bx in 0..blocks_x {
                        let block = &data[(by * blocks_x + bx) * 8..];
                        let palette = dxt_color_palette(block);
                        let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
                        for xx in 0..4 {
                            let x = bx * 4 + xx;
                            if x >= width {
                                break;
                            }
                            let idx = (indices >> (2 * (ry * 4 + xx))) & 0b11;
                            let col = palette[idx as usize];
                            row[x * 4..x * 4 + 4].copy_from_slice(&[col[0], col[1], col[2], 1.0]);
                        }
                    }
                }
                TextureFormat::Dxt5 => {
                    let blocks_x = width.div_ceil(4);
                    let by = sy / 4;
                    let ry = sy % 4;
                    for bx in 0..blocks_x {
                        let block = &data[(by * blocks_x + bx) * 16..];
                        let (ramp, alpha_bits) = dxt5_alpha_ramp(&block[..8]);
                        let palette = dxt_color_palette(&block[8..]);
                        let indices =
                            u32::from_le_bytes([block[12], block[13], block[14], block[15]]);
                        for xx in 0..4 {
                            let x = bx * 4 + xx;
                            if x >= width {
                                break;
                            }
                            let texel = ry * 4 + xx;
                            let idx = (indices >> (2 * texel)) & 0b11;
                            let col = palette[idx as usize];
                            let a = ramp[((alpha_bits >> (3 * texel)) & 0b111) as usize];
                            row[x * 4..x * 4 + 4].copy_from_slice(&[col[0], col[1], col[2], a]);
                        }
                    }
                }
            }
        });

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_codes_are_rejected() {
        assert_eq!(TextureFormat::from_code(1), Some(TextureFormat::Rgba8888));
        assert_eq!(TextureFormat::from_code(13), Some(TextureFormat::R8));
        assert_eq!(TextureFormat::from_code(5), None);
        assert_eq!(TextureFormat::from_code(0), None);
    }

    #[test]
    fn short_buffer_is_an_error() {
        assert!(decode_texture(&[0u8; 15], 2, 2, TextureFormat::Rgba8888).is_err());
        assert!(decode_texture(&[0u8; 7], 4, 4, TextureFormat::Dxt1).is_err());
    }

    #[test]
    fn rgba8888_flips_and_round_trips() {
        // 2×2: distinct corner values so the flip is visible.
        #[rustfmt::skip]
        let src: Vec<u8> = vec![
            10, 20, 30, 40,   50, 60, 70, 80,      // source row 0 (bottom after flip)
            90, 100, 110, 120, 130, 140, 150, 160, // source row 1 (top after flip)
        ];
        let canvas = decode_texture(&src, 2, 2, TextureFormat::Rgba8888).unwrap();
        assert_eq!(canvas.get(0, 0), [90.0 / 255.0, 100.0 / 255.0, 110.0 / 255.0, 120.0 / 255.0]);
        assert_eq!(canvas.get(0, 1), [10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0, 40.0 / 255.0]);

        // Re-encode trivially (inverse flip + denormalize): bit-identical.
        let mut encoded = vec![0u8; src.len()];
        for y in 0..2 {
            for x in 0..2 {
                let px = canvas.get(x, y);
                let o = ((1 - y) * 2 + x) * 4;
                for c in 0..4 {
                    encoded[o + c] = (px[c] * 255.0).round() as u8;
                }
            }
        }
        assert_eq!(encoded, src);
    }

    #[test]
    fn rgbx_forces_opaque_alpha() {
        let src = vec![10u8, 20, 30, 40];
        let canvas = decode_texture(&src, 1, 1, TextureFormat::Rgbx8888).unwrap();
        assert_eq!(canvas.get(0, 0)[3], 1.0);
        assert_eq!(canvas.get(0, 0)[0], 10.0 / 255.0);
    }

    #[test]
    fn bgra_swaps_channels() {
        let src = vec![200u8, 100, 50, 255];
        let canvas = decode_texture(&src, 1, 1, TextureFormat::Bgra8888).unwrap();
        let px = canvas.get(0, 0);
        assert_eq!(px[0], 50.0 / 255.0); // R came from byte 2
        assert_eq!(px[2], 200.0 / 255.0); // B came from byte 0
    }

    #[test]
    fn r8_fills_red_only() {
        let src = vec![128u8, 255, 0, 64];
        let canvas = decode_texture(&src, 2, 2, TextureFormat::R8).unwrap();
        let px = canvas.get(1, 0); // source row 1, x 1 → value 64
        assert_eq!(px, [64.0 / 255.0, 0.0, 0.0, 1.0]);
        assert_eq!(canvas.get(1, 1)[0], 1.0); // source row 0, x 1 → 255
    }

    #[test]
    fn dxt1_solid_red_block() {
        // c0 = 0xF800 (pure red), c1 = 0, all indices 0.
        let block = [0x00u8, 0xF8, 0x00, 0x00, 0, 0, 0, 0];
        let canvas = decode_texture(&block, 4, 4, TextureFormat::Dxt1).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.get(x, y), [1.0, 0.0, 0.0, 1.0], "({x},{y})");
            }
        }
    }

    #[test]
    fn dxt1_low_endpoint_mode_uses_midpoint_and_black() {
        // c0 <= c1 selects midpoint mode; index 3 is black.
        // Indices: texel 0 uses 2 (midpoint), texel 1 uses 3, rest 0.
        let block = [0x00u8, 0x00, 0x00, 0xF8, 0b1110, 0, 0, 0];
        let canvas = decode_texture(&block, 4, 4, TextureFormat::Dxt1).unwrap();
        // Texel (0,0) of the block is source row 0 → output row 3.
        assert_eq!(canvas.get(0, 3), [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(canvas.get(1, 3), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(canvas.get(2, 3), [0.0, 0.0, 0.0, 1.0]); // index 0 = c0 = black
    }

    #[test]
    fn dxt5_alpha_ramps() {
        // a0 = 255, a1 = 0 → 7-step interpolation. Alpha indices: texel 0
        // uses entry 0 (255), texel 1 entry 1 (0), texel 2 entry 2 (≈ 6/7).
        let mut block = [0u8; 16];
        block[0] = 255;
        block[1] = 0;
        block[2] = 0b10_001_000; // 3-bit indices for texels 0..2 (LSB first)
        // Color: solid c0 = white.
        block[8] = 0xFF;
        block[9] = 0xFF;
        block[10] = 0x00;
        block[11] = 0x00;
        let canvas = decode_texture(&block, 4, 4, TextureFormat::Dxt5).unwrap();
        assert_eq!(canvas.get(0, 3)[3], 1.0);
        assert_eq!(canvas.get(1, 3)[3], 0.0);
        let a2 = canvas.get(2, 3)[3];
        assert!((a2 - (6.0 * 255.0 / 7.0) / 255.0).abs() < 1e-5, "a2 {a2}");
    }

    #[test]
    fn dxt5_low_alpha_mode_has_hard_extremes() {
        let (ramp, _) = dxt5_alpha_ramp(&[10, 200, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ramp[6], 0.0);
        assert_eq!(ramp[7], 1.0);
        assert!((ramp[2] - (4.0 * 10.0 + 200.0) / 5.0 / 255.0).abs() < 1e-6);
    }
}
