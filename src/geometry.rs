// ============================================================================
// PACKED GEOMETRY STREAMS — line layers and triangulated UV islands
// ============================================================================
//
// The exporter hands us flat little-endian f32 sequences. Per island, a line
// stream holds `[count, mask_bit, 6 floats per line ...]` and a triangle
// stream holds `[tri_count, 6 floats per triangle ...]`. Counts are floats
// and get rounded; the records themselves are viewed in place through
// bytemuck rather than copied out.

use bytemuck::{Pod, Zeroable};

/// One UV edge line: endpoints in normalized UV, thickness and blur in
/// pixels. Matches the packed on-disk layout field for field.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LineRecord {
    pub x_start: f32,
    pub y_start: f32,
    pub x_end: f32,
    pub y_end: f32,
    pub thickness: f32,
    pub blur: f32,
}

/// The lines one island contributes to one layer, plus the island's bit
/// index within its batch of 64.
pub struct IslandLines<'a> {
    pub mask_bit: u32,
    pub lines: &'a [LineRecord],
}

/// One island's triangulated UVs: six floats (three UV pairs) per triangle.
pub struct IslandMesh<'a> {
    pub triangles: &'a [f32],
}

impl IslandMesh<'_> {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 6
    }
}

#[inline]
fn take_count(data: &[f32], idx: usize, what: &str) -> Result<usize, String> {
    match data.get(idx) {
        Some(&v) if v >= 0.0 => Ok((v + 0.5) as usize),
        Some(&v) => Err(format!("negative {what} count {v} at offset {idx}")),
        None => Err(format!("{what} stream truncated at offset {idx}")),
    }
}

/// Split a packed line stream into per-island line slices.
pub fn parse_island_lines(data: &[f32], num_islands: usize) -> Result<Vec<IslandLines<'_>>, String> {
    let mut out = Vec::with_capacity(num_islands);
    let mut idx = 0;

    for _ in 0..num_islands {
        let count = take_count(data, idx, "line")?;
        let mask_bit = take_count(data, idx + 1, "mask bit")? as u32 % 64;
        idx += 2;

        let end = count
            .checked_mul(6)
            .and_then(|n| idx.checked_add(n))
            .ok_or_else(|| format!("absurd line count {count} at offset {idx}"))?;
        let floats = data
            .get(idx..end)
            .ok_or_else(|| format!("line stream truncated: need {end} floats, have {}", data.len()))?;
        let lines = bytemuck::try_cast_slice(floats)
            .map_err(|e| format!("line stream misaligned: {e:?}"))?;

        out.push(IslandLines { mask_bit, lines });
        idx = end;
    }
    Ok(out)
}

/// Split a packed triangle stream into per-island UV meshes.
pub fn parse_islands(data: &[f32], num_islands: usize) -> Result<Vec<IslandMesh<'_>>, String> {
    let mut out = Vec::with_capacity(num_islands);
    let mut idx = 0;

    for _ in 0..num_islands {
        let count = take_count(data, idx, "triangle")?;
        idx += 1;

        let end = count
            .checked_mul(6)
            .and_then(|n| idx.checked_add(n))
            .ok_or_else(|| format!("absurd triangle count {count} at offset {idx}"))?;
        let triangles = data.get(idx..end).ok_or_else(|| {
            format!("triangle stream truncated: need {end} floats, have {}", data.len())
        })?;

        out.push(IslandMesh { triangles });
        idx = end;
    }
    Ok(out)
}
