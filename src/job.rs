// ============================================================================
// BAKE JOBS — JSON job descriptions and the pipeline runner
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::canvas::Canvas;
use crate::geometry::parse_islands;
use crate::ops::composite::composite_final;
use crate::ops::decode::{TextureFormat, decode_texture};
use crate::ops::distance::generate_distance_field;
use crate::ops::highlight::generate_edge_highlights;

/// One input texture: a conventional image file, or — when `format` carries
/// an exporter format code — a raw GPU-format blob decoded at job size.
#[derive(Debug, Clone, Deserialize)]
pub struct TextureInput {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<u32>,
}

fn default_multipliers() -> [f32; 3] {
    [1.0; 3]
}

fn default_multiply_count() -> i32 {
    1
}

/// A bake job as described by a JSON job file.
///
/// The geometry buffers are raw little-endian `f32` files: `islands` is the
/// packed triangulated-UV stream (also the distance-field mask), each
/// `line_layers` entry a packed per-island line stream, and `edge_lines` a
/// flat `[x0, y0, x1, y1, ...]` list seeding the distance field.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub width: usize,
    pub height: usize,
    pub num_islands: usize,
    pub islands: PathBuf,
    pub line_layers: [PathBuf; 3],
    #[serde(default = "default_multipliers")]
    pub multipliers: [f32; 3],
    #[serde(default)]
    pub edge_lines: Option<PathBuf>,
    #[serde(default)]
    pub target: u8,
    #[serde(default)]
    pub diffuse: Option<TextureInput>,
    #[serde(default)]
    pub ao: Option<TextureInput>,
    #[serde(default = "default_multiply_count")]
    pub multiply_count: i32,
}

impl JobSpec {
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("cannot read job file {}: {e}", path.display()))?;
        let mut job: JobSpec = serde_json::from_str(&raw)
            .map_err(|e| format!("bad job file {}: {e}", path.display()))?;

        // Buffer paths are relative to the job file.
        if let Some(dir) = path.parent() {
            job.islands = dir.join(job.islands.as_path());
            for p in &mut job.line_layers {
                *p = dir.join(p.as_path());
            }
            if let Some(p) = &mut job.edge_lines {
                *p = dir.join(p.as_path());
            }
            if let Some(t) = &mut job.diffuse {
                t.path = dir.join(t.path.as_path());
            }
            if let Some(t) = &mut job.ao {
                t.path = dir.join(t.path.as_path());
            }
        }
        Ok(job)
    }
}

/// Load a raw little-endian `f32` buffer.
pub fn load_f32_buffer(path: &Path) -> Result<Vec<f32>, String> {
    let bytes =
        fs::read(path).map_err(|e| format!("cannot read buffer {}: {e}", path.display()))?;
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "buffer {} has {} bytes, not a multiple of 4",
            path.display(),
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Load one input texture as a normalized float canvas at job size.
pub fn load_texture(input: &TextureInput, width: usize, height: usize) -> Result<Canvas, String> {
    match input.format {
        Some(code) => {
            let format = TextureFormat::from_code(code)
                .ok_or_else(|| format!("unknown texture format code {code}"))?;
            let bytes = fs::read(&input.path)
                .map_err(|e| format!("cannot read texture {}: {e}", input.path.display()))?;
            decode_texture(&bytes, width, height, format)
        }
        None => {
            let img = image::open(&input.path)
                .map_err(|e| format!("cannot decode image {}: {e}", input.path.display()))?
                .to_rgba8();
            if img.width() as usize != width || img.height() as usize != height {
                return Err(format!(
                    "texture {} is {}x{}, job is {width}x{height}",
                    input.path.display(),
                    img.width(),
                    img.height()
                ));
            }
            Ok(Canvas::from_rgba_image(&img))
        }
    }
}

/// Everything a job produced. Layers the job didn't ask for stay `None`.
pub struct BakeOutputs {
    pub edge_highlight: Canvas,
    pub distance_field: Option<Canvas>,
    pub average_depth: Option<f32>,
    pub composite: Option<Canvas>,
}

/// Run one bake job: edge highlights always, distance field when seed lines
/// are given, final composite when diffuse and AO are both present.
pub fn run(job: &JobSpec) -> Result<BakeOutputs, String> {
    let islands = load_f32_buffer(&job.islands)?;
    let layer0 = load_f32_buffer(&job.line_layers[0])?;
    let layer1 = load_f32_buffer(&job.line_layers[1])?;
    let layer2 = load_f32_buffer(&job.line_layers[2])?;

    let edge_highlight = generate_edge_highlights(
        [&layer0, &layer1, &layer2],
        &islands,
        job.multipliers,
        job.num_islands,
        job.width,
        job.height,
    )?;
    log_info!(
        "edge highlights baked: {} islands at {}x{}",
        job.num_islands,
        job.width,
        job.height
    );

    let mut distance_field = None;
    let mut average_depth = None;
    if let Some(lines_path) = &job.edge_lines {
        let lines = load_f32_buffer(lines_path)?;
        // The distance-field mask is the same triangle soup, minus the
        // per-island headers.
        let flat: Vec<f32> = parse_islands(&islands, job.num_islands)?
            .iter()
            .flat_map(|m| m.triangles.iter().copied())
            .collect();
        match generate_distance_field(&lines, &flat, job.width, job.height, job.target) {
            Some(field) => {
                log_info!("distance field baked: average depth {:.3}", field.average_depth);
                distance_field = Some(field.canvas);
                average_depth = Some(field.average_depth);
            }
            None => log_warn!("distance field skipped: empty geometry"),
        }
    }

    let composite = match (&job.diffuse, &job.ao, &distance_field) {
        (Some(diffuse_in), Some(ao_in), Some(dist)) => {
            let diffuse = load_texture(diffuse_in, job.width, job.height)?;
            let ao = load_texture(ao_in, job.width, job.height)?;
            Some(composite_final(
                &diffuse,
                &ao,
                &edge_highlight,
                dist,
                job.multiply_count,
            )?)
        }
        _ => None,
    };

    Ok(BakeOutputs {
        edge_highlight,
        distance_field,
        average_depth,
        composite,
    })
}
