//! End-to-end scenarios: island confinement, parallel determinism, and the
//! job runner over real files.

use std::fs;

use uvbake::geometry::parse_islands;
use uvbake::job::{self, JobSpec};
use uvbake::ops::highlight::generate_edge_highlights;
use uvbake::raster::bitmask::IslandBitmap;

// Packed-stream helpers mirroring the exporter's layout.
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

// Two islands packed edge to edge along a shared diagonal.
const ISLAND_A: [f32; 6] = [0.0, 0.0, 0.5, 0.0, 0.0, 1.0];
const ISLAND_B: [f32; 6] = [0.5, 0.0, 0.5, 1.0, 0.0, 1.0];
const SHARED_EDGE: [f32; 6] = [0.5, 0.0, 0.0, 1.0, 1.0, 0.0];

fn bake_one_island_line(active: usize) -> uvbake::Canvas {
    let islands = island_stream(&[&ISLAND_A, &ISLAND_B]);
    let shared = [SHARED_EDGE];
    let none: [[f32; 6]; 0] = [];
    let a_lines: &[[f32; 6]] = if active == 0 { &shared } else { &none };
    let b_lines: &[[f32; 6]] = if active == 1 { &shared } else { &none };
    let layer = line_stream(&[(0, a_lines), (1, b_lines)]);
    let empty = line_stream(&[(0, &[]), (1, &[])]);

    generate_edge_highlights(
        [&layer, &empty, &empty],
        &islands,
        [1.0, 1.0, 1.0],
        2,
        16,
        16,
    )
    .unwrap()
}

#[test]
fn ink_is_confined_to_the_owning_islands_dilated_mask() {
    // Both islands draw the same shared UV edge; each bake must stay inside
    // its own island's dilated mask even though the geometry overlaps.
    let islands = island_stream(&[&ISLAND_A, &ISLAND_B]);
    let meshes_raw = parse_islands(&islands, 2).unwrap();
    let mut bitmap = IslandBitmap::new(16, 16);
    bitmap.build(&meshes_raw);

    for island in 0..2usize {
        let canvas = bake_one_island_line(island);
        let bit = 1u64 << island;
        let mut lit = 0;
        for y in 0..16 {
            for x in 0..16 {
                if canvas.get(x, y)[3] > 0.0 {
                    lit += 1;
                    assert!(
                        bitmap.dilated()[y * 16 + x] & bit != 0,
                        "island {island} leaked to ({x},{y})"
                    );
                }
            }
        }
        assert!(lit > 0, "island {island} drew nothing");
    }
}

#[test]
fn shared_edge_inks_strongly_from_either_side() {
    // Both islands draw the same UV edge; each side must land a strong line
    // core somewhere along it (the bitmask gate must not starve either one).
    for island in 0..2usize {
        let canvas = bake_one_island_line(island);
        let peak = (0..16 * 16)
            .map(|i| canvas.get(i % 16, i / 16)[3])
            .fold(0.0f32, f32::max);
        assert!(peak > 0.9, "island {island} peak {peak}");
    }
}

#[test]
fn parallel_bake_is_deterministic() {
    // Integer thickness, no blur: repeated bakes must match bit for bit
    // regardless of worker scheduling (max-blend is order-independent).
    let mut island_slabs: Vec<Vec<f32>> = Vec::new();
    for i in 0..70 {
        // 70 islands forces two batches.
        let t = i as f32 / 70.0;
        island_slabs.push(vec![t, 0.0, t + 0.013, 0.0, t, 1.0]);
    }
    let slab_refs: Vec<&[f32]> = island_slabs.iter().map(|v| v.as_slice()).collect();
    let islands = island_stream(&slab_refs);

    let entries: Vec<(u32, [[f32; 6]; 1])> = (0..70)
        .map(|i| {
            let t = i as f32 / 70.0;
            ((i % 64) as u32, [[t, 0.0, t, 1.0, 2.0, 0.0]])
        })
        .collect();
    let entry_refs: Vec<(u32, &[[f32; 6]])> =
        entries.iter().map(|(m, l)| (*m, &l[..])).collect();
    let layer = line_stream(&entry_refs);
    let empty = line_stream(&entries.iter().map(|(m, _)| (*m, &[][..])).collect::<Vec<_>>());

    let first = generate_edge_highlights(
        [&layer, &empty, &empty],
        &islands,
        [1.0, 1.0, 1.0],
        70,
        64,
        64,
    )
    .unwrap();
    for _ in 0..3 {
        let again = generate_edge_highlights(
            [&layer, &empty, &empty],
            &islands,
            [1.0, 1.0, 1.0],
            70,
            64,
            64,
        )
        .unwrap();
        assert_eq!(first.data(), again.data());
    }
}

#[test]
fn job_runner_bakes_all_layers_from_files() {
    let dir = std::env::temp_dir().join("uvbake_job_test");
    fs::create_dir_all(&dir).unwrap();

    let write_floats = |name: &str, floats: &[f32]| {
        let bytes: Vec<u8> = floats.iter().flat_map(|v| v.to_le_bytes()).collect();
        fs::write(dir.join(name), bytes).unwrap();
    };

    // One full-square island, a line across the middle.
    #[rustfmt::skip]
    let islands = [
        2.0f32,
        0.0, 0.0, 1.0, 0.0, 0.0, 1.0,
        1.0, 0.0, 1.0, 1.0, 0.0, 1.0,
    ];
    write_floats("islands.bin", &islands);
    write_floats("l0.bin", &[1.0, 0.0, 0.0, 0.5, 1.0, 0.5, 1.0, 0.0]);
    write_floats("l1.bin", &[0.0, 0.0]);
    write_floats("l2.bin", &[0.0, 0.0]);
    write_floats("edges.bin", &[0.0, 0.5, 1.0, 0.5]);

    // Raw RGBA8888 textures at job size (16×16).
    let mut diffuse = vec![0u8; 16 * 16 * 4];
    for px in diffuse.chunks_exact_mut(4) {
        px.copy_from_slice(&[128, 64, 32, 255]);
    }
    fs::write(dir.join("diffuse.bin"), &diffuse).unwrap();
    let ao = vec![255u8; 16 * 16 * 4];
    fs::write(dir.join("ao.bin"), &ao).unwrap();

    let job_json = r#"{
        "width": 16,
        "height": 16,
        "num_islands": 1,
        "islands": "islands.bin",
        "line_layers": ["l0.bin", "l1.bin", "l2.bin"],
        "edge_lines": "edges.bin",
        "target": 0,
        "diffuse": {"path": "diffuse.bin", "format": 1},
        "ao": {"path": "ao.bin", "format": 1},
        "multiply_count": 1
    }"#;
    let job_path = dir.join("job.json");
    fs::write(&job_path, job_json).unwrap();

    let job = JobSpec::load(&job_path).unwrap();
    let outputs = job::run(&job).unwrap();

    // Highlight: the middle row is inked (brush core, stamped at sub-pixel
    // spacing, so the ridge sits within half a step of full intensity).
    assert!(outputs.edge_highlight.get(8, 8)[3] > 0.9);
    // Distance field present with a positive thickness estimate.
    let dist = outputs.distance_field.as_ref().unwrap();
    assert_eq!(dist.get(8, 8)[0], 1.0);
    assert!(outputs.average_depth.unwrap() > 0.0);
    // Composite carries the linearized distance in alpha.
    let composite = outputs.composite.as_ref().unwrap();
    assert!((composite.get(8, 8)[3] - 1.0).abs() < 1e-5);
    assert!(composite.get(8, 8)[0] > 0.0);

    fs::remove_dir_all(&dir).ok();
}
