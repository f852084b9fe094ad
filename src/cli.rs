// ============================================================================
// uvbake CLI — headless batch baking via command-line arguments
// ============================================================================
//
// Usage examples:
//   uvbake --job scene.json
//   uvbake -j bakes/*.json --output-dir out/
//   uvbake -j scene.json --threads 4 --island-mask
//
// Jobs run sequentially; everything inside one job is parallel.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::Canvas;
use crate::job::{self, JobSpec};
use crate::ops::highlight::render_island_coverage;

/// uvbake headless texture baker.
///
/// Bake UV edge-highlight, distance-field and composite maps from exported
/// mesh geometry — no DCC session required.
#[derive(Parser, Debug)]
#[command(
    name = "uvbake",
    about = "Bake UV seam textures from exported mesh geometry",
    long_about = "Run bake jobs described by JSON job files: UV edge highlights,\n\
                  island distance fields, and the final diffuse/AO composite.\n\n\
                  Example:\n  \
                  uvbake --job scene.json --output-dir baked/\n  \
                  uvbake -j 'bakes/*.json' --threads 8"
)]
pub struct CliArgs {
    /// Job file(s). Glob patterns accepted (e.g. "bakes/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub job: Vec<String>,

    /// Output directory. Defaults to each job file's directory.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Worker thread count. Defaults to all cores.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Also write the raw island coverage mask (debug aid).
    #[arg(long)]
    pub island_mask: bool,
}

/// Entry point for the binary. Returns a failure exit code when any job
/// failed; the remaining jobs still run.
pub fn run() -> ExitCode {
    let args = CliArgs::parse();

    if let Some(threads) = args.threads
        && let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
    {
        eprintln!("warning: could not pin thread count: {e}");
    }

    let job_files = expand_globs(&args.job);
    if job_files.is_empty() {
        eprintln!("error: no job files matched");
        return ExitCode::FAILURE;
    }

    let mut failures = 0usize;
    for path in &job_files {
        if let Err(e) = process_job(path, &args) {
            eprintln!("error: {}: {e}", path.display());
            log_err!("{}: {e}", path.display());
            failures += 1;
        }
    }

    if failures > 0 {
        eprintln!("{failures}/{} jobs failed", job_files.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn expand_globs(patterns: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(paths) => {
                let mut any = false;
                for entry in paths.flatten() {
                    files.push(entry);
                    any = true;
                }
                // A literal path with no glob match is kept so the job loader
                // reports the real I/O error.
                if !any && !pattern.contains(&['*', '?', '['][..]) {
                    files.push(PathBuf::from(pattern));
                }
            }
            Err(_) => files.push(PathBuf::from(pattern)),
        }
    }
    files
}

fn process_job(path: &Path, args: &CliArgs) -> Result<(), String> {
    let started = Instant::now();
    let job = JobSpec::load(path)?;
    log_info!(
        "job {}: {}x{}, {} islands",
        path.display(),
        job.width,
        job.height,
        job.num_islands
    );

    let outputs = job::run(&job)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bake".to_string());
    let out_dir = args
        .output_dir
        .clone()
        .or_else(|| {
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| format!("cannot create {}: {e}", out_dir.display()))?;

    write_png(&outputs.edge_highlight, &out_dir, &stem, "edge")?;
    if let Some(dist) = &outputs.distance_field {
        write_png(dist, &out_dir, &stem, "distance")?;
    }
    if let Some(composite) = &outputs.composite {
        write_png(composite, &out_dir, &stem, "composite")?;
    }
    if args.island_mask {
        let islands = job::load_f32_buffer(&job.islands)?;
        let mask = render_island_coverage(&islands, job.num_islands, job.width, job.height)?;
        write_png(&mask, &out_dir, &stem, "mask")?;
    }

    let elapsed = started.elapsed();
    match outputs.average_depth {
        Some(depth) => println!(
            "{}: done in {:.2?} (average island depth {depth:.3})",
            path.display(),
            elapsed
        ),
        None => println!("{}: done in {:.2?}", path.display(), elapsed),
    }
    Ok(())
}

fn write_png(canvas: &Canvas, dir: &Path, stem: &str, suffix: &str) -> Result<(), String> {
    let target = dir.join(format!("{stem}_{suffix}.png"));
    canvas
        .to_rgba_image()
        .save(&target)
        .map_err(|e| format!("cannot write {}: {e}", target.display()))?;
    log_info!("wrote {}", target.display());
    Ok(())
}
