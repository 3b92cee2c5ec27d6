use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use walkdir::WalkDir;

use gridmap::pcd::PCD_EXTENSION;
use gridmap::{
    convert, load_scans, write_descriptor_file, write_grid_file, write_raster_file, GridParameters,
    MapDescriptor, PcdDirectory, ScanId,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "pcd2map", version, about = "Flatten PCD scans into a 2D occupancy map")]
struct Args {
    /// Directory holding the `<n>.pcd` scans.
    #[arg(long, env = "PCD_INPUT_DIR", default_value = "pcd")]
    input_dir: PathBuf,

    /// First numbered scan to load.
    #[arg(long, default_value_t = 1)]
    first: u64,

    /// Last numbered scan to load (inclusive).
    #[arg(long, default_value_t = 1)]
    last: u64,

    /// Ignore --first/--last and load every .pcd found under --input-dir.
    #[arg(long, default_value_t = false)]
    discover: bool,

    #[arg(long, env = "MAP_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Probability grid text file, relative to --output-dir.
    #[arg(long, default_value = "ProbMap.txt")]
    grid_file: String,

    /// Height image, relative to --output-dir. `.pgm` gives a binary PGM.
    #[arg(long, default_value = "PM.pgm")]
    image_file: String,

    /// Map descriptor (YAML), relative to --output-dir.
    #[arg(long, default_value = "PM.yaml")]
    descriptor_file: String,

    /// Cell edge length in metres.
    #[arg(long, default_value_t = 0.05)]
    resolution: f32,

    /// Lowest z kept in the height band.
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    min_z: f32,

    /// Highest z kept in the height band; also scales raster intensity.
    #[arg(long, default_value_t = 0.5, allow_hyphen_values = true)]
    max_z: f32,
}

/// Numbered scans `first..=last`.
fn numbered_scans(first: u64, last: u64) -> Result<Vec<ScanId>> {
    if first > last {
        bail!("--first ({first}) is after --last ({last})");
    }
    Ok((first..=last).map(ScanId::from).collect())
}

/// Every `.pcd` below `input_dir`, as ids relative to it (without extension).
///
/// Numeric names sort numerically so `10` comes after `9`; the order decides
/// which scan wins a shared height-raster pixel.
fn discover_scans(input_dir: &Path) -> Vec<ScanId> {
    let mut found: Vec<String> = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();

            let is_pcd = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s == PCD_EXTENSION)
                .unwrap_or(false);
            if !is_pcd {
                return None;
            }

            let relative = path.strip_prefix(input_dir).ok()?.with_extension("");
            relative.to_str().map(|s| s.replace('\\', "/"))
        })
        .collect();

    found.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });

    found.into_iter().map(ScanId::from).collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let started = Instant::now();

    let params = GridParameters::new(args.resolution, args.min_z, args.max_z)
        .context("invalid grid parameters")?;

    // ---------------------------------------------------------------------
    // Resolve and load scans (failing scans are skipped)
    // ---------------------------------------------------------------------
    let ids = if args.discover {
        discover_scans(&args.input_dir)
    } else {
        numbered_scans(args.first, args.last)?
    };
    if ids.is_empty() {
        warn!("No scans found under {}", args.input_dir.display());
    }

    let source = PcdDirectory::new(&args.input_dir);
    let scans = load_scans(&source, &ids);
    info!(
        "Loaded {}/{} scans from {}",
        scans.len(),
        ids.len(),
        source.base_dir().display()
    );

    // ---------------------------------------------------------------------
    // Extent + rasterization
    // ---------------------------------------------------------------------
    let conversion = convert(&scans, &params).context("conversion failed")?;
    info!(
        "Occupied {} of {} cells",
        conversion.grid.occupied_count(),
        conversion.grid.width() * conversion.grid.height()
    );

    // ---------------------------------------------------------------------
    // Write artifacts: grid text, descriptor, height raster
    // ---------------------------------------------------------------------
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;

    let grid_path = args.output_dir.join(&args.grid_file);
    write_grid_file(&grid_path, &conversion.grid, &conversion.alignment)
        .context("grid text not written")?;
    info!("Wrote {}", grid_path.display());

    let image_path = args.output_dir.join(&args.image_file);
    let image_name = image_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&args.image_file)
        .to_owned();

    let descriptor_path = args.output_dir.join(&args.descriptor_file);
    let descriptor = MapDescriptor::new(image_name, &conversion.alignment);
    write_descriptor_file(&descriptor_path, &descriptor).context("descriptor not written")?;
    info!("Wrote {}", descriptor_path.display());

    write_raster_file(&image_path, &conversion.raster).context("height image not written")?;
    info!("Wrote {}", image_path.display());

    info!("Done in {:.2?}", started.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_range_is_inclusive() {
        let ids = numbered_scans(3, 5).unwrap();
        let names: Vec<&str> = ids.iter().map(ScanId::as_str).collect();

        assert_eq!(names, ["3", "4", "5"]);
        assert!(numbered_scans(5, 3).is_err());
    }

    #[test]
    fn discovery_orders_numeric_names_numerically() {
        let dir = std::env::temp_dir().join(format!("pcd2map-discover-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("late")).unwrap();
        for name in ["10.pcd", "9.pcd", "2.pcd", "notes.txt", "late/1.pcd"] {
            fs::write(dir.join(name), "").unwrap();
        }

        let ids = discover_scans(&dir);
        let names: Vec<&str> = ids.iter().map(ScanId::as_str).collect();

        assert_eq!(names, ["2", "9", "10", "late/1"]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cli_accepts_negative_band() {
        let args = Args::parse_from(["pcd2map", "--min-z", "-2.5", "--max-z", "-0.5"]);

        assert_eq!(args.min_z, -2.5);
        assert_eq!(args.max_z, -0.5);
        assert_eq!(args.resolution, 0.05);
        assert_eq!(args.image_file, "PM.pgm");
    }
}
