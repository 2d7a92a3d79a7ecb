use clap::{Parser, Subcommand};
use glam::Vec3;
use std::error::Error;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zonekit::geometry::{self, ClassifierOptions, SpatialClassifier};
use zonekit::pfs::{self, PackOptions, PfsWriter};
use zonekit::skeleton::Skeleton;
use zonekit::wld::Wld;

#[derive(Parser)]
#[command(name = "zonekit", about = "Inspect PFS archives and the WLD zone files inside them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents
    List {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Extract every entry of an archive
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Pack files into a PFS archive
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// zlib level, 0-9
        #[arg(short, long, default_value = "6")]
        level: u32,
        /// Maximum chunk size in KiB
        #[arg(long, default_value = "8")]
        chunk_size: usize,
        /// Write a version 1 archive (no filename directory)
        #[arg(long)]
        unnamed: bool,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Count the fragments of a WLD by kind
    Fragments {
        archive: PathBuf,
        /// Entry name; defaults to the first .wld in the archive
        wld: Option<String>,
    },
    /// Assemble the combined zone mesh
    Mesh {
        archive: PathBuf,
        wld: Option<String>,
        /// Print the draw groups and placements as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify a point against the zone's BSP tree
    Classify {
        archive: PathBuf,
        #[arg(long)]
        wld: Option<String>,
        #[arg(allow_negative_numbers = true)]
        x: f32,
        #[arg(allow_negative_numbers = true)]
        y: f32,
        #[arg(allow_negative_numbers = true)]
        z: f32,
        /// Upper bound on BSP nodes visited
        #[arg(long, default_value = "1024")]
        max_depth: usize,
    },
    /// List skeletons with their rest-pose bone positions
    Skeletons {
        archive: PathBuf,
        wld: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let archive = pfs::load(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&archive.list())?);
                return Ok(());
            }
            println!("Archive: {} (version {:#x})", input.display(), archive.version());
            println!("{:<32} {:>10} {:>10}", "Name", "CRC", "Size");
            for info in archive.list() {
                println!("{:<32} {:>10} {:>10}", info.name, info.crc, info.size);
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir } => {
            let archive = pfs::load(&input)?;
            archive.extract_all(&output_dir)?;
            println!("Extracted {} entries to: {}", archive.len(), output_dir.display());
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, level, chunk_size, unnamed, input } => {
            let options = PackOptions {
                chunk_size: chunk_size.max(1) * 1024,
                level: level.min(9),
                version: if unnamed { pfs::header::VERSION_1 } else { pfs::header::VERSION_2 },
            };
            let file = BufWriter::new(std::fs::File::create(&output)?);
            let mut writer = PfsWriter::new(file, options);
            for path in &input {
                let data = std::fs::read(path)?;
                let name = path
                    .file_name()
                    .ok_or_else(|| format!("not a file: {}", path.display()))?
                    .to_string_lossy();
                writer.add_file(&name, &data)?;
                println!("  packed  {}", path.display());
            }
            writer.finalize()?;
            println!("Created: {}", output.display());
        }

        // ── Fragments ────────────────────────────────────────────────────────
        Commands::Fragments { archive, wld } => {
            let (name, wld) = open_wld(&archive, wld.as_deref())?;
            println!("── {name} ─────────────────────────────────────────");
            println!("  Format        {}", if wld.is_legacy() { "legacy" } else { "current" });
            println!("  Fragments     {}", wld.len());
            println!("  Strings       {} B", wld.strings().len());
            for (kind, count) in wld.kind_histogram() {
                println!("  {:<30} {:>7}", kind.to_string(), count);
            }
        }

        // ── Mesh ─────────────────────────────────────────────────────────────
        Commands::Mesh { archive, wld, json } => {
            let (name, wld) = open_wld(&archive, wld.as_deref())?;
            let mesh = geometry::extract_mesh(&wld);
            let placements = geometry::placements(&wld);
            if json {
                let out = serde_json::json!({
                    "wld": name,
                    "vertices": mesh.vertex_count(),
                    "triangles": mesh.triangle_count(),
                    "groups": mesh.groups,
                    "placements": placements,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }
            println!("{name}: {} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count());
            for group in &mesh.groups {
                let animated = group.animation.as_ref().map(|a| a.frames.len()).unwrap_or(0);
                println!("  {:>8} +{:<8} {:<24} {:?}{}",
                    group.first_index, group.index_count, group.texture, group.category,
                    if animated > 1 { format!(" ({animated} frames)") } else { String::new() });
            }
            println!("{} object placements", placements.len());
        }

        // ── Classify ─────────────────────────────────────────────────────────
        Commands::Classify { archive, wld, x, y, z, max_depth } => {
            let (_, wld) = open_wld(&archive, wld.as_deref())?;
            let classifier = SpatialClassifier::with_options(&wld, ClassifierOptions { max_depth });
            let point = Vec3::new(x, y, z);
            let leaf = classifier.leaf_at(point);
            let info = classifier.classify(point).or_else(|| classifier.zone_line_at_sphere(point));
            let out = serde_json::json!({
                "point": point,
                "leaf": leaf,
                "region": info,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        // ── Skeletons ────────────────────────────────────────────────────────
        Commands::Skeletons { archive, wld } => {
            let (_, wld) = open_wld(&archive, wld.as_deref())?;
            for skeleton in Skeleton::all(&wld) {
                println!("{} [{}] {:?}, {} bones, {} meshes",
                    skeleton.name(), skeleton.index(), skeleton.naming_convention(),
                    skeleton.bones().len(), skeleton.meshes().len());
                for (bone, world) in skeleton.bones().iter().zip(skeleton.rest_pose()) {
                    let p = world.transform_point3(Vec3::ZERO);
                    println!("  {:<28} parent {:>3}  ({:.2}, {:.2}, {:.2})", bone.name, bone.parent, p.x, p.y, p.z);
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Load `entry` (or the first `.wld`) from the archive at `path` and decode it.
fn open_wld(path: &Path, entry: Option<&str>) -> Result<(String, Wld), Box<dyn Error>> {
    let archive = pfs::load(path)?;
    let found = match entry {
        Some(name) => archive.get(name),
        None => archive.with_extension(".wld").next(),
    };
    let entry = found.ok_or_else(|| format!("no WLD entry found in {}", path.display()))?;
    Ok((entry.name.clone(), Wld::parse(&entry.data)?))
}
