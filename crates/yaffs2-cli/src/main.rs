use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use yaffs2_core::{
	recover_image_with_progress, RecoveryConfig, RecoveryProgress, TimestampZone, UnitLayout,
};

#[derive(Parser, Debug)]
#[command(name = "yaffs2", version, about = "Recover files and old file versions from YAFFS2 flash images")]
struct Cli {
	/// Enable debug logging
	#[arg(short, long, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Index an image and print what it contains
	Scan {
		/// Path to the raw flash image
		image: PathBuf,
		/// JSON unit layout for non-2k geometries
		#[arg(long)]
		layout: Option<PathBuf>,
	},
	/// Recover every file version found in an image
	Recover {
		/// Path to the raw flash image
		image: PathBuf,
		/// Directory recovered files are written to
		#[arg(short = 'd', long)]
		out: PathBuf,
		/// JSON unit layout for non-2k geometries
		#[arg(long)]
		layout: Option<PathBuf>,
		/// Expand modification times in UTC instead of local time
		#[arg(long)]
		utc: bool,
		/// Skip SHA-256 digests of recovered files
		#[arg(long)]
		no_digest: bool,
		/// Write a JSON report to this path
		#[arg(long)]
		report: Option<PathBuf>,
	},
}

fn load_layout(path: Option<PathBuf>) -> Result<UnitLayout> {
	Ok(match path {
		Some(path) => UnitLayout::from_json_file(path)?,
		None => UnitLayout::default(),
	})
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
	tracing_subscriber::fmt().with_max_level(level).init();

	match cli.command {
		Commands::Scan { image, layout } => {
			let layout = load_layout(layout)?;
			let (index, stats) = yaffs2_core::scan_image(&image, &layout)?;

			println!("✅ Scan completed: {}", image.display());
			println!("📦 Units Scanned: {}", stats.units_scanned);
			println!("🚫 Invalid Units: {}", stats.invalid_units);
			println!("📄 File Headers: {} ({} unlinked/deleted skipped)", stats.headers_indexed, stats.headers_excluded);
			println!("🧩 Data Units: {}", stats.data_units_indexed);
			println!("📁 Other Units: {}", stats.other_units);
			println!("🔢 Objects With Headers: {}", index.headers().len());
			if stats.trailing_bytes > 0 {
				println!("⚠️  Trailing Bytes Ignored: {}", stats.trailing_bytes);
			}
		}
		Commands::Recover { image, out, layout, utc, no_digest, report } => {
			let config = RecoveryConfig {
				layout: load_layout(layout)?,
				output_dir: out,
				timestamp_zone: if utc { TimestampZone::Utc } else { TimestampZone::Local },
				compute_digests: !no_digest,
				..Default::default()
			};

			let image_len = std::fs::metadata(&image).map(|m| m.len()).unwrap_or(0);
			let pb = ProgressBar::new(image_len);
			pb.set_style(
				ProgressStyle::with_template("{spinner} scanning [{bar:40}] {bytes}/{total_bytes}")?
					.progress_chars("=> "),
			);

			let progress = pb.clone();
			let result = recover_image_with_progress(&image, config, move |event| match event {
				RecoveryProgress::Scanning { bytes_scanned, .. } => progress.set_position(bytes_scanned),
				RecoveryProgress::HeaderMatched { name, chunks, object_id } => {
					progress.finish_and_clear();
					println!("{}\n{} chunks objid={}", name, chunks, object_id);
				}
				RecoveryProgress::FileWritten { .. } => {}
			});
			pb.finish_and_clear();

			let recovery = match result {
				Ok(recovery) => recovery,
				Err(e) => {
					eprintln!("❌ Recovery failed: {:#}", e);
					return Err(e);
				}
			};

			println!();
			println!("✅ Recovery completed!");
			println!("📊 Run ID: {}", recovery.run_id);
			println!("📁 Output: {}", recovery.output_directory.display());
			println!("📄 Files Written: {} ({} truncated)", recovery.files_written(), recovery.truncated_files());
			println!("💾 Bytes Recovered: {}", recovery.total_bytes);
			if !recovery.failures.is_empty() {
				println!("❌ Failed: {}", recovery.failures.len());
			}

			if let Some(path) = report {
				std::fs::write(&path, recovery.to_json()?)?;
				println!("📝 Report: {}", path.display());
			}
		}
	}
	Ok(())
}
