use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use ocsreel::{PaletteLimits, Recoil2Png, check_file};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Check images against the Amiga OCS palette rules and write fixed copies.
#[derive(Parser, Debug)]
#[command(name = "ocs-palette", version)]
struct Cli {
    /// Images to check (IFF/LBM/PIC go through `recoil2png`).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory receiving `<stem>.OCS.png` / `<stem>.ORIG.png`.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Maximum image width.
    #[arg(long, default_value_t = 320)]
    max_width: u32,

    /// Maximum image height.
    #[arg(long, default_value_t = 256)]
    max_height: u32,

    /// Maximum number of used colors.
    #[arg(long, default_value_t = 32)]
    max_colors: usize,

    /// Retro decoder executable.
    #[arg(long, default_value = "recoil2png")]
    recoil2png: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocsreel=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let limits = PaletteLimits {
        max_width: cli.max_width,
        max_height: cli.max_height,
        max_colors: cli.max_colors,
    };
    limits.validate()?;
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create output dir '{}'", cli.out_dir.display()))?;

    let retro = Recoil2Png {
        program: cli.recoil2png,
        ..Recoil2Png::default()
    };

    for file in &cli.files {
        let verdict = check_file(file, &cli.out_dir, &limits, &retro)
            .with_context(|| format!("check '{}'", file.display()))?;
        println!("{}", verdict.report(&file.display().to_string()));
    }
    Ok(())
}
