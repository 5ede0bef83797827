use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use ocsreel::{
    Assembler, AssemblyConfig, Ffmpeg, Ffprobe, LabelStyle, Recoil2Png, default_output_path,
};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Assemble `P-*` and `W<n>-*` slides into one letterboxed MP4 (requires `ffmpeg` and
/// `ffprobe` on PATH).
#[derive(Parser, Debug)]
#[command(name = "ocsreel", version)]
struct Cli {
    /// Directory holding one `P-` picture and any number of `W<n>-` workstages.
    workdir: PathBuf,

    /// Output MP4 path. Defaults to `00-<dirname>.mp4` in the current directory.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Seconds the picture is shown, at the start and again at the end.
    #[arg(long, default_value_t = 10.0)]
    picture_secs: f64,

    /// Seconds each workstage is shown.
    #[arg(long, default_value_t = 5.0)]
    workstage_secs: f64,

    /// Don't burn `Stage i/N` labels into workstages.
    #[arg(long, default_value_t = false)]
    no_labels: bool,

    /// Keep `RENDERTEMP-` files after a successful run.
    #[arg(long, default_value_t = false)]
    keep_temp: bool,

    /// Font file for stage labels.
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocsreel=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let output = match cli.output {
        Some(p) => p,
        None => default_output_path(&cli.workdir)
            .with_context(|| format!("derive output name from '{}'", cli.workdir.display()))?,
    };

    let cfg = AssemblyConfig {
        picture_secs: cli.picture_secs,
        workstage_secs: cli.workstage_secs,
        labels: !cli.no_labels,
        keep_temp: cli.keep_temp,
        ..AssemblyConfig::default()
    };
    let encoder = Ffmpeg::new(LabelStyle {
        font_file: cli.font,
        ..LabelStyle::default()
    })?;
    let prober = Ffprobe;
    let retro = Recoil2Png::default();

    let assembler = Assembler::new(cfg, &prober, &encoder, &retro)?;
    let report = assembler
        .run(&cli.workdir, &output)
        .with_context(|| format!("assemble '{}'", cli.workdir.display()))?;

    eprintln!(
        "wrote {} ({} slides at {} fps)",
        report.output.display(),
        report.clips.len(),
        report.fps
    );
    Ok(())
}
