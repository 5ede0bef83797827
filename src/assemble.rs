//! Picture/workstage reel assembly.
//!
//! Pipeline:
//! 1. [`scan_workdir`] finds the picture and the ordered workstages
//! 2. [`validate_job`] checks video inputs and settles the frame rate
//! 3. every input becomes a lossless temp clip on the delivery canvas
//! 4. the clips are spliced `[picture, w1..wn, picture]` and transcoded to MP4
//! 5. temp files are removed
//!
//! Temp files live beside the inputs and carry [`AssemblyConfig::temp_prefix`]. A failed
//! run leaves them in place.

use std::path::{Path, PathBuf};

use crate::{
    decode::{RetroDecoder, load_bitmap},
    encode::{ClipSpec, Encoder},
    error::{OcsError, OcsResult},
    fit::fit_to_canvas,
    media::{Canvas, Fps, MediaKind},
    probe::{Prober, validate_job},
    scan::{RenderJob, SlideInput, scan_workdir},
};

pub const TEMP_FILE_PREFIX: &str = "RENDERTEMP-";

#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyConfig {
    pub canvas: Canvas,
    /// Integer scaling is kept only if it fills at least this fraction of the canvas.
    pub min_scaled_fraction: f64,
    /// Used when the job has no video inputs.
    pub default_fps: Fps,
    pub picture_secs: f64,
    pub workstage_secs: f64,
    /// Burn `Stage i/N` into workstage clips.
    pub labels: bool,
    pub temp_prefix: String,
    pub keep_temp: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::HD,
            min_scaled_fraction: 0.8,
            default_fps: Fps { num: 25, den: 1 },
            picture_secs: 10.0,
            workstage_secs: 5.0,
            labels: true,
            temp_prefix: TEMP_FILE_PREFIX.to_string(),
            keep_temp: false,
        }
    }
}

impl AssemblyConfig {
    pub fn validate(&self) -> OcsResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(OcsError::validation("canvas width/height must be non-zero"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(OcsError::validation(
                "canvas width/height must be even (required for yuv420p output)",
            ));
        }
        if !(self.min_scaled_fraction > 0.0 && self.min_scaled_fraction <= 1.0) {
            return Err(OcsError::validation(
                "min scaled fraction must be within (0, 1]",
            ));
        }
        if !(self.picture_secs > 0.0 && self.workstage_secs > 0.0) {
            return Err(OcsError::validation("slide durations must be positive"));
        }
        if self.temp_prefix.is_empty() {
            return Err(OcsError::validation("temp prefix must not be empty"));
        }
        Ok(())
    }
}

/// `00-<dirname>.mp4`, relative to the current directory.
pub fn default_output_path(workdir: &Path) -> OcsResult<PathBuf> {
    if !workdir.is_dir() {
        return Err(OcsError::NotADirectory(workdir.to_path_buf()));
    }
    let abs = std::fs::canonicalize(workdir)?;
    let name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            OcsError::validation(format!("cannot derive a name from '{}'", abs.display()))
        })?;
    Ok(PathBuf::from(format!("00-{name}.mp4")))
}

/// ffconcat manifest listing `clips` in order. Entries are file names relative to the
/// manifest's directory.
pub fn playlist_manifest<'a>(clips: impl IntoIterator<Item = &'a Path>) -> String {
    let mut out = String::from("ffconcat version 1.0\n\n");
    for clip in clips {
        let name = clip
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| clip.to_string_lossy().into_owned());
        out.push_str(&format!("file '{}'\n", name.replace('\'', r"'\''")));
    }
    out
}

/// Remove every regular file in `dir` whose name starts with `prefix`.
#[tracing::instrument]
pub fn cleanup_temp_files(dir: &Path, prefix: &str) -> OcsResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        std::fs::remove_file(&path)?;
        removed.push(path);
    }
    removed.sort();
    tracing::debug!(count = removed.len(), "removed temp files");
    Ok(removed)
}

#[derive(Clone, Debug)]
pub struct AssemblyReport {
    pub job: RenderJob,
    pub fps: Fps,
    /// Per-slide clips in playback order, picture clip at both ends.
    pub clips: Vec<PathBuf>,
    pub output: PathBuf,
    pub removed: Vec<PathBuf>,
}

pub struct Assembler<'a> {
    pub cfg: AssemblyConfig,
    pub prober: &'a dyn Prober,
    pub encoder: &'a dyn Encoder,
    pub retro: &'a dyn RetroDecoder,
}

impl<'a> Assembler<'a> {
    pub fn new(
        cfg: AssemblyConfig,
        prober: &'a dyn Prober,
        encoder: &'a dyn Encoder,
        retro: &'a dyn RetroDecoder,
    ) -> OcsResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            prober,
            encoder,
            retro,
        })
    }

    /// `<prefix><file name>.<ext>` beside the input. The input's own extension stays in the
    /// name so `W1-a.png` and `W1-a.mkv` get distinct clips.
    fn temp_path(&self, input: &SlideInput, ext: &str) -> OcsResult<PathBuf> {
        let name = input.path.file_name().ok_or_else(|| {
            OcsError::validation(format!("'{}' has no file name", input.path.display()))
        })?;
        let parent = input.path.parent().unwrap_or_else(|| Path::new("."));
        Ok(parent.join(format!(
            "{}{}.{ext}",
            self.cfg.temp_prefix,
            name.to_string_lossy()
        )))
    }

    /// Turn one input into a lossless clip of `duration_secs` on the delivery canvas.
    #[tracing::instrument(skip(self, input), fields(input = %input.path.display()))]
    pub fn convert_slide(
        &self,
        input: &SlideInput,
        duration_secs: f64,
        fps: Fps,
        label: Option<String>,
    ) -> OcsResult<PathBuf> {
        let spec = ClipSpec {
            duration_secs,
            fps,
            label,
        };
        let clip = self.temp_path(input, "mkv")?;

        match input.kind {
            MediaKind::RetroImage | MediaKind::StandardImage => {
                let bitmap = load_bitmap(&input.path, input.kind, self.retro)?;
                let framed = fit_to_canvas(
                    &bitmap.to_rgb8(),
                    self.cfg.canvas,
                    self.cfg.min_scaled_fraction,
                )?;
                let still = self.temp_path(input, "png")?;
                framed.save(&still)?;
                self.encoder.still_clip(&still, &clip, &spec)?;
            }
            MediaKind::Video => self.encoder.video_clip(&input.path, &clip, &spec)?,
            MediaKind::Unrecognized => return Err(OcsError::unrecognized(&input.path)),
        }

        tracing::info!(clip = %clip.display(), "converted slide");
        Ok(clip)
    }

    /// Scan `workdir`, build the reel and write it to `output`.
    #[tracing::instrument(skip(self))]
    pub fn run(&self, workdir: &Path, output: &Path) -> OcsResult<AssemblyReport> {
        let job = scan_workdir(workdir)?;
        let fps = validate_job(&job, self.prober, self.cfg.canvas, self.cfg.default_fps)?;
        tracing::info!(
            picture = %job.picture.file_name(),
            workstages = job.workstages.len(),
            %fps,
            "assembling reel"
        );

        let picture_clip = self.convert_slide(&job.picture, self.cfg.picture_secs, fps, None)?;
        let total = job.workstages.len();
        let mut workstage_clips = Vec::with_capacity(total);
        for (i, stage) in job.workstages.iter().enumerate() {
            let label = self.cfg.labels.then(|| format!("Stage {}/{total}", i + 1));
            workstage_clips.push(self.convert_slide(stage, self.cfg.workstage_secs, fps, label)?);
        }

        let mut clips = Vec::with_capacity(total + 2);
        clips.push(picture_clip.clone());
        clips.extend(workstage_clips);
        clips.push(picture_clip);

        let manifest = job
            .workdir
            .join(format!("{}playlist.txt", self.cfg.temp_prefix));
        std::fs::write(&manifest, playlist_manifest(clips.iter().map(PathBuf::as_path)))?;

        let concat = job
            .workdir
            .join(format!("{}concat.mkv", self.cfg.temp_prefix));
        self.encoder.concat(&manifest, &concat)?;
        self.encoder.transcode(&concat, output)?;
        tracing::info!(output = %output.display(), "wrote reel");

        let removed = if self.cfg.keep_temp {
            Vec::new()
        } else {
            cleanup_temp_files(&job.workdir, &self.cfg.temp_prefix)?
        };

        Ok(AssemblyReport {
            job,
            fps,
            clips,
            output: output.to_path_buf(),
            removed,
        })
    }
}
