use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::{
    error::{OcsError, OcsResult},
    media::Fps,
};

/// Timing and overlay for one per-slide clip.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipSpec {
    pub duration_secs: f64,
    pub fps: Fps,
    pub label: Option<String>,
}

/// Video encoding backend used by the assembler.
pub trait Encoder {
    /// Loop a still image into a lossless clip.
    fn still_clip(&self, image: &Path, out: &Path, spec: &ClipSpec) -> OcsResult<()>;
    /// Re-encode a video input into a lossless clip with the same timing as stills.
    fn video_clip(&self, source: &Path, out: &Path, spec: &ClipSpec) -> OcsResult<()>;
    /// Losslessly splice the clips listed in an ffconcat manifest.
    fn concat(&self, manifest: &Path, out: &Path) -> OcsResult<()>;
    /// Final delivery encode.
    fn transcode(&self, source: &Path, out: &Path) -> OcsResult<()>;
}

/// Burned-in label appearance. Labels sit in the top-right corner.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelStyle {
    pub font_size: u32,
    pub margin: u32,
    pub font_color: String,
    pub box_color: String,
    pub box_border: u32,
    /// Font file for `drawtext`; fontconfig's default face when unset.
    pub font_file: Option<PathBuf>,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font_size: 48,
            margin: 40,
            font_color: "white".to_string(),
            box_color: "black@0.5".to_string(),
            box_border: 12,
            font_file: None,
        }
    }
}

impl LabelStyle {
    /// `drawtext` filter rendering `text`.
    pub fn drawtext_filter(&self, text: &str) -> String {
        let mut f = format!(
            "drawtext=expansion=none:text={}:x=w-tw-{m}:y={m}:fontsize={}:fontcolor={}:box=1:boxcolor={}:boxborderw={}",
            escape_filter_value(text),
            self.font_size,
            self.font_color,
            self.box_color,
            self.box_border,
            m = self.margin,
        );
        if let Some(font) = &self.font_file {
            f.push_str(":fontfile=");
            f.push_str(&escape_filter_value(&font.to_string_lossy()));
        }
        f
    }
}

/// Escape a filter option value for both the option parser and the filtergraph parser.
pub fn escape_filter_value(s: &str) -> String {
    let escape = |s: &str, special: &[char]| {
        let mut out = String::with_capacity(s.len());
        for ch in s.chars() {
            if special.contains(&ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    };
    let option_level = escape(s, &['\\', '\'', ':']);
    escape(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The system `ffmpeg` binary.
#[derive(Clone, Debug)]
pub struct Ffmpeg {
    pub label_style: LabelStyle,
    pub overwrite: bool,
}

impl Ffmpeg {
    pub fn new(label_style: LabelStyle) -> OcsResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(OcsError::ToolMissing("ffmpeg"));
        }
        Ok(Self {
            label_style,
            overwrite: true,
        })
    }

    fn base_args(&self) -> Vec<OsString> {
        let overwrite = if self.overwrite { "-y" } else { "-n" };
        vec![overwrite.into(), "-loglevel".into(), "error".into()]
    }

    fn clip_tail(&self, args: &mut Vec<OsString>, spec: &ClipSpec, out: &Path) {
        args.push("-t".into());
        args.push(spec.duration_secs.to_string().into());
        if let Some(label) = &spec.label {
            args.push("-vf".into());
            args.push(self.label_style.drawtext_filter(label).into());
        }
        args.extend(["-an", "-pix_fmt", "yuv420p", "-c:v", "ffv1"].map(OsString::from));
        args.push(out.into());
    }

    pub fn still_clip_args(&self, image: &Path, out: &Path, spec: &ClipSpec) -> Vec<OsString> {
        let mut args = self.base_args();
        args.push("-r".into());
        args.push(spec.fps.to_ffmpeg_arg().into());
        args.extend(["-loop", "1", "-i"].map(OsString::from));
        args.push(image.into());
        self.clip_tail(&mut args, spec, out);
        args
    }

    pub fn video_clip_args(&self, source: &Path, out: &Path, spec: &ClipSpec) -> Vec<OsString> {
        let mut args = self.base_args();
        args.push("-r".into());
        args.push(spec.fps.to_ffmpeg_arg().into());
        args.push("-i".into());
        args.push(source.into());
        self.clip_tail(&mut args, spec, out);
        args
    }

    pub fn concat_args(&self, manifest: &Path, out: &Path) -> Vec<OsString> {
        let mut args = self.base_args();
        args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
        args.push(manifest.into());
        args.extend(["-pix_fmt", "yuv420p", "-c:v", "ffv1"].map(OsString::from));
        args.push(out.into());
        args
    }

    pub fn transcode_args(&self, source: &Path, out: &Path) -> Vec<OsString> {
        let mut args = self.base_args();
        args.push("-i".into());
        args.push(source.into());
        args.extend(
            [
                "-pix_fmt",
                "yuv420p",
                "-c:v",
                "libx264",
                "-profile:v",
                "high",
                "-b:v",
                "10M",
                "-movflags",
                "+faststart",
            ]
            .map(OsString::from),
        );
        args.push(out.into());
        args
    }

    fn run(&self, args: Vec<OsString>) -> OcsResult<()> {
        tracing::debug!(?args, "running ffmpeg");
        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                OcsError::validation(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        if !output.status.success() {
            return Err(OcsError::Tool {
                tool: "ffmpeg",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Encoder for Ffmpeg {
    fn still_clip(&self, image: &Path, out: &Path, spec: &ClipSpec) -> OcsResult<()> {
        self.run(self.still_clip_args(image, out, spec))
    }

    fn video_clip(&self, source: &Path, out: &Path, spec: &ClipSpec) -> OcsResult<()> {
        self.run(self.video_clip_args(source, out, spec))
    }

    fn concat(&self, manifest: &Path, out: &Path) -> OcsResult<()> {
        self.run(self.concat_args(manifest, out))
    }

    fn transcode(&self, source: &Path, out: &Path) -> OcsResult<()> {
        self.run(self.transcode_args(source, out))
    }
}
