use std::path::{Path, PathBuf};

use crate::{
    error::{OcsError, OcsResult},
    media::{Canvas, Fps, MediaKind},
    scan::RenderJob,
};

#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

/// Stream introspection for video inputs.
pub trait Prober {
    /// Metadata of the first video stream in `path`.
    fn probe(&self, path: &Path) -> OcsResult<VideoInfo>;
}

/// `ffprobe` on PATH.
#[derive(Clone, Debug, Default)]
pub struct Ffprobe;

pub fn is_ffprobe_on_path() -> bool {
    std::process::Command::new("ffprobe")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

/// Extract the first video stream from `ffprobe -print_format json -show_streams` output.
pub fn parse_probe_json(source_path: &Path, json: &[u8]) -> OcsResult<VideoInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| OcsError::probe(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| OcsError::NoVideoStream(source_path.to_path_buf()))?;
    let width = video_stream
        .width
        .ok_or_else(|| OcsError::probe("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| OcsError::probe("missing video height from ffprobe"))?;
    let fps = Fps::parse_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .map_err(|_| OcsError::probe("invalid video r_frame_rate"))?;

    Ok(VideoInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
    })
}

impl Prober for Ffprobe {
    fn probe(&self, path: &Path) -> OcsResult<VideoInfo> {
        if !is_ffprobe_on_path() {
            return Err(OcsError::ToolMissing("ffprobe"));
        }

        let out = std::process::Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| OcsError::probe(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(OcsError::Tool {
                tool: "ffprobe",
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        parse_probe_json(path, &out.stdout)
    }
}

/// Check every video input of `job` against `canvas` and against each other.
///
/// Returns the job-wide frame rate: the first observed video rate, or `default_fps` when the
/// job has no video inputs.
#[tracing::instrument(skip(job, prober))]
pub fn validate_job(
    job: &RenderJob,
    prober: &dyn Prober,
    canvas: Canvas,
    default_fps: Fps,
) -> OcsResult<Fps> {
    let mut job_fps: Option<Fps> = None;

    for input in job.inputs().filter(|i| i.kind == MediaKind::Video) {
        let info = prober.probe(&input.path)?;
        let got = (info.width, info.height);
        if got != canvas.dims() {
            return Err(OcsError::ResolutionMismatch {
                path: input.path.clone(),
                expected: canvas.dims(),
                got,
            });
        }

        match job_fps {
            None => job_fps = Some(info.fps),
            Some(first) if first != info.fps => {
                return Err(OcsError::FrameRateMismatch {
                    first: first.to_string(),
                    other: info.fps.to_string(),
                });
            }
            Some(_) => {}
        }
        tracing::debug!(path = %input.path.display(), fps = %info.fps, "video input ok");
    }

    Ok(job_fps.unwrap_or(default_fps))
}
