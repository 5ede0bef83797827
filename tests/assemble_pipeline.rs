use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
};

use ocsreel::{
    Assembler, AssemblyConfig, ClipSpec, Encoder, Fps, OcsError, OcsResult, Prober, RetroDecoder,
    VideoInfo, scan_workdir,
};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ocsreel_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn name(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().into_owned()
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Still { out: String, spec: ClipSpec },
    Video { src: String, spec: ClipSpec },
    Concat { manifest: String },
    Transcode { out: PathBuf },
}

/// Records calls and touches output files so cleanup has something to remove.
#[derive(Default)]
struct RecordingEncoder {
    calls: RefCell<Vec<Call>>,
}

impl Encoder for RecordingEncoder {
    fn still_clip(&self, image: &Path, out: &Path, spec: &ClipSpec) -> OcsResult<()> {
        assert!(image.exists(), "still frame was not written");
        let frame = image::open(image).unwrap();
        assert_eq!((frame.width(), frame.height()), (1920, 1080));
        std::fs::write(out, b"clip")?;
        self.calls.borrow_mut().push(Call::Still {
            out: name(out),
            spec: spec.clone(),
        });
        Ok(())
    }

    fn video_clip(&self, source: &Path, out: &Path, spec: &ClipSpec) -> OcsResult<()> {
        std::fs::write(out, b"clip")?;
        self.calls.borrow_mut().push(Call::Video {
            src: name(source),
            spec: spec.clone(),
        });
        Ok(())
    }

    fn concat(&self, manifest: &Path, out: &Path) -> OcsResult<()> {
        std::fs::write(out, b"concat")?;
        self.calls.borrow_mut().push(Call::Concat {
            manifest: std::fs::read_to_string(manifest)?,
        });
        Ok(())
    }

    fn transcode(&self, _source: &Path, out: &Path) -> OcsResult<()> {
        std::fs::write(out, b"mp4")?;
        self.calls.borrow_mut().push(Call::Transcode {
            out: out.to_path_buf(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct FakeProber {
    videos: HashMap<String, (u32, u32, Fps)>,
}

impl FakeProber {
    fn with(mut self, file: &str, w: u32, h: u32, fps: Fps) -> Self {
        self.videos.insert(file.to_string(), (w, h, fps));
        self
    }
}

impl Prober for FakeProber {
    fn probe(&self, path: &Path) -> OcsResult<VideoInfo> {
        let (width, height, fps) = self
            .videos
            .get(&name(path))
            .copied()
            .ok_or_else(|| OcsError::NoVideoStream(path.to_path_buf()))?;
        Ok(VideoInfo {
            source_path: path.to_path_buf(),
            width,
            height,
            fps,
        })
    }
}

struct NoRetro;

impl RetroDecoder for NoRetro {
    fn decode(&self, path: &Path) -> OcsResult<image::RgbImage> {
        Err(OcsError::validation(format!(
            "unexpected retro decode of '{}'",
            path.display()
        )))
    }
}

fn still(dir: &Path, file: &str) {
    image::RgbImage::from_pixel(32, 16, image::Rgb([255, 0, 0]))
        .save(dir.join(file))
        .unwrap();
}

fn fps(num: u32, den: u32) -> Fps {
    Fps::new(num, den).unwrap()
}

#[test]
fn workstages_sort_by_file_name() {
    let tmp = temp_dir("scan_order");
    for f in ["P-title.png", "W1-a.png", "W2-b.png", "W10-c.png"] {
        std::fs::write(tmp.join(f), b"").unwrap();
    }
    std::fs::write(tmp.join("notes.txt"), b"").unwrap();
    std::fs::create_dir_all(tmp.join("W3-dir")).unwrap();

    let job = scan_workdir(&tmp).unwrap();
    assert_eq!(job.picture.file_name(), "P-title.png");
    let order: Vec<String> = job.workstages.iter().map(|w| w.file_name()).collect();
    assert_eq!(order, ["W1-a.png", "W10-c.png", "W2-b.png"]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn picture_count_must_be_exactly_one() {
    let tmp = temp_dir("no_picture");
    std::fs::write(tmp.join("W1-a.png"), b"").unwrap();
    assert!(matches!(scan_workdir(&tmp), Err(OcsError::NoPicture)));

    std::fs::write(tmp.join("P-a.png"), b"").unwrap();
    std::fs::write(tmp.join("P-b.png"), b"").unwrap();
    let err = scan_workdir(&tmp).unwrap_err();
    assert!(matches!(err, OcsError::MultiplePictures(ref names) if names.len() == 2));

    assert!(matches!(
        scan_workdir(&tmp.join("missing")),
        Err(OcsError::NotADirectory(_))
    ));

    std::fs::remove_dir_all(&tmp).ok();
}

#[cfg(unix)]
#[test]
fn symlinked_inputs_are_scanned() {
    let tmp = temp_dir("symlinks");
    let real = tmp.join("real");
    let work = tmp.join("work");
    std::fs::create_dir_all(&real).unwrap();
    std::fs::create_dir_all(&work).unwrap();
    still(&real, "title.png");
    still(&real, "sketch.png");
    std::os::unix::fs::symlink(real.join("title.png"), work.join("P-title.png")).unwrap();
    std::os::unix::fs::symlink(real.join("sketch.png"), work.join("W1-sketch.png")).unwrap();
    // Dangling links are not files.
    std::os::unix::fs::symlink(real.join("gone.png"), work.join("W2-gone.png")).unwrap();

    let job = scan_workdir(&work).unwrap();
    assert_eq!(job.picture.file_name(), "P-title.png");
    let order: Vec<String> = job.workstages.iter().map(|w| w.file_name()).collect();
    assert_eq!(order, ["W1-sketch.png"]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn stills_only_job_uses_default_rate_and_bookends_picture() {
    let tmp = temp_dir("stills_only");
    still(&tmp, "P-title.png");
    still(&tmp, "W1-a.png");
    still(&tmp, "W2-b.png");
    let output = tmp.join("out.mp4");

    let encoder = RecordingEncoder::default();
    let prober = FakeProber::default();
    let assembler =
        Assembler::new(AssemblyConfig::default(), &prober, &encoder, &NoRetro).unwrap();
    let report = assembler.run(&tmp, &output).unwrap();

    assert_eq!(report.fps, fps(25, 1));
    let clips: Vec<String> = report.clips.iter().map(|c| name(c)).collect();
    assert_eq!(
        clips,
        [
            "RENDERTEMP-P-title.png.mkv",
            "RENDERTEMP-W1-a.png.mkv",
            "RENDERTEMP-W2-b.png.mkv",
            "RENDERTEMP-P-title.png.mkv",
        ]
    );

    let calls = encoder.calls.borrow();
    assert_eq!(calls.len(), 5);
    assert_eq!(
        calls[0],
        Call::Still {
            out: "RENDERTEMP-P-title.png.mkv".to_string(),
            spec: ClipSpec {
                duration_secs: 10.0,
                fps: fps(25, 1),
                label: None,
            },
        }
    );
    assert_eq!(
        calls[2],
        Call::Still {
            out: "RENDERTEMP-W2-b.png.mkv".to_string(),
            spec: ClipSpec {
                duration_secs: 5.0,
                fps: fps(25, 1),
                label: Some("Stage 2/2".to_string()),
            },
        }
    );
    assert_eq!(
        calls[3],
        Call::Concat {
            manifest: "ffconcat version 1.0\n\n\
                       file 'RENDERTEMP-P-title.png.mkv'\n\
                       file 'RENDERTEMP-W1-a.png.mkv'\n\
                       file 'RENDERTEMP-W2-b.png.mkv'\n\
                       file 'RENDERTEMP-P-title.png.mkv'\n"
                .to_string(),
        }
    );
    assert_eq!(calls[4], Call::Transcode { out: output.clone() });

    // Only temp artifacts are gone.
    assert!(!report.removed.is_empty());
    let left: Vec<String> = std::fs::read_dir(&tmp)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(left.iter().all(|n| !n.starts_with("RENDERTEMP-")), "{left:?}");
    assert!(left.contains(&"P-title.png".to_string()));
    assert!(output.exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn video_rate_is_pinned_for_all_slides() {
    let tmp = temp_dir("video_rate");
    still(&tmp, "P-title.png");
    std::fs::write(tmp.join("W1-a.mkv"), b"").unwrap();
    std::fs::write(tmp.join("W2-b.mp4"), b"").unwrap();

    let encoder = RecordingEncoder::default();
    let prober = FakeProber::default()
        .with("W1-a.mkv", 1920, 1080, fps(50, 1))
        .with("W2-b.mp4", 1920, 1080, fps(100, 2));
    let cfg = AssemblyConfig {
        labels: false,
        keep_temp: true,
        ..AssemblyConfig::default()
    };
    let assembler = Assembler::new(cfg, &prober, &encoder, &NoRetro).unwrap();
    let report = assembler.run(&tmp, &tmp.join("out.mp4")).unwrap();

    assert_eq!(report.fps.to_ffmpeg_arg(), "50/1");
    assert!(report.removed.is_empty());
    assert!(tmp.join("RENDERTEMP-playlist.txt").exists());

    let calls = encoder.calls.borrow();
    assert!(matches!(&calls[0], Call::Still { spec, .. } if spec.fps == fps(50, 1)));
    assert_eq!(
        calls[1],
        Call::Video {
            src: "W1-a.mkv".to_string(),
            spec: ClipSpec {
                duration_secs: 5.0,
                fps: fps(50, 1),
                label: None,
            },
        }
    );

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn differing_frame_rates_are_fatal() {
    let tmp = temp_dir("rate_mismatch");
    still(&tmp, "P-title.png");
    std::fs::write(tmp.join("W1-a.mkv"), b"").unwrap();
    std::fs::write(tmp.join("W2-b.mkv"), b"").unwrap();

    let encoder = RecordingEncoder::default();
    let prober = FakeProber::default()
        .with("W1-a.mkv", 1920, 1080, fps(25, 1))
        .with("W2-b.mkv", 1920, 1080, fps(30, 1));
    let assembler =
        Assembler::new(AssemblyConfig::default(), &prober, &encoder, &NoRetro).unwrap();
    let err = assembler.run(&tmp, &tmp.join("out.mp4")).unwrap_err();

    assert!(matches!(err, OcsError::FrameRateMismatch { .. }));
    assert!(err.to_string().contains("25 vs 30"), "{err}");
    assert!(encoder.calls.borrow().is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn wrong_video_resolution_is_fatal() {
    let tmp = temp_dir("bad_resolution");
    std::fs::write(tmp.join("P-clip.mp4"), b"").unwrap();

    let encoder = RecordingEncoder::default();
    let prober = FakeProber::default().with("P-clip.mp4", 1280, 720, fps(25, 1));
    let assembler =
        Assembler::new(AssemblyConfig::default(), &prober, &encoder, &NoRetro).unwrap();
    let err = assembler.run(&tmp, &tmp.join("out.mp4")).unwrap_err();
    assert!(matches!(
        err,
        OcsError::ResolutionMismatch {
            expected: (1920, 1080),
            got: (1280, 720),
            ..
        }
    ));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn unrecognized_workstage_fails_and_leaves_temp_files() {
    let tmp = temp_dir("unrecognized");
    still(&tmp, "P-title.png");
    std::fs::write(tmp.join("W1-a.txt"), b"").unwrap();

    let encoder = RecordingEncoder::default();
    let prober = FakeProber::default();
    let assembler =
        Assembler::new(AssemblyConfig::default(), &prober, &encoder, &NoRetro).unwrap();
    let err = assembler.run(&tmp, &tmp.join("out.mp4")).unwrap_err();
    assert!(matches!(err, OcsError::UnrecognizedFileType { .. }));
    // No rollback: the picture clip from before the failure stays.
    assert!(tmp.join("RENDERTEMP-P-title.png.mkv").exists());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn inputs_sharing_a_stem_get_separate_clips() {
    let tmp = temp_dir("shared_stem");
    still(&tmp, "P-t.png");
    still(&tmp, "W1-a.png");
    std::fs::write(tmp.join("W1-a.mkv"), b"").unwrap();

    let encoder = RecordingEncoder::default();
    let prober = FakeProber::default().with("W1-a.mkv", 1920, 1080, fps(25, 1));
    let cfg = AssemblyConfig {
        labels: false,
        ..AssemblyConfig::default()
    };
    let assembler = Assembler::new(cfg, &prober, &encoder, &NoRetro).unwrap();
    let report = assembler.run(&tmp, &tmp.join("out.mp4")).unwrap();

    let clips: Vec<String> = report.clips.iter().map(|c| name(c)).collect();
    assert_eq!(
        clips,
        [
            "RENDERTEMP-P-t.png.mkv",
            "RENDERTEMP-W1-a.mkv.mkv",
            "RENDERTEMP-W1-a.png.mkv",
            "RENDERTEMP-P-t.png.mkv",
        ]
    );

    let calls = encoder.calls.borrow();
    assert!(matches!(&calls[1], Call::Video { src, .. } if src == "W1-a.mkv"));
    assert!(matches!(&calls[2], Call::Still { out, .. } if out == "RENDERTEMP-W1-a.png.mkv"));
    assert_eq!(
        calls[3],
        Call::Concat {
            manifest: "ffconcat version 1.0\n\n\
                       file 'RENDERTEMP-P-t.png.mkv'\n\
                       file 'RENDERTEMP-W1-a.mkv.mkv'\n\
                       file 'RENDERTEMP-W1-a.png.mkv'\n\
                       file 'RENDERTEMP-P-t.png.mkv'\n"
                .to_string(),
        }
    );

    std::fs::remove_dir_all(&tmp).ok();
}
