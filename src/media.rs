use std::{fmt, path::Path};

use crate::error::{OcsError, OcsResult};

/// Extensions handed to the retro decoder instead of the `image` crate.
pub const RETRO_IMAGE_EXTENSIONS: &[&str] = &["iff", "lbm", "pic"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "gif", "jpg", "jpeg", "tif", "tiff", "pcx", "bmp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov"];

/// How an input file is decoded, resolved once from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    RetroImage,
    StandardImage,
    Video,
    Unrecognized,
}

impl MediaKind {
    pub fn classify(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Unrecognized;
        };
        let ext = ext.to_ascii_lowercase();
        // Retro takes precedence: `.iff` is also a generic image extension.
        if RETRO_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::RetroImage
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::StandardImage
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else {
            Self::Unrecognized
        }
    }
}

/// Rational frame rate as reported by `ffprobe` (`r_frame_rate`).
#[derive(Clone, Copy, Debug)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> OcsResult<Self> {
        if den == 0 {
            return Err(OcsError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(OcsError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse an ffmpeg ratio such as `30000/1001` or a bare integer such as `25`.
    pub fn parse_ratio(s: &str) -> OcsResult<Self> {
        let bad = || OcsError::validation(format!("invalid frame rate '{s}'"));
        let mut parts = s.trim().split('/');
        let num = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(bad)?;
        let den = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| bad())?,
            None => 1,
        };
        if parts.next().is_some() {
            return Err(bad());
        }
        Self::new(num, den)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Argument form accepted by ffmpeg's `-r`.
    pub fn to_ffmpeg_arg(self) -> String {
        format!("{}/{}", self.num, self.den)
    }
}

// Rates compare by value, so 50/2 equals 25/1. No tolerance is applied.
impl PartialEq for Fps {
    fn eq(&self, other: &Self) -> bool {
        self.as_f64() == other.as_f64()
    }
}

impl fmt::Display for Fps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Full HD delivery canvas.
    pub const HD: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };

    pub fn dims(self) -> (u32, u32) {
        (self.width, self.height)
    }
}
