use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use image::RgbImage;

use crate::{
    error::{OcsError, OcsResult},
    media::MediaKind,
};

pub type Rgb = [u8; 3];

/// Palette image: one byte index per pixel, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    pub indices: Vec<u8>,
    pub palette: Vec<Rgb>,
}

impl IndexedImage {
    pub fn to_rgb8(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let idx = self.indices[(y * self.width + x) as usize] as usize;
            // Out-of-range indices render black, as most viewers do.
            image::Rgb(self.palette.get(idx).copied().unwrap_or([0, 0, 0]))
        })
    }
}

/// A decoded input image. Indexed only when the file stores a palette we can read as-is.
#[derive(Clone, Debug)]
pub enum Bitmap {
    Indexed(IndexedImage),
    Rgb(RgbImage),
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        match self {
            Self::Indexed(img) => img.width,
            Self::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Indexed(img) => img.height,
            Self::Rgb(img) => img.height(),
        }
    }

    pub fn to_rgb8(&self) -> RgbImage {
        match self {
            Self::Indexed(img) => img.to_rgb8(),
            Self::Rgb(img) => img.clone(),
        }
    }
}

/// Decoder for retro formats (IFF/ILBM and friends) the `image` crate can't read.
pub trait RetroDecoder {
    fn decode(&self, path: &Path) -> OcsResult<RgbImage>;
}

/// Adapter around the RECOIL `recoil2png` command-line converter.
#[derive(Clone, Debug)]
pub struct Recoil2Png {
    pub program: PathBuf,
    pub scratch_dir: PathBuf,
}

impl Default for Recoil2Png {
    fn default() -> Self {
        Self {
            program: PathBuf::from("recoil2png"),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl RetroDecoder for Recoil2Png {
    #[tracing::instrument(skip(self))]
    fn decode(&self, path: &Path) -> OcsResult<RgbImage> {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let out_png = self
            .scratch_dir
            .join(format!("ocsreel_recoil_{}_{stamp}.png", std::process::id()));

        tracing::debug!(program = %self.program.display(), out = %out_png.display(), "running retro decoder");
        let out = Command::new(&self.program)
            .arg("-o")
            .arg(&out_png)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcsError::ToolMissing("recoil2png"),
                _ => OcsError::Io(e),
            })?;
        if !out.status.success() {
            let _ = std::fs::remove_file(&out_png);
            return Err(OcsError::Tool {
                tool: "recoil2png",
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        let decoded = image::open(&out_png).map(|img| img.to_rgb8());
        let _ = std::fs::remove_file(&out_png);
        Ok(decoded?)
    }
}

/// Decode `path` according to its already-resolved media kind.
pub fn load_bitmap(path: &Path, kind: MediaKind, retro: &dyn RetroDecoder) -> OcsResult<Bitmap> {
    match kind {
        MediaKind::RetroImage => Ok(Bitmap::Rgb(retro.decode(path)?)),
        MediaKind::StandardImage => {
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if is_png {
                if let Some(indexed) = read_indexed_png(path)? {
                    return Ok(Bitmap::Indexed(indexed));
                }
            }
            Ok(Bitmap::Rgb(image::open(path)?.to_rgb8()))
        }
        MediaKind::Video | MediaKind::Unrecognized => Err(OcsError::unrecognized(path)),
    }
}

/// Read a palette PNG without expanding it. Returns `None` for non-indexed PNGs.
pub fn read_indexed_png(path: &Path) -> OcsResult<Option<IndexedImage>> {
    let mut decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;

    let (color_type, palette) = {
        let info = reader.info();
        (info.color_type, info.palette.as_ref().map(|p| p.to_vec()))
    };
    if color_type != png::ColorType::Indexed {
        return Ok(None);
    }
    let palette = palette.ok_or_else(|| {
        OcsError::validation(format!("indexed png '{}' has no PLTE chunk", path.display()))
    })?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    let indices = unpack_indices(
        &buf,
        frame.width,
        frame.height,
        frame.line_size,
        frame.bit_depth as u8,
    )?;

    Ok(Some(IndexedImage {
        width: frame.width,
        height: frame.height,
        indices,
        palette: palette
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
    }))
}

fn unpack_indices(
    buf: &[u8],
    width: u32,
    height: u32,
    line_size: usize,
    bit_depth: u8,
) -> OcsResult<Vec<u8>> {
    if !matches!(bit_depth, 1 | 2 | 4 | 8) {
        return Err(OcsError::validation(format!(
            "unsupported palette bit depth {bit_depth}"
        )));
    }
    let bits = bit_depth as usize;
    let mask = ((1u16 << bits) - 1) as u8;
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for row in buf.chunks(line_size).take(height as usize) {
        for x in 0..width as usize {
            let bit = x * bits;
            let byte = row[bit / 8];
            let shift = 8 - bits - (bit % 8);
            out.push((byte >> shift) & mask);
        }
    }
    Ok(out)
}
