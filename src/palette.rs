//! OCS palette analysis and correction.
//!
//! The Amiga OCS stores 4 bits per channel, so a palette is hardware-exact when every
//! channel is a multiple of 17 (`0x11`, replicated nibble) or of 16 (`0x10`, shifted nibble).

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use image::RgbImage;

use crate::{
    decode::{Bitmap, IndexedImage, RetroDecoder, Rgb, load_bitmap},
    error::{OcsError, OcsResult},
    media::MediaKind,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_colors: usize,
}

impl Default for PaletteLimits {
    fn default() -> Self {
        Self {
            max_width: 320,
            max_height: 256,
            max_colors: 32,
        }
    }
}

impl PaletteLimits {
    pub fn validate(&self) -> OcsResult<()> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(OcsError::validation(
                "max width/height must be non-zero",
            ));
        }
        if self.max_colors == 0 || self.max_colors > 256 {
            return Err(OcsError::validation(
                "max colors must be within 1..=256 (8-bit palette)",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Analysis {
    ExceedsResolution { width: u32, height: u32 },
    TooManyColors { count: usize },
    Compliant { colors: BTreeSet<Rgb> },
    NonCompliant { colors: BTreeSet<Rgb> },
}

/// Colors actually referenced by pixels.
pub fn used_colors(bitmap: &Bitmap) -> BTreeSet<Rgb> {
    match bitmap {
        Bitmap::Indexed(img) => {
            let mut seen = [false; 256];
            for &i in &img.indices {
                seen[i as usize] = true;
            }
            seen.iter()
                .enumerate()
                .filter(|(_, used)| **used)
                .filter_map(|(i, _)| img.palette.get(i).copied())
                .collect()
        }
        Bitmap::Rgb(img) => img.pixels().map(|p| p.0).collect(),
    }
}

/// Whole-palette check: either every channel is a multiple of 16, or every channel is a
/// multiple of 17. A palette mixing the two rules is not compliant.
pub fn is_ocs_compliant<'a>(colors: impl IntoIterator<Item = &'a Rgb> + Clone) -> bool {
    let all_multiple_of = |m: u8| {
        colors
            .clone()
            .into_iter()
            .all(|c| c.iter().all(|ch| ch % m == 0))
    };
    all_multiple_of(16) || all_multiple_of(17)
}

#[tracing::instrument(skip(bitmap), fields(w = bitmap.width(), h = bitmap.height()))]
pub fn analyze(bitmap: &Bitmap, limits: &PaletteLimits) -> Analysis {
    let (width, height) = (bitmap.width(), bitmap.height());
    if width > limits.max_width || height > limits.max_height {
        return Analysis::ExceedsResolution { width, height };
    }

    let colors = used_colors(bitmap);
    tracing::debug!(count = colors.len(), "collected used colors");
    if colors.len() > limits.max_colors {
        return Analysis::TooManyColors {
            count: colors.len(),
        };
    }

    if is_ocs_compliant(&colors) {
        Analysis::Compliant { colors }
    } else {
        Analysis::NonCompliant { colors }
    }
}

/// Nearest multiple of 17 for one channel. 255 = 15 * 17, so the result stays in range.
pub fn snap_channel(c: u8) -> u8 {
    (((u16::from(c) + 8) / 17) * 17) as u8
}

pub fn snap_to_ocs(palette: &[Rgb]) -> Vec<Rgb> {
    palette
        .iter()
        .map(|c| [snap_channel(c[0]), snap_channel(c[1]), snap_channel(c[2])])
        .collect()
}

/// Index a truecolor image whose distinct colors fit in `max_colors`. No dithering: every
/// pixel maps to its exact color.
pub fn quantize_exact(img: &RgbImage, max_colors: usize) -> OcsResult<IndexedImage> {
    let distinct: BTreeSet<Rgb> = img.pixels().map(|p| p.0).collect();
    if distinct.len() > max_colors.min(256) {
        return Err(OcsError::validation(format!(
            "cannot index {} colors into a {max_colors}-entry palette",
            distinct.len()
        )));
    }

    let palette: Vec<Rgb> = distinct.into_iter().collect();
    let lookup: BTreeMap<Rgb, u8> = palette
        .iter()
        .enumerate()
        .map(|(i, c)| (*c, i as u8))
        .collect();
    let indices = img.pixels().map(|p| lookup[&p.0]).collect();

    Ok(IndexedImage {
        width: img.width(),
        height: img.height(),
        indices,
        palette,
    })
}

pub fn write_indexed_png(path: &Path, img: &IndexedImage) -> OcsResult<()> {
    if img.palette.is_empty() || img.palette.len() > 256 {
        return Err(OcsError::validation(format!(
            "palette must have 1..=256 entries, got {}",
            img.palette.len()
        )));
    }
    let flat: Vec<u8> = img.palette.iter().flatten().copied().collect();

    let mut encoder = png::Encoder::new(BufWriter::new(File::create(path)?), img.width, img.height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(flat);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&img.indices)?;
    writer.finish()?;
    Ok(())
}

/// What happened to one input of the palette tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    ExceedsResolution {
        width: u32,
        height: u32,
        limits: PaletteLimits,
    },
    TooManyColors {
        count: usize,
        limits: PaletteLimits,
    },
    Certified {
        width: u32,
        height: u32,
        colors: usize,
    },
    Fixed {
        output: PathBuf,
        reference: Option<PathBuf>,
    },
}

impl Verdict {
    /// The report line printed for `name`.
    pub fn report(&self, name: &str) -> String {
        match self {
            Self::ExceedsResolution {
                width,
                height,
                limits,
            } => format!(
                "{name} exceeds {}x{} - {width}x{height}",
                limits.max_width, limits.max_height
            ),
            Self::TooManyColors { count, limits } => format!(
                "{name} uses {count} colors - maximum is {}",
                limits.max_colors
            ),
            Self::Certified {
                width,
                height,
                colors,
            } => format!(
                "{name} is certified OCS-friendly! ({width}x{height}, {colors} colors)"
            ),
            Self::Fixed { output, .. } => format!(
                "{name} contains non-OCS colors :-( Fixed version saved as {}",
                output
                    .file_name()
                    .map(|f| f.to_string_lossy())
                    .unwrap_or_else(|| output.to_string_lossy())
            ),
        }
    }
}

/// Analyze one file and, when it is fixable, write `<stem>.OCS.png` into `out_dir`.
/// Retro inputs also get an unmodified `<stem>.ORIG.png` reference render.
#[tracing::instrument(skip(limits, retro))]
pub fn check_file(
    path: &Path,
    out_dir: &Path,
    limits: &PaletteLimits,
    retro: &dyn RetroDecoder,
) -> OcsResult<Verdict> {
    let kind = MediaKind::classify(path);
    let bitmap = load_bitmap(path, kind, retro)?;
    let (width, height) = (bitmap.width(), bitmap.height());

    match analyze(&bitmap, limits) {
        Analysis::ExceedsResolution { width, height } => Ok(Verdict::ExceedsResolution {
            width,
            height,
            limits: *limits,
        }),
        Analysis::TooManyColors { count } => Ok(Verdict::TooManyColors {
            count,
            limits: *limits,
        }),
        Analysis::Compliant { colors } => Ok(Verdict::Certified {
            width,
            height,
            colors: colors.len(),
        }),
        Analysis::NonCompliant { .. } => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| OcsError::validation(format!("'{}' has no file name", path.display())))?;

            let mut indexed = match bitmap {
                Bitmap::Indexed(img) => img,
                Bitmap::Rgb(img) => quantize_exact(&img, limits.max_colors)?,
            };

            let reference = if kind == MediaKind::RetroImage {
                let orig = out_dir.join(format!("{stem}.ORIG.png"));
                write_indexed_png(&orig, &indexed)?;
                Some(orig)
            } else {
                None
            };

            indexed.palette = snap_to_ocs(&indexed.palette);
            let output = out_dir.join(format!("{stem}.OCS.png"));
            write_indexed_png(&output, &indexed)?;
            tracing::info!(output = %output.display(), "wrote corrected palette image");

            Ok(Verdict::Fixed { output, reference })
        }
    }
}
