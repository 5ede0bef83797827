use std::num::NonZeroU32;

use fast_image_resize as fir;
use image::RgbImage;

use crate::{
    error::{OcsError, OcsResult},
    media::Canvas,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resample {
    /// Integer pixel replication, keeps pixel art crisp.
    Nearest,
    /// Hamming-windowed convolution for fractional scale factors.
    Hamming,
}

/// Scaled size and placement of an image on the delivery canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitPlan {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub resample: Resample,
}

/// Prefer the largest integer scale that fits. Fall back to fractional scaling when the
/// integer result covers less than `min_fraction` of the canvas in both dimensions.
pub fn plan_fit(src: (u32, u32), canvas: Canvas, min_fraction: f64) -> OcsResult<FitPlan> {
    let (iw, ih) = src;
    let (tw, th) = canvas.dims();
    if iw == 0 || ih == 0 {
        return Err(OcsError::validation("image width/height must be non-zero"));
    }
    if tw == 0 || th == 0 {
        return Err(OcsError::validation("canvas width/height must be non-zero"));
    }

    let scale = (tw / iw).min(th / ih);
    let (mut width, mut height) = (iw * scale, ih * scale);
    let mut resample = Resample::Nearest;

    let wide_enough = f64::from(width) >= f64::from(tw) * min_fraction;
    let tall_enough = f64::from(height) >= f64::from(th) * min_fraction;
    if !(wide_enough || tall_enough) {
        let scale = (f64::from(tw) / f64::from(iw)).min(f64::from(th) / f64::from(ih));
        width = ((f64::from(iw) * scale).round() as u32).clamp(1, tw);
        height = ((f64::from(ih) * scale).round() as u32).clamp(1, th);
        resample = Resample::Hamming;
    }

    Ok(FitPlan {
        width,
        height,
        x: (tw - width) / 2,
        y: (th - height) / 2,
        resample,
    })
}

pub fn resize_rgb8(img: &RgbImage, width: u32, height: u32, resample: Resample) -> OcsResult<RgbImage> {
    let nz = |v: u32, what: &str| {
        NonZeroU32::new(v).ok_or_else(|| OcsError::validation(format!("invalid {what}")))
    };
    let src = fir::Image::from_vec_u8(
        nz(img.width(), "source width")?,
        nz(img.height(), "source height")?,
        img.as_raw().clone(),
        fir::PixelType::U8x3,
    )
    .map_err(|e| OcsError::validation(format!("resize source error: {e}")))?;
    let mut dst = fir::Image::new(
        nz(width, "target width")?,
        nz(height, "target height")?,
        fir::PixelType::U8x3,
    );

    let alg = match resample {
        Resample::Nearest => fir::ResizeAlg::Nearest,
        Resample::Hamming => fir::ResizeAlg::Convolution(fir::FilterType::Hamming),
    };
    fir::Resizer::new(alg)
        .resize(&src.view(), &mut dst.view_mut())
        .map_err(|e| OcsError::validation(format!("resize error: {e}")))?;

    RgbImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| OcsError::validation("resize produced invalid buffer"))
}

/// Scale `img` per [`plan_fit`] and center it on a black canvas.
#[tracing::instrument(skip(img), fields(w = img.width(), h = img.height()))]
pub fn fit_to_canvas(img: &RgbImage, canvas: Canvas, min_fraction: f64) -> OcsResult<RgbImage> {
    let plan = plan_fit(img.dimensions(), canvas, min_fraction)?;
    tracing::debug!(?plan, "fit plan");
    let scaled = resize_rgb8(img, plan.width, plan.height, plan.resample)?;

    let mut out = RgbImage::new(canvas.width, canvas.height);
    image::imageops::replace(&mut out, &scaled, i64::from(plan.x), i64::from(plan.y));
    Ok(out)
}
