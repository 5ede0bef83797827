#![forbid(unsafe_code)]

pub mod assemble;
pub mod decode;
pub mod encode;
pub mod error;
pub mod fit;
pub mod media;
pub mod palette;
pub mod probe;
pub mod scan;

pub use assemble::{
    AssemblyConfig, AssemblyReport, Assembler, TEMP_FILE_PREFIX, cleanup_temp_files,
    default_output_path, playlist_manifest,
};
pub use decode::{Bitmap, IndexedImage, Recoil2Png, RetroDecoder, Rgb, load_bitmap};
pub use encode::{ClipSpec, Encoder, Ffmpeg, LabelStyle};
pub use error::{OcsError, OcsResult};
pub use fit::{FitPlan, Resample, fit_to_canvas, plan_fit};
pub use media::{Canvas, Fps, MediaKind};
pub use palette::{Analysis, PaletteLimits, Verdict, analyze, check_file, snap_to_ocs};
pub use probe::{Ffprobe, Prober, VideoInfo, validate_job};
pub use scan::{RenderJob, SlideInput, SlideRole, scan_workdir};
