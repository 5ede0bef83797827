use std::path::PathBuf;

pub type OcsResult<T> = Result<T, OcsError>;

#[derive(thiserror::Error, Debug)]
pub enum OcsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unrecognised file type '{ext}': '{}'", .path.display())]
    UnrecognizedFileType { ext: String, path: PathBuf },

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("no picture (P-foo.png) file found")]
    NoPicture,

    #[error("multiple picture (P-foo.png) files found: {}", .0.join(", "))]
    MultiplePictures(Vec<String>),

    #[error("no video stream found in '{}'", .0.display())]
    NoVideoStream(PathBuf),

    #[error("incorrect video dimensions in '{}' - expected {expected:?}, got {got:?}", .path.display())]
    ResolutionMismatch {
        path: PathBuf,
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("found multiple videos with different frame rates - {first} vs {other}")]
    FrameRateMismatch { first: String, other: String },

    #[error("{0} is required but was not found on PATH")]
    ToolMissing(&'static str),

    #[error("{tool} exited with status {status}: {stderr}")]
    Tool {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("probe error: {0}")]
    Probe(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("png decode error: {0}")]
    PngDecode(#[from] png::DecodingError),

    #[error("png encode error: {0}")]
    PngEncode(#[from] png::EncodingError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OcsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    pub(crate) fn unrecognized(path: &std::path::Path) -> Self {
        Self::UnrecognizedFileType {
            ext: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            path: path.to_path_buf(),
        }
    }
}
