use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    error::{OcsError, OcsResult},
    media::MediaKind,
};

static SLIDE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<picture>P)|W(?P<stage>\d+))-").expect("static slide name regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideRole {
    Picture,
    Workstage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideInput {
    pub path: PathBuf,
    pub role: SlideRole,
    pub kind: MediaKind,
}

impl SlideInput {
    pub fn new(path: PathBuf, role: SlideRole) -> Self {
        let kind = MediaKind::classify(&path);
        Self { path, role, kind }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One picture plus its workstages, in render order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderJob {
    pub workdir: PathBuf,
    pub picture: SlideInput,
    pub workstages: Vec<SlideInput>,
}

impl RenderJob {
    /// `[picture, w1..wn, picture]`: the reel returns to the picture at the end.
    pub fn sequence(&self) -> impl Iterator<Item = &SlideInput> {
        std::iter::once(&self.picture)
            .chain(self.workstages.iter())
            .chain(std::iter::once(&self.picture))
    }

    /// Every distinct input, picture first.
    pub fn inputs(&self) -> impl Iterator<Item = &SlideInput> {
        std::iter::once(&self.picture).chain(self.workstages.iter())
    }
}

/// Classify a file name. `None` for files that are neither pictures nor workstages.
pub fn slide_role(name: &str) -> Option<SlideRole> {
    let caps = SLIDE_NAME.captures(name)?;
    if caps.name("picture").is_some() {
        Some(SlideRole::Picture)
    } else {
        Some(SlideRole::Workstage)
    }
}

/// Find the picture and workstages in `dir`.
///
/// Workstages are ordered by plain byte-wise file name comparison, so `W10-` sorts before
/// `W2-`. Callers are expected to zero-pad stage numbers.
#[tracing::instrument]
pub fn scan_workdir(dir: &Path) -> OcsResult<RenderJob> {
    if !dir.is_dir() {
        return Err(OcsError::NotADirectory(dir.to_path_buf()));
    }

    let mut pictures = Vec::new();
    let mut workstages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(role) = slide_role(&name) else {
            continue;
        };
        // Follows symlinks: a linked picture counts as a file.
        if !entry.path().is_file() {
            continue;
        }
        match role {
            SlideRole::Picture => pictures.push(name),
            SlideRole::Workstage => workstages.push(name),
        }
    }

    pictures.sort();
    let picture = match pictures.len() {
        0 => return Err(OcsError::NoPicture),
        1 => pictures.remove(0),
        _ => return Err(OcsError::MultiplePictures(pictures)),
    };

    workstages.sort();
    warn_on_unpadded_stages(&workstages);
    tracing::debug!(%picture, ?workstages, "scanned workdir");

    Ok(RenderJob {
        workdir: dir.to_path_buf(),
        picture: SlideInput::new(dir.join(picture), SlideRole::Picture),
        workstages: workstages
            .into_iter()
            .map(|name| SlideInput::new(dir.join(name), SlideRole::Workstage))
            .collect(),
    })
}

fn warn_on_unpadded_stages(names: &[String]) {
    let widths: Vec<usize> = names
        .iter()
        .filter_map(|n| SLIDE_NAME.captures(n)?.name("stage").map(|m| m.len()))
        .collect();
    if let (Some(min), Some(max)) = (widths.iter().min(), widths.iter().max())
        && min != max
    {
        tracing::warn!(
            order = ?names,
            "workstage numbers have different widths; they are ordered by file name, not by number"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_from_names() {
        assert_eq!(slide_role("P-title.png"), Some(SlideRole::Picture));
        assert_eq!(slide_role("W1-a.png"), Some(SlideRole::Workstage));
        assert_eq!(slide_role("W10-c.mkv"), Some(SlideRole::Workstage));
        assert_eq!(slide_role("W-a.png"), None);
        assert_eq!(slide_role("Pic.png"), None);
        assert_eq!(slide_role("xP-a.png"), None);
        assert_eq!(slide_role("RENDERTEMP-P-a.png"), None);
    }

    #[test]
    fn sequence_bookends_picture() {
        let dir = PathBuf::from("w");
        let job = RenderJob {
            workdir: dir.clone(),
            picture: SlideInput::new(dir.join("P-a.png"), SlideRole::Picture),
            workstages: vec![
                SlideInput::new(dir.join("W1-a.png"), SlideRole::Workstage),
                SlideInput::new(dir.join("W2-b.mkv"), SlideRole::Workstage),
            ],
        };
        let names: Vec<String> = job.sequence().map(SlideInput::file_name).collect();
        assert_eq!(names, ["P-a.png", "W1-a.png", "W2-b.mkv", "P-a.png"]);
        assert_eq!(job.inputs().count(), 3);
        assert_eq!(job.workstages[1].kind, MediaKind::Video);
    }
}
