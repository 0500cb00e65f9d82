use std::path::{Component, Path, PathBuf};

/// An inspection image found under the watch root at `<date>/<serial>/<file>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageCandidate {
    pub source: PathBuf,
    pub date: String,
    pub serial: String,
    pub file_name: String,
}

impl ImageCandidate {
    /// Derive a candidate from a path under `root`.
    ///
    /// Returns `None` unless the path is exactly two directories below the
    /// root and carries the configured extension (ASCII case-insensitive).
    pub fn from_watched_path(root: &Path, path: &Path, extension: &str) -> Option<Self> {
        if !has_extension(path, extension) {
            return None;
        }

        let relative = path.strip_prefix(root).ok()?;
        let mut parts = Vec::with_capacity(3);
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }

        match parts.as_slice() {
            [date, serial, file_name] => Some(Self {
                source: path.to_path_buf(),
                date: (*date).to_string(),
                serial: (*serial).to_string(),
                file_name: (*file_name).to_string(),
            }),
            _ => None,
        }
    }

    /// (date, serial) bucket the outputs belong to.
    pub fn bucket(&self) -> (&str, &str) {
        (&self.date, &self.serial)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_from_layout() {
        let root = Path::new("/data/in");
        let candidate = ImageCandidate::from_watched_path(
            root,
            Path::new("/data/in/2024-01-01/SN123/img1.jpg"),
            "jpg",
        )
        .unwrap();

        assert_eq!(candidate.bucket(), ("2024-01-01", "SN123"));
        assert_eq!(candidate.file_name, "img1.jpg");
        assert_eq!(candidate.stem(), "img1");
    }

    #[test]
    fn test_shallow_path_discarded() {
        let root = Path::new("/data/in");
        assert!(
            ImageCandidate::from_watched_path(root, Path::new("/data/in/img1.jpg"), "jpg").is_none()
        );
        assert!(
            ImageCandidate::from_watched_path(root, Path::new("/data/in/SN123/img1.jpg"), "jpg")
                .is_none()
        );
    }

    #[test]
    fn test_deep_path_discarded() {
        let root = Path::new("/data/in");
        let nested = Path::new("/data/in/out/2024-01-01/SN123/FAIL/img1.jpg");
        assert!(ImageCandidate::from_watched_path(root, nested, "jpg").is_none());
    }

    #[test]
    fn test_path_outside_root_discarded() {
        let root = Path::new("/data/in");
        let elsewhere = Path::new("/data/other/2024-01-01/SN123/img1.jpg");
        assert!(ImageCandidate::from_watched_path(root, elsewhere, "jpg").is_none());
    }

    #[test]
    fn test_extension_filter() {
        let root = Path::new("/data/in");
        assert!(
            ImageCandidate::from_watched_path(root, Path::new("/data/in/d/s/img1.png"), "jpg")
                .is_none()
        );
        assert!(
            ImageCandidate::from_watched_path(root, Path::new("/data/in/d/s/img1.JPG"), "jpg")
                .is_some()
        );
        assert!(
            ImageCandidate::from_watched_path(root, Path::new("/data/in/d/s/img1"), "jpg").is_none()
        );
    }

    #[test]
    fn test_stem_keeps_inner_dots() {
        let root = Path::new("/in");
        let candidate =
            ImageCandidate::from_watched_path(root, Path::new("/in/d/s/cam1.top.jpg"), "jpg")
                .unwrap();
        assert_eq!(candidate.stem(), "cam1.top");
    }
}
