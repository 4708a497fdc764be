// Filters deciding which page images are forwarded for display
use std::path::Path;

/// Verdict on whether a page image is worth showing
pub trait ImageFilter: Send + Sync {
    fn is_useful(&self, path: &Path) -> bool;
}

/// Forwards every image
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ImageFilter for AcceptAll {
    fn is_useful(&self, _path: &Path) -> bool {
        true
    }
}

/// Forwards only images that exist on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistingFiles;

impl ImageFilter for ExistingFiles {
    fn is_useful(&self, path: &Path) -> bool {
        path.is_file()
    }
}

impl<F> ImageFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_useful(&self, path: &Path) -> bool {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.is_useful(Path::new("/does/not/exist.png")));
    }

    #[test]
    fn test_existing_files() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("page_1_img-0.png");
        std::fs::write(&present, b"png").unwrap();

        assert!(ExistingFiles.is_useful(&present));
        assert!(!ExistingFiles.is_useful(&temp.path().join("missing.png")));
    }

    #[test]
    fn test_closure_filter() {
        let only_png = |p: &Path| p.extension().map_or(false, |e| e == "png");
        assert!(only_png.is_useful(Path::new("a.png")));
        assert!(!only_png.is_useful(Path::new("a.jpeg")));
    }
}
