//! Input enumeration: the flat list of files one run will consider.
//!
//! Only `*.png` is listed by default. The normalizer also understands PDFs,
//! but they are skipped here unless [`crate::AnnotatorConfig::include_pdf`]
//! is set.

use crate::error::AnnotatorError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List candidate files directly under `dir`, sorted by path string.
///
/// Matching follows a shell glob: case-sensitive extension, no recursion,
/// and dot-files are not matched.
pub fn list_candidates(dir: &Path, include_pdf: bool) -> Result<Vec<PathBuf>, AnnotatorError> {
    let enumeration_failed = |source: std::io::Error| AnnotatorError::EnumerationFailed {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || !matches_pattern(&name, include_pdf) {
            continue;
        }
        let path = dir.join(name.as_ref());
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    debug!("Found {} candidate files in {}", files.len(), dir.display());
    Ok(files)
}

fn matches_pattern(name: &str, include_pdf: bool) -> bool {
    name.ends_with(".png") || (include_pdf && name.ends_with(".pdf"))
}

/// Whether the normalizer will treat `path` as a PDF (case-insensitive).
pub fn is_pdf(path: &Path) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn lists_png_only_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.pdf", "d.jpg", "E.PNG", ".hidden.png", "a10.png"] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let files = list_candidates(dir.path(), false).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "a10.png", "b.png"]);
    }

    #[test]
    fn include_pdf_adds_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.png");
        touch(dir.path(), "b.pdf");
        let files = list_candidates(dir.path(), true).unwrap();
        assert_eq!(files.len(), 2);
        assert!(is_pdf(&files[1]));
    }

    #[test]
    fn keys_keep_the_folder_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "r.png");
        let files = list_candidates(dir.path(), false).unwrap();
        assert_eq!(files[0], dir.path().join("r.png"));
    }

    #[test]
    fn missing_folder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_candidates(&dir.path().join("images"), false).unwrap_err();
        assert!(matches!(err, AnnotatorError::EnumerationFailed { .. }));
    }

    #[test]
    fn pdf_detection_ignores_case() {
        assert!(is_pdf(Path::new("./images/scan.PDF")));
        assert!(!is_pdf(Path::new("./images/scan.png")));
    }
}
