//! Content path resolution
//!
//! Solutions may carry an image or a document. The resolver maps a
//! solution's logical coordinates to a deterministic filesystem path under
//! the content base directory:
//!
//! `<base>/<images|files>/<device>/<model>/<number>/<question>.<jpg|pdf>`
//!
//! with every component run through [`sanitize`]. A missing file is logged
//! but the path is still returned; the caller decides how to degrade.

use crate::types::ContentKind;
use std::path::{Path, PathBuf};

/// Normalize free text into a filesystem-safe slug.
///
/// Lowercases, keeps Latin letters, Cyrillic а–я, and digits; every other
/// run of characters collapses to a single underscore, with no leading or
/// trailing underscore. Deterministic, and injective enough in practice
/// that two questions under the same path do not collide.
pub fn sanitize(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || ('а'..='я').contains(&c) {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Maps solution coordinates to content paths under a fixed base directory.
#[derive(Debug, Clone)]
pub struct ContentResolver {
    base: PathBuf,
}

impl ContentResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Build the content path for a solution, or `None` for text-only
    /// solutions. The path is returned whether or not the file exists;
    /// absence is reported via [`ContentResolver::exists`] and a warning.
    pub fn resolve(
        &self,
        device: &str,
        model: &str,
        number: &str,
        question: &str,
        kind: ContentKind,
    ) -> Option<PathBuf> {
        let (subdir, ext) = match kind {
            ContentKind::None => return None,
            ContentKind::Image => ("images", "jpg"),
            ContentKind::File => ("files", "pdf"),
        };

        let path = self
            .base
            .join(subdir)
            .join(sanitize(device))
            .join(sanitize(model))
            .join(sanitize(number))
            .join(format!("{}.{}", sanitize(question), ext));

        if !path.exists() {
            tracing::warn!(path = %path.display(), "content file missing");
        }

        Some(path)
    }

    /// Whether the resolved path points at an existing file.
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_runs_and_trims() {
        assert_eq!(sanitize("Сброс настроек!!"), "сброс_настроек");
        assert_eq!(sanitize("  Netum C750  "), "netum_c750");
        assert_eq!(sanitize("A60DZ/A66DZ"), "a60dz_a66dz");
        assert_eq!(sanitize("___"), "");
    }

    #[test]
    fn sanitize_output_alphabet() {
        let slug = sanitize("Не включается?! 100%");
        assert!(!slug.starts_with('_') && !slug.ends_with('_'));
        assert!(slug.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || ('а'..='я').contains(&c) || c == '_'
        }));
        assert!(!slug.contains("__"));
    }

    #[test]
    fn resolve_builds_expected_layout() {
        let resolver = ContentResolver::new("data");

        let image = resolver
            .resolve("scanner", "netum", "C750", "Сброс настроек", ContentKind::Image)
            .unwrap();
        assert_eq!(
            image,
            PathBuf::from("data/images/scanner/netum/c750/сброс_настроек.jpg")
        );

        let file = resolver
            .resolve("scanner", "netum", "C750", "Инструкция", ContentKind::File)
            .unwrap();
        assert_eq!(
            file,
            PathBuf::from("data/files/scanner/netum/c750/инструкция.pdf")
        );
    }

    #[test]
    fn text_only_solutions_have_no_path() {
        let resolver = ContentResolver::new("data");
        assert!(resolver
            .resolve("scanner", "netum", "C750", "Не включается", ContentKind::None)
            .is_none());
    }

    #[test]
    fn missing_file_still_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ContentResolver::new(dir.path());
        let path = resolver
            .resolve("scanner", "netum", "C750", "Инструкция", ContentKind::File)
            .unwrap();
        assert!(!resolver.exists(&path));

        // Create the file and the same path now reports existence
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert!(resolver.exists(&path));
    }
}
