//! Font resolution and loading. Resolution never fails outright: the
//! chain is exact path, system font directories, known fallbacks, and
//! finally the original name verbatim. Both resolved paths and parsed
//! fonts are memoized on the resolver itself so tests can reset state
//! by constructing a fresh one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RenderError, Result};

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const FALLBACK_STEMS: &[&str] = &["DejaVuSans", "NotoSansCJKjp-Regular", "Arial", "LiberationSans-Regular"];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

const MAX_SCAN_DEPTH: usize = 4;

#[derive(Default)]
pub struct FontResolver {
    paths: HashMap<String, PathBuf>,
    fonts: HashMap<PathBuf, Arc<fontdue::Font>>,
}

impl FontResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a font family name or path to a concrete file path.
    pub fn resolve(&mut self, name: &str) -> PathBuf {
        if let Some(hit) = self.paths.get(name) {
            return hit.clone();
        }
        let resolved = resolve_uncached(name);
        self.paths.insert(name.to_string(), resolved.clone());
        resolved
    }

    /// Resolve and parse a font for glyph metrics and rasterization.
    pub fn load(&mut self, name: &str) -> Result<Arc<fontdue::Font>> {
        let path = self.resolve(name);
        if let Some(font) = self.fonts.get(&path) {
            return Ok(font.clone());
        }
        let data = std::fs::read(&path)
            .map_err(|e| RenderError::FontLoad(format!("{}: {e}", path.display())))?;
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
            .map_err(|e| RenderError::FontLoad(format!("{}: {e}", path.display())))?;
        let font = Arc::new(font);
        self.fonts.insert(path, font.clone());
        Ok(font)
    }
}

fn resolve_uncached(name: &str) -> PathBuf {
    let direct = Path::new(name);
    if direct.is_file() {
        return direct.to_path_buf();
    }

    let needle = normalize_stem(name);
    if !needle.is_empty() {
        for dir in FONT_DIRS {
            if let Some(hit) = scan_dir(Path::new(dir), &needle, 0) {
                return hit;
            }
        }
    }

    for stem in FALLBACK_STEMS {
        let fallback = normalize_stem(stem);
        for dir in FONT_DIRS {
            if let Some(hit) = scan_dir(Path::new(dir), &fallback, 0) {
                return hit;
            }
        }
    }

    PathBuf::from(name)
}

/// Lowercased file stem with spaces and hyphens removed, so that
/// "Noto Sans CJK JP" matches "NotoSansCJKjp-Regular.otf".
fn normalize_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect()
}

fn scan_dir(dir: &Path, needle: &str, depth: usize) -> Option<PathBuf> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }
        let ext_ok = path
            .extension()
            .map(|e| FONT_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
            .unwrap_or(false);
        if ext_ok && normalize_stem(&path.to_string_lossy()).contains(needle) {
            return Some(path);
        }
    }
    for sub in subdirs {
        if let Some(hit) = scan_dir(&sub, needle, depth + 1) {
            return Some(hit);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MyFont.ttf");
        std::fs::write(&path, b"not really a font").unwrap();

        let mut resolver = FontResolver::new();
        let resolved = resolver.resolve(&path.to_string_lossy());
        assert_eq!(resolved, path);
    }

    #[test]
    fn resolution_is_cached() {
        let mut resolver = FontResolver::new();
        let a = resolver.resolve("definitely-not-a-real-font-family");
        let b = resolver.resolve("definitely-not-a-real-font-family");
        assert_eq!(a, b);
    }

    #[test]
    fn load_of_garbage_file_is_font_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"garbage bytes").unwrap();

        let mut resolver = FontResolver::new();
        let err = resolver.load(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, RenderError::FontLoad(_)));
    }

    #[test]
    fn normalize_stem_strips_separators() {
        assert_eq!(normalize_stem("Noto Sans CJK JP"), "notosanscjkjp");
        assert_eq!(normalize_stem("DejaVuSans.ttf"), "dejavusans");
        assert_eq!(normalize_stem("Liberation-Sans_Bold.otf"), "liberationsansbold");
    }
}
