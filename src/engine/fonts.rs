use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use ab_glyph::FontVec;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::EngineError;

/// Searched when no font directory is configured.
pub const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];

/// Index of font files keyed by normalized file stem.
///
/// Only paths are kept; a font is read from disk when text is drawn with it.
#[derive(Debug, Default)]
pub struct FontBook {
    index: HashMap<String, PathBuf>,
}

impl FontBook {
    /// Index every font under `dirs`. A configured directory that does not
    /// exist is an initialization error; with no directories configured the
    /// system locations are scanned and missing ones skipped.
    pub fn scan(dirs: &[PathBuf]) -> Result<Self, EngineError> {
        let mut book = Self::default();
        if dirs.is_empty() {
            for dir in SYSTEM_FONT_DIRS.iter().map(Path::new) {
                if dir.is_dir() {
                    book.index_dir(dir);
                }
            }
            return Ok(book);
        }

        for dir in dirs {
            if !dir.is_dir() {
                return Err(EngineError::Init(format!(
                    "font directory {} does not exist",
                    dir.display()
                )));
            }
            book.index_dir(dir);
        }
        Ok(book)
    }

    fn index_dir(&mut self, dir: &Path) {
        let fonts = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable font entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_font_file(entry.path()));

        for entry in fonts {
            let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // first match wins so earlier directories take precedence
            self.index
                .entry(normalize(stem))
                .or_insert_with(|| entry.path().to_path_buf());
        }
        debug!(dir = %dir.display(), fonts = self.index.len(), "indexed font directory");
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Resolve a font identifier: an existing font file path is used as is,
    /// anything else is looked up by name.
    pub fn resolve(&self, font: &str) -> Option<PathBuf> {
        let path = Path::new(font);
        if is_font_file(path) && path.is_file() {
            return Some(path.to_path_buf());
        }
        self.index.get(&normalize(font)).cloned()
    }

    pub fn load(&self, font: &str) -> Result<FontVec, EngineError> {
        let path = self
            .resolve(font)
            .ok_or_else(|| EngineError::FontNotFound(font.to_owned()))?;
        let data = std::fs::read(&path)
            .map_err(|e| EngineError::Draw(format!("cannot read {}: {e}", path.display())))?;
        FontVec::try_from_vec(data)
            .map_err(|e| EngineError::Draw(format!("invalid font {}: {e}", path.display())))
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FONT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// `DejaVu-Sans`, `dejavu_sans` and `DejaVuSans` all name `DejaVuSans.ttf`.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}
