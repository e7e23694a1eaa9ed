//! Process-wide font registry.

use super::error::{Error, Result};
use std::path::Path;
use std::sync::{LazyLock, PoisonError, RwLock};

/// Fonts registered for the whole process.
pub struct FontCache {
    db: fontdb::Database,
}

static GLOBAL: LazyLock<RwLock<FontCache>> = LazyLock::new(|| {
    RwLock::new(FontCache {
        db: fontdb::Database::new(),
    })
});

impl FontCache {
    pub fn global() -> &'static RwLock<FontCache> {
        &GLOBAL
    }

    /// Number of loaded font faces.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.db.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Family names of all loaded faces, deduplicated and sorted.
    #[cfg(test)]
    pub(crate) fn families(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .db
            .faces()
            .flat_map(|face| face.families.iter().map(|(name, _)| name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Load a font file, or every font below a directory.
    ///
    /// Returns the number of faces added. Finding no usable font is an error.
    pub fn register_fonts(&mut self, path: &Path) -> Result<usize> {
        let meta = std::fs::metadata(path)
            .map_err(|e| Error::io(format!("could not read '{}'", path.display()), e))?;
        let before = self.db.len();
        if meta.is_dir() {
            self.db.load_fonts_dir(path);
        } else {
            self.db
                .load_font_file(path)
                .map_err(|e| Error::io(format!("could not read '{}'", path.display()), e))?;
        }
        let added = self.db.len() - before;
        if added == 0 {
            return Err(Error::NoFonts(path.to_path_buf()));
        }
        log::debug!("registered {added} font faces from '{}'", path.display());
        Ok(added)
    }
}

/// Register fonts with the global cache.
pub fn register_fonts(path: &Path) -> Result<usize> {
    FontCache::global()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_fonts(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> FontCache {
        FontCache {
            db: fontdb::Database::new(),
        }
    }

    #[test]
    fn test_missing_path() {
        let err = cache()
            .register_fonts(Path::new("/nonexistent/fonts"))
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_directory_without_fonts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a font").unwrap();
        let mut fonts = cache();
        let err = fonts.register_fonts(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to register fonts from:"));
        assert!(fonts.is_empty());
        assert!(fonts.families().is_empty());
    }

    #[test]
    fn test_invalid_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.ttf");
        std::fs::write(&file, b"\0\x01\0\0garbage").unwrap();
        assert!(matches!(
            cache().register_fonts(&file),
            Err(Error::NoFonts(_))
        ));
    }
}
