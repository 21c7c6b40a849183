//! Plate character label table.
//!
//! Maps the character detector's class indices to class names, and class
//! names to the glyphs printed in the plate string. The default table is
//! embedded at compile time from `contrib/labels/*.toml`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Compile-time embedded table for Egyptian plates (Arabic-Indic digits and letters).
const EGYPT_PLATES: &str = include_str!("../../../contrib/labels/egypt-plates.toml");

static BUILTIN: OnceLock<LabelTable> = OnceLock::new();

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("cannot read label table {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("bad label table TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("label table lists no classes")]
    NoClasses,
}

/// Class names in model order plus the class→glyph mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelTable {
    pub classes: Vec<String>,
    #[serde(default)]
    pub glyphs: HashMap<String, String>,
}

impl LabelTable {
    /// The embedded Egyptian plate table.
    pub fn builtin() -> &'static LabelTable {
        BUILTIN.get_or_init(|| match Self::from_toml(EGYPT_PLATES) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(error = %e, "embedded label table is invalid");
                LabelTable::default()
            }
        })
    }

    pub fn from_toml(src: &str) -> Result<Self, LabelError> {
        let table: LabelTable = toml::from_str(src)?;
        if table.classes.is_empty() {
            return Err(LabelError::NoClasses);
        }
        Ok(table)
    }

    /// Load a table from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let src = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&src)
    }

    /// Same glyph mapping with the class order replaced, typically by the
    /// names a detector model carries in its metadata.
    pub fn with_classes(&self, classes: Vec<String>) -> LabelTable {
        let unmapped = classes.iter().filter(|c| !self.glyphs.contains_key(*c)).count();
        if unmapped > 0 {
            tracing::warn!(unmapped, "model classes without a glyph are printed as-is");
        }
        LabelTable {
            classes,
            glyphs: self.glyphs.clone(),
        }
    }

    /// Class name for a detector class index.
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.classes.get(class_id).map(String::as_str)
    }

    /// Printed glyph for a class name; unmapped names pass through.
    pub fn glyph<'a>(&'a self, class_name: &'a str) -> &'a str {
        self.glyphs.get(class_name).map(String::as_str).unwrap_or(class_name)
    }

    /// Class index → printed glyph, or `None` for an unknown index.
    pub fn resolve(&self, class_id: usize) -> Option<&str> {
        self.class_name(class_id).map(|name| self.glyph(name))
    }
}

/// Parse an ultralytics `names` metadata value such as
/// `{0: '0', 1: '1', 10: '7aa'}` into names ordered by class index.
///
/// Returns `None` unless the indices are exactly `0..n`.
pub fn parse_model_names(raw: &str) -> Option<Vec<String>> {
    let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut entries: Vec<(usize, String)> = Vec::new();
    let mut rest = body.trim();

    while !rest.is_empty() {
        let (index, value) = rest.split_once(':')?;
        let index: usize = index.trim().parse().ok()?;
        let value = value.trim_start();
        let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let value = &value[1..];
        let end = value.find(quote)?;
        entries.push((index, value[..end].to_string()));
        rest = value[end + 1..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    entries.sort_by_key(|(index, _)| *index);
    if entries.is_empty() || entries.iter().enumerate().any(|(pos, (index, _))| pos != *index) {
        return None;
    }
    Some(entries.into_iter().map(|(_, name)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_parses() {
        let table = LabelTable::builtin();
        assert_eq!(table.classes.len(), 32);
        assert_eq!(table.glyphs.len(), 32);
        assert!(table.classes.iter().all(|c| table.glyphs.contains_key(c)));
    }

    #[test]
    fn test_builtin_digits_are_arabic_indic() {
        let table = LabelTable::builtin();
        assert_eq!(table.resolve(0), Some("٠"));
        assert_eq!(table.resolve(7), Some("٧"));
        assert_eq!(table.glyph("7aa"), "ح");
        assert_eq!(table.glyph("seen"), "س");
    }

    #[test]
    fn test_unmapped_name_passes_through() {
        let table = LabelTable::from_toml("classes = [\"A\", \"x\"]\n[glyphs]\nx = \"ص\"\n").unwrap();
        assert_eq!(table.resolve(0), Some("A"));
        assert_eq!(table.resolve(1), Some("ص"));
        assert_eq!(table.resolve(2), None);
    }

    #[test]
    fn test_empty_classes_rejected() {
        assert!(matches!(LabelTable::from_toml("classes = []"), Err(LabelError::NoClasses)));
        assert!(matches!(LabelTable::from_toml("classes = 3"), Err(LabelError::Toml(_))));
    }

    #[test]
    fn test_parse_model_names() {
        let names = parse_model_names("{0: '0', 2: \"sh'in\", 1: 'alf', 3: 'baa'}").unwrap();
        assert_eq!(names, vec!["0", "alf", "sh'in", "baa"]);
    }

    #[test]
    fn test_parse_model_names_rejects_gaps_and_junk() {
        assert!(parse_model_names("{0: 'a', 2: 'c'}").is_none());
        assert!(parse_model_names("{}").is_none());
        assert!(parse_model_names("['a', 'b']").is_none());
        assert!(parse_model_names("{0: a}").is_none());
    }

    #[test]
    fn test_model_class_order_reuses_glyphs() {
        // A model trained with letters first still maps through the same glyphs
        let table = LabelTable::builtin().with_classes(vec!["seen".into(), "3".into(), "qrs".into()]);
        assert_eq!(table.resolve(0), Some("س"));
        assert_eq!(table.resolve(1), Some("٣"));
        assert_eq!(table.resolve(2), Some("qrs"));
        assert_eq!(table.resolve(3), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LabelTable::load(Path::new("/nonexistent/labels.toml")).unwrap_err();
        assert!(matches!(err, LabelError::Io { .. }));
    }
}
