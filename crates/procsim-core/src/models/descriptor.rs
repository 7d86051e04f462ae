//! Descriptors of discovered models.
//!
//! Descriptors are plain values produced by scanning. They hold no live resource and stay
//! valid after the library that produced them has been closed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::SolverType;

/// Metadata shared by unit and solver descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Unique model key.
    pub unique_id: String,
    /// Display name.
    pub name: String,
    pub author: String,
    pub version: u32,
    /// Library the model was found in.
    pub file_location: PathBuf,
    /// Key of the directory the library was found in.
    pub dir_key: String,
    /// Index of that directory in the manager's list.
    pub position: usize,
}

impl ModelInfo {
    /// File name of the backing library.
    pub fn file_name(&self) -> Option<&str> {
        self.file_location.file_name().and_then(|n| n.to_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    #[serde(flatten)]
    pub info: ModelInfo,
    pub is_dynamic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverDescriptor {
    #[serde(flatten)]
    pub info: ModelInfo,
    pub solver_type: SolverType,
}

/// Normalise a library path for descriptors: absolute when possible, `/` separators.
pub(crate) fn unify_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    PathBuf::from(absolute.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let info = ModelInfo {
            file_location: PathBuf::from("/opt/models/libmixer.so"),
            ..Default::default()
        };
        assert_eq!(info.file_name(), Some("libmixer.so"));
    }

    #[test]
    fn test_descriptor_serializes_flat() {
        let unit = UnitDescriptor {
            info: ModelInfo {
                unique_id: "mixer".into(),
                name: "Mixer".into(),
                ..Default::default()
            },
            is_dynamic: true,
        };
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["unique_id"], "mixer");
        assert_eq!(json["is_dynamic"], true);
    }

    #[test]
    fn test_unify_path_is_absolute() {
        let unified = unify_path(Path::new("models/lib.so"));
        assert!(unified.is_absolute());
        assert!(!unified.to_string_lossy().contains('\\'));
    }
}
