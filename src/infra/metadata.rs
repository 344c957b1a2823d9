// ============================================================
// Layer 6: Inference Metadata Store
// ============================================================
// Thresholds and min/max statistics are written next to a
// model checkpoint as JSON:
//
//   {
//     "image_threshold": 13.7,
//     "pixel_threshold": 11.2,
//     "min": 0.4,
//     "max": 27.9
//   }
//
// Every key is optional. No path means no metadata.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::ml::inferencer::InferenceMetadata;

/// Read metadata from `path`, or return empty metadata when there is none.
pub fn load_metadata(path: Option<&Path>) -> Result<InferenceMetadata> {
    let Some(path) = path else {
        return Ok(InferenceMetadata::default());
    };

    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read metadata from '{}'", path.display()))?;
    let metadata = serde_json::from_str(&json)
        .with_context(|| format!("Invalid metadata JSON in '{}'", path.display()))?;

    tracing::debug!("Loaded inference metadata from '{}'", path.display());
    Ok(metadata)
}

pub fn save_metadata(metadata: &InferenceMetadata, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write metadata to '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_path_is_empty() {
        assert_eq!(load_metadata(None).unwrap(), InferenceMetadata::default());
    }

    #[test]
    fn test_save_then_load() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        let meta = InferenceMetadata {
            image_threshold: Some(1.5),
            min:             Some(0.0),
            max:             Some(3.0),
            ..InferenceMetadata::default()
        };
        save_metadata(&meta, &path).unwrap();
        assert_eq!(load_metadata(Some(&path)).unwrap(), meta);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_metadata(Some(&path)).is_err());
        assert!(load_metadata(Some(&tmp.path().join("missing.json"))).is_err());
    }
}
