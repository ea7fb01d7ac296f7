use crate::chart::DataType;
use crate::frames::Frames;
use crate::tags::TagIdMap;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid analysis document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tag name {tag:?} does not match pattern {pattern}")]
    TagPattern { tag: String, pattern: String },
}

/// Inference results exported by the annotation tool for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    /// Known tags and their ids.
    pub tags: TagIdMap,
    /// Detections per frame key. Images use a single frame, usually `"0"`.
    pub frames: Frames,
    /// `image` or `video`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl AnalysisInput {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, InputError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(json: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a document from `path`, or from stdin when `path` is `-`.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        if path == Path::new("-") {
            return Self::from_reader(std::io::stdin().lock());
        }
        let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Data type of the asset. Documents without one are treated as videos
    /// when they hold more than one frame and as images otherwise.
    pub fn data_type(&self) -> DataType {
        match self.data_type.as_deref() {
            Some(value) => DataType::parse(value),
            None if self.frames.len() > 1 => DataType::Video,
            None => DataType::Image,
        }
    }

    /// Check every declared and detected tag name against `pattern`.
    pub fn validate_tag_names(&self, pattern: &Regex) -> Result<(), InputError> {
        let declared = self.tags.names();
        let detected = self
            .frames
            .iter()
            .flat_map(|(_, detections)| detections.iter().map(|d| &d.tag.name));
        for name in declared.chain(detected) {
            if !pattern.is_match(name.as_str()) {
                return Err(InputError::TagPattern {
                    tag: name.to_string(),
                    pattern: pattern.as_str().to_string(),
                });
            }
        }
        Ok(())
    }
}
