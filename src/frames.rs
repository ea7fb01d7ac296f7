use crate::tags::TagName;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FrameKeyError {
    #[error("frame key is empty")]
    Empty,
    #[error("frame key is not a non-negative integer: {0:?}")]
    NotAnInteger(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FramesError {
    #[error("duplicate frame key: {0}")]
    DuplicateFrame(FrameKey),
}

/// Key of a frame: the frame number of a video, or `0` for a still image.
///
/// Keys travel as decimal strings (`"123"`) because they are object keys in the
/// annotation tool's JSON. Only the number is kept: `"007"` and `" 7 "` parse to
/// frame 7 and are written back as `"7"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameKey(u64);

impl FrameKey {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn number(self) -> u64 {
        self.0
    }
}

impl FromStr for FrameKey {
    type Err = FrameKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FrameKeyError::Empty);
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| FrameKeyError::NotAnInteger(s.to_string()))
    }
}

impl TryFrom<String> for FrameKey {
    type Error = FrameKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameKey> for String {
    fn from(value: FrameKey) -> Self {
        value.0.to_string()
    }
}

impl From<u64> for FrameKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JsonSchema for FrameKey {
    fn schema_name() -> String {
        "FrameKey".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}

/// Tag reference carried by a detection. The id is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TagRef {
    pub name: TagName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// One tagged object found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    pub confidence: f64,
    pub tag: TagRef,
}

impl Detection {
    pub fn new(confidence: f64, tag: TagName) -> Self {
        Self {
            confidence,
            tag: TagRef { name: tag, id: None },
        }
    }

    pub fn with_tag_id(mut self, id: i64) -> Self {
        self.tag.id = Some(id);
        self
    }
}

/// Detections grouped by frame, in insertion order.
///
/// When read from JSON the order is the order of the keys in the document.
/// Lookups and duplicate checks go through a key index, so building a long
/// video stays linear in the number of frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frames {
    entries: Vec<(FrameKey, Vec<Detection>)>,
    index: HashMap<FrameKey, usize>,
}

impl Frames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: FrameKey, detections: Vec<Detection>) -> Result<(), FramesError> {
        if self.index.contains_key(&key) {
            return Err(FramesError::DuplicateFrame(key));
        }
        self.index.insert(key, self.entries.len());
        self.entries.push((key, detections));
        Ok(())
    }

    /// Builder-style insert for fixtures and tests.
    pub fn with_frame(
        mut self,
        key: u64,
        detections: Vec<Detection>,
    ) -> Result<Self, FramesError> {
        self.insert(FrameKey::new(key), detections)?;
        Ok(self)
    }

    pub fn get(&self, key: FrameKey) -> Option<&[Detection]> {
        self.index
            .get(&key)
            .and_then(|&i| self.entries.get(i))
            .map(|(_, detections)| detections.as_slice())
    }

    pub fn contains(&self, key: FrameKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FrameKey> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameKey, &[Detection])> {
        self.entries.iter().map(|(k, d)| (*k, d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of detections across all frames, regardless of confidence.
    pub fn detection_count(&self) -> usize {
        self.entries.iter().map(|(_, d)| d.len()).sum()
    }
}

impl Serialize for Frames {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, detections) in &self.entries {
            map.serialize_entry(key, detections)?;
        }
        map.end()
    }
}

struct FramesVisitor;

impl<'de> Visitor<'de> for FramesVisitor {
    type Value = Frames;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map from frame key to a list of detections")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut frames = Frames::new();
        while let Some((key, detections)) = access.next_entry::<FrameKey, Vec<Detection>>()? {
            frames
                .insert(key, detections)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(frames)
    }
}

impl<'de> Deserialize<'de> for Frames {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FramesVisitor)
    }
}

impl JsonSchema for Frames {
    fn schema_name() -> String {
        "Frames".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <BTreeMap<String, Vec<Detection>>>::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(confidence: f64, tag: &str) -> Detection {
        Detection::new(confidence, TagName::new(tag).unwrap())
    }

    #[test]
    fn frame_key_parses_integers() {
        assert_eq!("123".parse::<FrameKey>(), Ok(FrameKey::new(123)));
        assert_eq!(" 7 ".parse::<FrameKey>(), Ok(FrameKey::new(7)));
        assert_eq!("".parse::<FrameKey>(), Err(FrameKeyError::Empty));
        assert_eq!(
            "12a".parse::<FrameKey>(),
            Err(FrameKeyError::NotAnInteger("12a".into()))
        );
        assert_eq!(
            "-1".parse::<FrameKey>(),
            Err(FrameKeyError::NotAnInteger("-1".into()))
        );
    }

    #[test]
    fn frame_key_serializes_as_string() {
        let json = serde_json::to_string(&FrameKey::new(400)).unwrap();
        assert_eq!(json, "\"400\"");
    }

    #[test]
    fn frames_preserve_document_order() {
        let frames: Frames = serde_json::from_str(
            r#"{
                "400": [{"confidence": 0.6, "tag": {"name": "bus", "id": 2}}],
                "123": [],
                "1000": []
            }"#,
        )
        .unwrap();
        let keys: Vec<u64> = frames.keys().map(FrameKey::number).collect();
        assert_eq!(keys, vec![400, 123, 1000]);
        assert_eq!(frames.detection_count(), 1);
        assert_eq!(frames.get(FrameKey::new(400)).unwrap()[0].tag.id, Some(2));
    }

    #[test]
    fn frames_reject_duplicate_keys() {
        let result: Result<Frames, _> = serde_json::from_str(r#"{"1": [], "01": []}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate frame key: 1"), "{err}");
    }

    #[test]
    fn frame_keys_are_normalized_to_their_number() {
        let frames: Frames = serde_json::from_str(r#"{"007": []}"#).unwrap();
        assert!(frames.contains(FrameKey::new(7)));
        assert_eq!(serde_json::to_string(&frames).unwrap(), r#"{"7":[]}"#);
    }

    #[test]
    fn long_sequences_keep_order_and_lookup() {
        let mut frames = Frames::new();
        for key in (0..100_000).rev() {
            frames.insert(FrameKey::new(key), vec![]).unwrap();
        }
        assert_eq!(frames.len(), 100_000);
        assert_eq!(frames.keys().next(), Some(FrameKey::new(99_999)));
        assert!(frames.get(FrameKey::new(0)).is_some());
        assert_eq!(
            frames.insert(FrameKey::new(50_000), vec![]),
            Err(FramesError::DuplicateFrame(FrameKey::new(50_000)))
        );
        assert_eq!(frames.len(), 100_000);
    }

    #[test]
    fn frames_reject_non_integer_keys() {
        let result: Result<Frames, _> = serde_json::from_str(r#"{"abc": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn detections_ignore_extra_fields() {
        let detection: Detection = serde_json::from_str(
            r#"{"confidence": 0.9, "tag": {"name": "person"}, "bound": [[0, 0], [1, 1]]}"#,
        )
        .unwrap();
        assert_eq!(detection, det(0.9, "person"));
    }

    #[test]
    fn builder_insert_rejects_duplicates() {
        let frames = Frames::new().with_frame(1, vec![]).unwrap();
        assert_eq!(
            frames.with_frame(1, vec![det(0.5, "bus")]),
            Err(FramesError::DuplicateFrame(FrameKey::new(1)))
        );
    }

    #[test]
    fn frames_serialize_in_insertion_order() {
        let frames = Frames::new()
            .with_frame(9, vec![])
            .unwrap()
            .with_frame(2, vec![])
            .unwrap();
        assert_eq!(serde_json::to_string(&frames).unwrap(), r#"{"9":[],"2":[]}"#);
    }
}
