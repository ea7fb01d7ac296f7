//! Per-frame, per-tag detection counting.
//!
//! Every frame gets its own copy of a zero-filled template so that each
//! record has the same key set: the declared tags.

use crate::frames::{Detection, FrameKey, Frames};
use crate::tags::{TagIdMap, TagName};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum CountError {
    #[error("confidence threshold must be a finite number, got {0}")]
    InvalidThreshold(f64),
    #[error("frame {frame}: detection confidence must be a finite number, got {value}")]
    InvalidConfidence { frame: FrameKey, value: f64 },
    #[error("frame {frame}: detection tagged \"{tag}\" which is not a known tag")]
    UnknownTag { frame: FrameKey, tag: TagName },
}

/// What to do with a qualifying detection whose tag is not in the tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTagPolicy {
    /// Fail with [`CountError::UnknownTag`].
    #[default]
    Reject,
    /// Skip the detection.
    Ignore,
    /// Count it under an extra key that only exists in that frame's record.
    Extend,
}

impl UnknownTagPolicy {
    pub const VARIANTS: &'static [&'static str] = &["reject", "ignore", "extend"];
}

impl FromStr for UnknownTagPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            "extend" => Ok(Self::Extend),
            other => Err(format!(
                "unknown tag policy: {} (expected one of: {})",
                other,
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

impl fmt::Display for UnknownTagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reject => "reject",
            Self::Ignore => "ignore",
            Self::Extend => "extend",
        };
        f.write_str(name)
    }
}

/// Count of qualifying detections per tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ItemCounts(BTreeMap<TagName, u32>);

impl ItemCounts {
    /// A record holding `0` for every tag in `tags`.
    pub fn zeroed(tags: &TagIdMap) -> Self {
        Self(tags.names().map(|name| (name.clone(), 0)).collect())
    }

    pub fn get(&self, tag: &str) -> Option<u32> {
        self.0.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains_key(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagName, u32)> {
        self.0.iter().map(|(name, count)| (name, *count))
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &TagName> {
        self.0.keys()
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|&count| u64::from(count)).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn increment_existing(&mut self, tag: &str) -> bool {
        match self.0.get_mut(tag) {
            Some(count) => {
                *count = count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    fn increment(&mut self, tag: &TagName) {
        let count = self.0.entry(tag.clone()).or_default();
        *count = count.saturating_add(1);
    }
}

impl FromIterator<(TagName, u32)> for ItemCounts {
    fn from_iter<T: IntoIterator<Item = (TagName, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Aggregated counts of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrameItemCounts {
    pub frame_key: FrameKey,
    pub item_counts: ItemCounts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountOptions {
    /// Inclusive lower bound on detection confidence.
    pub confidence_threshold: f64,
    pub unknown_tags: UnknownTagPolicy,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            unknown_tags: UnknownTagPolicy::default(),
        }
    }
}

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

pub struct FrameTagCounter {
    template: ItemCounts,
    options: CountOptions,
}

impl FrameTagCounter {
    pub fn new(tags: &TagIdMap, options: CountOptions) -> Result<Self, CountError> {
        if !options.confidence_threshold.is_finite() {
            return Err(CountError::InvalidThreshold(options.confidence_threshold));
        }
        Ok(Self {
            template: ItemCounts::zeroed(tags),
            options,
        })
    }

    pub fn options(&self) -> CountOptions {
        self.options
    }

    pub fn count(&self, frames: &Frames) -> Result<Vec<FrameItemCounts>, CountError> {
        frames
            .iter()
            .map(|(key, detections)| self.count_frame(key, detections))
            .collect()
    }

    pub fn count_frame(
        &self,
        frame_key: FrameKey,
        detections: &[Detection],
    ) -> Result<FrameItemCounts, CountError> {
        let mut item_counts = self.template.clone();

        for detection in detections {
            if !detection.confidence.is_finite() {
                return Err(CountError::InvalidConfidence {
                    frame: frame_key,
                    value: detection.confidence,
                });
            }
            if detection.confidence < self.options.confidence_threshold {
                continue;
            }

            let tag = &detection.tag.name;
            if item_counts.increment_existing(tag.as_str()) {
                continue;
            }
            match self.options.unknown_tags {
                UnknownTagPolicy::Reject => {
                    return Err(CountError::UnknownTag {
                        frame: frame_key,
                        tag: tag.clone(),
                    });
                }
                UnknownTagPolicy::Ignore => {
                    debug!(frame = %frame_key, tag = %tag, "skipping detection with unknown tag");
                }
                UnknownTagPolicy::Extend => {
                    warn!(frame = %frame_key, tag = %tag, "counting unknown tag under an ad-hoc key");
                    item_counts.increment(tag);
                }
            }
        }

        debug!(
            frame = %frame_key,
            detections = detections.len(),
            counted = item_counts.total(),
            "counted frame"
        );

        Ok(FrameItemCounts {
            frame_key,
            item_counts,
        })
    }
}

/// Count qualifying detections per tag for every frame, rejecting unknown tags.
pub fn frame_item_counts(
    tags: &TagIdMap,
    confidence_threshold: f64,
    frames: &Frames,
) -> Result<Vec<FrameItemCounts>, CountError> {
    let options = CountOptions {
        confidence_threshold,
        unknown_tags: UnknownTagPolicy::Reject,
    };
    FrameTagCounter::new(tags, options)?.count(frames)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeakFrame {
    pub frame_key: FrameKey,
    pub count: u32,
}

/// Totals across a sequence of per-frame counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CountSummary {
    pub frame_count: usize,
    pub totals: BTreeMap<TagName, u64>,
    /// First frame reaching the highest count of each tag; absent for tags never seen.
    pub peaks: BTreeMap<TagName, PeakFrame>,
}

impl CountSummary {
    pub fn total(&self) -> u64 {
        self.totals.values().sum()
    }
}

pub fn summarize(counts: &[FrameItemCounts]) -> CountSummary {
    let mut summary = CountSummary {
        frame_count: counts.len(),
        ..CountSummary::default()
    };

    for frame in counts {
        for (tag, count) in frame.item_counts.iter() {
            *summary.totals.entry(tag.clone()).or_default() += u64::from(count);
            if count == 0 {
                continue;
            }
            let is_new_peak = summary
                .peaks
                .get(tag)
                .is_none_or(|peak| count > peak.count);
            if is_new_peak {
                summary.peaks.insert(
                    tag.clone(),
                    PeakFrame {
                        frame_key: frame.frame_key,
                        count,
                    },
                );
            }
        }
    }

    summary
}
