//! Chart-ready data for the analytics bar.
//!
//! Nothing here draws anything. These types shape [`FrameItemCounts`] into what a
//! chart needs: one series per tag for videos, one bar per tag for images.

use crate::counter::FrameItemCounts;
use crate::frames::FrameKey;
use crate::tags::{TagIdMap, TagName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const NO_DATA_MESSAGE: &str =
    "No data to analyze yet. Click the analyze button ('A') to infer data.";

/// Presentation style requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Absolute counts.
    #[default]
    Bar,
    /// Share of the frame total.
    Proportion,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(Self::Bar),
            "proportion" => Ok(Self::Proportion),
            other => Err(format!(
                "unknown render mode: {} (expected bar or proportion)",
                other
            )),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bar => f.write_str("bar"),
            Self::Proportion => f.write_str("proportion"),
        }
    }
}

fn share(count: u32, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / total as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub frame_key: FrameKey,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub tag: TagName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<i64>,
    pub points: Vec<SeriesPoint>,
}

/// Time series over all frames of a video, one line per tag, with a marker on
/// the current frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoChart {
    pub mode: RenderMode,
    pub frame_keys: Vec<FrameKey>,
    pub series: Vec<Series>,
    /// Index into `frame_keys` of the current frame.
    pub marker: Option<usize>,
}

impl VideoChart {
    pub fn new(
        counts: &[FrameItemCounts],
        tag_ids: &TagIdMap,
        current_frame: Option<FrameKey>,
        mode: RenderMode,
    ) -> Self {
        let frame_keys: Vec<FrameKey> = counts.iter().map(|c| c.frame_key).collect();
        let totals: Vec<u64> = counts.iter().map(|c| c.item_counts.total()).collect();

        // Union of keys so ad-hoc tags still get a line.
        let mut tags: Vec<&TagName> = tag_ids.names().collect();
        for record in counts {
            for name in record.item_counts.tag_names() {
                if !tags.contains(&name) {
                    tags.push(name);
                }
            }
        }
        tags.sort();

        let series = tags
            .into_iter()
            .map(|tag| Series {
                tag: tag.clone(),
                tag_id: tag_ids.id(tag.as_str()),
                points: counts
                    .iter()
                    .zip(&totals)
                    .map(|(record, &total)| {
                        let count = record.item_counts.get(tag.as_str()).unwrap_or(0);
                        SeriesPoint {
                            frame_key: record.frame_key,
                            count,
                            share: (mode == RenderMode::Proportion).then(|| share(count, total)),
                        }
                    })
                    .collect(),
            })
            .collect();

        let marker = current_frame.and_then(|key| frame_keys.iter().position(|k| *k == key));

        Self {
            mode,
            frame_keys,
            series,
            marker,
        }
    }

    pub fn current_frame(&self) -> Option<FrameKey> {
        self.marker.and_then(|i| self.frame_keys.get(i).copied())
    }

    /// Selection callback: move the marker to the frame nearest `frame_number`.
    ///
    /// Ties go to the earlier frame in sequence order. Returns `None` when the
    /// chart has no frames.
    pub fn select(&mut self, frame_number: u64) -> Option<FrameKey> {
        let (index, key) = self
            .frame_keys
            .iter()
            .enumerate()
            .min_by_key(|(i, k)| (k.number().abs_diff(frame_number), *i))
            .map(|(i, k)| (i, *k))?;
        self.marker = Some(index);
        Some(key)
    }

    pub fn max_count(&self) -> u32 {
        self.series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.count))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub tag: TagName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<i64>,
    pub count: u32,
    pub share: f64,
}

/// Breakdown of a single frame, one bar per tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChart {
    pub mode: RenderMode,
    pub frame_key: FrameKey,
    pub total: u64,
    pub bars: Vec<Bar>,
}

impl ImageChart {
    pub fn new(counts: &FrameItemCounts, tag_ids: &TagIdMap, mode: RenderMode) -> Self {
        let total = counts.item_counts.total();
        let bars = counts
            .item_counts
            .iter()
            .map(|(tag, count)| Bar {
                tag: tag.clone(),
                tag_id: tag_ids.id(tag.as_str()),
                count,
                share: share(count, total),
            })
            .collect();

        Self {
            mode,
            frame_key: counts.frame_key,
            total,
            bars,
        }
    }
}

/// Kind of asset being analysed, as reported by the annotation tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Image,
    Video,
    Other(String),
}

impl DataType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            _ => Self::Other(value.to_string()),
        }
    }
}

/// What the analytics bar shows for a given asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum AnalyticsView {
    NoData,
    Unrecognized { data_type: String },
    Image(ImageChart),
    Video(VideoChart),
}

impl AnalyticsView {
    /// Pick the view for `data_type`.
    ///
    /// Images chart the `current_frame` record, or the first one when no frame
    /// is selected. Videos chart the whole sequence.
    pub fn build(
        data_type: &DataType,
        counts: &[FrameItemCounts],
        tag_ids: &TagIdMap,
        current_frame: Option<FrameKey>,
        mode: RenderMode,
    ) -> Self {
        if let DataType::Other(name) = data_type {
            return Self::Unrecognized {
                data_type: name.clone(),
            };
        }
        if counts.is_empty() {
            return Self::NoData;
        }
        match data_type {
            DataType::Image => {
                let record = current_frame
                    .and_then(|key| counts.iter().find(|c| c.frame_key == key))
                    .unwrap_or(&counts[0]);
                Self::Image(ImageChart::new(record, tag_ids, mode))
            }
            _ => Self::Video(VideoChart::new(counts, tag_ids, current_frame, mode)),
        }
    }

    /// Text shown instead of a chart, if any.
    pub fn fallback_message(&self) -> Option<String> {
        match self {
            Self::NoData => Some(NO_DATA_MESSAGE.to_string()),
            Self::Unrecognized { data_type } => {
                Some(format!("Unrecognized data type ({})", data_type))
            }
            _ => None,
        }
    }
}
