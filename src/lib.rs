pub mod chart;
pub mod config;
pub mod counter;
pub mod frames;
pub mod input;
pub mod render;
pub mod tags;

pub use counter::{FrameItemCounts, FrameTagCounter, frame_item_counts};
pub use frames::{Detection, FrameKey, Frames};
pub use tags::{TagIdMap, TagName};
