//! Domain layer: the recordings the pipelines operate on.

mod recording;
mod segments;

pub use recording::{Packaging, Recording, RecordingInfo, RecordingMetadata};
pub use segments::SegmentLayout;

pub use edl::Commercial;
