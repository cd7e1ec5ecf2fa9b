/// Configuration for a [`FrameTree`](crate::FrameTree)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrameTreeConfig {
    /// Number of frame slots allocated up front
    pub capacity: usize,
    /// Maximum number of frames the tree accepts
    pub max_frames: usize,
    /// Maximum number of ancestors a frame may have; `None` is unbounded
    pub max_depth: Option<usize>,
}

impl Default for FrameTreeConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_frames: 65_536,
            max_depth: None,
        }
    }
}

impl FrameTreeConfig {
    /// Preset for small scenes (a camera and a handful of objects)
    pub fn small() -> Self {
        Self {
            capacity: 8,
            max_frames: 256,
            max_depth: Some(32),
        }
    }
}
