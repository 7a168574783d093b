//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    CompactMask, ElevationMap, MaskSlice, MaskSliceMut, MrMask, MrScan, ScanSlice,
    VolumeHeaderAttr,
};

pub use crate::config::{BreastSide, SegmConfig, SegmProfile};
pub use crate::error::{ConfigError, LandmarkKind, SegmError, SegmResult, StageError};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_BOUNDARY, MASK_BREAST, MASK_PECTORAL};
pub use crate::consts::ElemType;

pub use crate::assemble::BreastMasks;
pub use crate::bgnd::BackgroundThreshold;
pub use crate::fitting::ControlPointSurface;
pub use crate::landmarks::{Landmark, Landmarks};
pub use crate::mesh::TriMesh;
pub use crate::retain::{RetainHook, Retained};

pub use crate::pipeline::{segment, SegmInputs, SegmOutput};
