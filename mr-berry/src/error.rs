//! 运行时错误.
//!
//! 配置错误在任何阶段执行之前被整体检出; 阶段错误在产生它的阶段内部被检出,
//! 并导致整次调用中止. 批处理调用方应逐例捕获错误后继续处理下一个输入.

use crate::Idx3d;
use std::error::Error;
use std::fmt;

/// 分割流水线的统一结果类型.
pub type SegmResult<T> = Result<T, SegmError>;

/// 配置或几何错误. 这类错误在流水线启动前整体检出.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 伴随体 (脂肪抑制像或纹理特征体) 与结构像几何不一致.
    ///
    /// 参数为伴随体名称. 本库从不隐式重采样.
    GeometryMismatch(&'static str),

    /// 体素分辨率非法 (非有限或非正).
    InvalidSpacing([f64; 3]),

    /// 比例阈值不在 (0, 1) 开区间内. 参数依次为选项名和实际值.
    ThresholdOutOfRange(&'static str, f32),

    /// 长度或尺度参数必须为正. 参数依次为选项名和实际值.
    NonPositiveParameter(&'static str, f32),

    /// 区域生长种子越界.
    SeedOutOfBounds(Idx3d),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeometryMismatch(which) => write!(
                f,
                "configuration: {which} volume geometry does not match the structural volume"
            ),
            Self::InvalidSpacing(dim) => {
                write!(f, "configuration: invalid voxel spacing {dim:?} mm")
            }
            Self::ThresholdOutOfRange(name, v) => {
                write!(f, "configuration: {name} = {v} is outside (0, 1)")
            }
            Self::NonPositiveParameter(name, v) => {
                write!(f, "configuration: {name} = {v} must be positive")
            }
            Self::SeedOutOfBounds(seed) => {
                write!(f, "configuration: region-grow seed {seed:?} is out of bounds")
            }
        }
    }
}

impl Error for ConfigError {}

/// 地标种类.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkKind {
    /// 左乳头.
    LeftNipple,

    /// 右乳头.
    RightNipple,

    /// 胸骨中点.
    MidSternum,
}

impl fmt::Display for LandmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LeftNipple => "left nipple",
            Self::RightNipple => "right nipple",
            Self::MidSternum => "mid-sternum",
        };
        f.write_str(name)
    }
}

/// 阶段内部的数值退化或几何不一致错误.
///
/// 每个阶段负责检出自身的退化输出, 不允许把非法数据传给下一个阶段.
#[derive(Debug, Clone, PartialEq)]
pub enum StageError {
    /// Rayleigh 拟合没有收敛.
    RayleighFitDiverged {
        /// 已进行的迭代次数.
        iterations: u32,
    },

    /// 区域生长种子落在前景组织上, 无法生长出背景.
    SeedInForeground {
        /// 种子索引, `(z, h, w)` 格式.
        seed: Idx3d,

        /// 种子处的合成像强度.
        intensity: f32,
    },

    /// 快速行进产生了空掩膜或退化掩膜.
    EmptyPectoralMask {
        /// 波前到达的体素个数.
        reached: usize,
    },

    /// 表面拟合欠定 (边界点太少).
    UnderdeterminedSurfaceFit {
        /// 已有的边界点个数.
        points: usize,

        /// 拟合所需的最少点数.
        needed: usize,
    },

    /// 在搜索带内找不到地标候选.
    ///
    /// 注意该错误只覆盖 "找不到"; "找到但不合理" 是已知的未检验局限.
    LandmarkNotFound(LandmarkKind),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RayleighFitDiverged { iterations } => write!(
                f,
                "background estimation: Rayleigh fit diverged after {iterations} iterations"
            ),
            Self::SeedInForeground { seed, intensity } => write!(
                f,
                "background segmentation: region-grow seed {seed:?} lies on tissue \
                 (intensity {intensity}): check seed location"
            ),
            Self::EmptyPectoralMask { reached } => write!(
                f,
                "front-propagation produced an empty mask ({reached} voxels reached): \
                 check seed location"
            ),
            Self::UnderdeterminedSurfaceFit { points, needed } => write!(
                f,
                "surface fit: underdetermined with {points} boundary points (needs {needed})"
            ),
            Self::LandmarkNotFound(kind) => {
                write!(f, "landmark detection: no {kind} candidate in its search band")
            }
        }
    }
}

impl Error for StageError {}

/// 流水线错误: 配置错误或某个阶段的错误.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmError {
    /// 配置错误.
    Config(ConfigError),

    /// 阶段错误.
    Stage(StageError),
}

impl fmt::Display for SegmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Stage(e) => e.fmt(f),
        }
    }
}

impl Error for SegmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Stage(e) => Some(e),
        }
    }
}

impl From<ConfigError> for SegmError {
    #[inline]
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StageError> for SegmError {
    #[inline]
    fn from(e: StageError) -> Self {
        Self::Stage(e)
    }
}
