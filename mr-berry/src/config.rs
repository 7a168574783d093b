//! 分割流水线配置.
//!
//! 整条流水线共享一个只读配置值, 每个阶段只读取自己需要的字段.
//! 配置在流水线入口处整体校验, 之后不再修改.

use crate::consts::defaults;
use crate::error::ConfigError;
use crate::{Idx3d, VolumeHeaderAttr};

/// 乳房侧别.
///
/// 影像坐标约定: `w` 轴向患者左侧增长, 因此左乳位于正中矢状面的大 `w` 一侧.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BreastSide {
    /// 左乳 (大 `w` 半边, 含正中列).
    Left,

    /// 右乳 (小 `w` 半边).
    Right,
}

impl BreastSide {
    /// 该侧在宽度方向占据的列区间.
    #[inline]
    pub fn columns(&self, mid_sagittal: usize, nw: usize) -> std::ops::Range<usize> {
        match self {
            Self::Left => mid_sagittal..nw,
            Self::Right => 0..mid_sagittal,
        }
    }
}

/// 分割用途画像. 用于选择启用哪组可选裁剪和默认行为.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmProfile {
    /// 乳腺密度分析: 线圈裁剪 (和可选的拟合表面裁剪) 生效.
    #[default]
    BreastDensity,

    /// 俯卧-仰卧建模: 额外启用胸骨中点后方裁剪.
    ProneSupineModelling,
}

impl SegmProfile {
    /// 是否启用胸骨中点后方裁剪.
    #[inline]
    pub fn crops_past_sternum(&self) -> bool {
        matches!(self, Self::ProneSupineModelling)
    }
}

/// 分割流水线的完整只读配置.
///
/// 所有字段公开; 用 [`Default`] 获取与命令行工具一致的默认值,
/// 然后按需修改. 配置合法性由 [`SegmConfig::validate`] 在流水线启动前检查.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmConfig {
    /// 逐阶段输出运行日志.
    pub verbose: bool,

    /// 对输入图像做高斯预平滑.
    pub smooth: bool,

    /// 输出左乳掩膜.
    pub left_breast: bool,

    /// 输出右乳掩膜.
    pub right_breast: bool,

    /// 用纹理特征体对胸大肌初始分割做横向扩展.
    pub extend_pectoral_laterally: bool,

    /// 背景区域生长种子, `(z, h, w)` 格式.
    ///
    /// `None` 时采用默认位置 `(nz/2, ny/4, nx/2)` (即空气中靠前的一点).
    pub region_grow_seed: Option<Idx3d>,

    /// 背景阈值概率. 0 表示自动 (经 Rayleigh 拟合估计);
    /// 否则必须在 (0, 1) 内, 作为残差 CDF 的穿越概率.
    pub background_threshold: f32,

    /// 最终分割阈值, 必须在 (0, 1) 内. 小于 0.5 扩张掩膜, 大于 0.5 收缩掩膜.
    pub final_segm_threshold: f32,

    /// 胸大肌掩膜平滑的高斯标准差 (单位: 毫米).
    pub pectoral_smoothing_sigma_mm: f32,

    /// 快速行进: 待分割结构轮廓上的最小梯度.
    pub marching_k1: f32,

    /// 快速行进: 结构内部的平均梯度幅值.
    pub marching_k2: f32,

    /// 快速行进的停止时间.
    pub marching_time: f32,

    /// 纹理特征体的尺度参数 (单位: 毫米). 只影响诊断记录, 特征体本身由外部预计算.
    pub texture_sigma_mm: f32,

    /// 胸大肌表面拟合的控制点间距 (单位: 毫米).
    pub pectoral_control_point_spacing_mm: f32,

    /// 用拟合的皮肤表面裁剪最终掩膜.
    pub crop_with_fitted_surface: bool,

    /// 线圈裁剪厚度 (单位: 毫米). 0 表示关闭.
    pub coil_crop_distance_mm: f32,

    /// 分割用途画像.
    pub profile: SegmProfile,

    /// 俯卧-仰卧建模裁剪: 保留到胸骨中点后方多远 (单位: 毫米).
    pub crop_dist_post_midsternum_mm: f32,

    /// 手动指定正中矢状面所在的 `w` 列. `None` 时取掩膜质心.
    pub mid_sagittal: Option<usize>,

    /// 在输出中附带最终掩膜的边界网格.
    pub extract_mesh: bool,
}

impl Default for SegmConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            smooth: false,
            left_breast: false,
            right_breast: false,
            extend_pectoral_laterally: false,
            region_grow_seed: None,
            background_threshold: 0.0,
            final_segm_threshold: defaults::FINAL_SEGM_THRESHOLD,
            pectoral_smoothing_sigma_mm: defaults::PECTORAL_SMOOTHING_SIGMA_MM,
            marching_k1: defaults::MARCHING_K1,
            marching_k2: defaults::MARCHING_K2,
            marching_time: defaults::MARCHING_TIME,
            texture_sigma_mm: defaults::TEXTURE_SIGMA_MM,
            pectoral_control_point_spacing_mm: defaults::PECTORAL_CONTROL_POINT_SPACING_MM,
            crop_with_fitted_surface: false,
            coil_crop_distance_mm: defaults::COIL_CROP_DISTANCE_MM,
            profile: SegmProfile::default(),
            crop_dist_post_midsternum_mm: defaults::CROP_DIST_POST_MIDSTERNUM_MM,
            mid_sagittal: None,
            extract_mesh: false,
        }
    }
}

impl SegmConfig {
    /// 求实际使用的区域生长种子.
    #[inline]
    pub fn seed_or_default(&self, (nz, nh, nw): Idx3d) -> Idx3d {
        self.region_grow_seed.unwrap_or((nz / 2, nh / 4, nw / 2))
    }

    /// 求实际使用的背景 CDF 穿越概率.
    #[inline]
    pub fn background_crossing(&self) -> f32 {
        if self.background_threshold == 0.0 {
            defaults::BACKGROUND_CDF_CROSSING
        } else {
            self.background_threshold
        }
    }

    /// 在流水线启动前校验配置与几何.
    ///
    /// `structural` 用于检查体素分辨率和种子边界.
    pub fn validate<V: VolumeHeaderAttr>(&self, structural: &V) -> Result<(), ConfigError> {
        let dim = structural.pix_dim();
        if dim.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(ConfigError::InvalidSpacing(dim));
        }

        if self.background_threshold != 0.0
            && !(self.background_threshold > 0.0 && self.background_threshold < 1.0)
        {
            return Err(ConfigError::ThresholdOutOfRange(
                "backgroundThreshold",
                self.background_threshold,
            ));
        }
        if !(self.final_segm_threshold > 0.0 && self.final_segm_threshold < 1.0) {
            return Err(ConfigError::ThresholdOutOfRange(
                "finalSegmentationThreshold",
                self.final_segm_threshold,
            ));
        }

        let positive = [
            ("pectoralSmoothingSigma", self.pectoral_smoothing_sigma_mm),
            ("fastMarchingK1", self.marching_k1),
            ("fastMarchingK2", self.marching_k2),
            ("fastMarchingTime", self.marching_time),
            ("textureFeatureSigma", self.texture_sigma_mm),
            (
                "pectoralControlPointSpacing",
                self.pectoral_control_point_spacing_mm,
            ),
            (
                "pronesupineCropDistancePastSternum",
                self.crop_dist_post_midsternum_mm,
            ),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(ConfigError::NonPositiveParameter(name, v));
            }
        }
        if !(self.coil_crop_distance_mm.is_finite() && self.coil_crop_distance_mm >= 0.0) {
            return Err(ConfigError::NonPositiveParameter(
                "coilCropDistance",
                self.coil_crop_distance_mm,
            ));
        }

        let seed = self.seed_or_default(structural.shape());
        if !structural.check(&seed) {
            return Err(ConfigError::SeedOutOfBounds(seed));
        }
        Ok(())
    }
}
