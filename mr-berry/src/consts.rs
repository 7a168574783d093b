//! 通用常量.

/// 单通道掩膜体素值.
pub mod gray {
    /// 掩膜中背景 (空气或被裁剪区域) 的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜中乳房组织的体素值.
    pub const MASK_BREAST: u8 = 1;

    /// 掩膜中胸大肌的体素值.
    pub const MASK_PECTORAL: u8 = 2;

    /// 掩膜中组织边缘的 (预留) 体素值.
    pub const MASK_BOUNDARY: u8 = 3;

    /// 体素是否是乳房组织?
    #[inline]
    pub const fn is_breast(p: u8) -> bool {
        matches!(p, MASK_BREAST)
    }

    /// 体素是否是胸大肌?
    #[inline]
    pub const fn is_pectoral(p: u8) -> bool {
        matches!(p, MASK_PECTORAL)
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }

    /// 体素是否是边缘?
    #[inline]
    pub const fn is_boundary(p: u8) -> bool {
        matches!(p, MASK_BOUNDARY)
    }

    /// 体素是否是任意前景 (乳房, 胸大肌或边缘)?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }

    /// 体素是否是乳房或胸大肌?
    #[inline]
    pub const fn is_breast_or_pectoral(p: u8) -> bool {
        matches!(p, MASK_BREAST | MASK_PECTORAL)
    }
}

/// 流水线各阶段参数的默认值.
pub mod defaults {
    /// 最终分割阈值. 小于 0.5 会扩张掩膜, 大于 0.5 会收缩掩膜.
    pub const FINAL_SEGM_THRESHOLD: f32 = 0.45;

    /// 胸大肌掩膜平滑的高斯标准差 (单位: 毫米).
    pub const PECTORAL_SMOOTHING_SIGMA_MM: f32 = 5.0;

    /// 快速行进: 待分割结构轮廓上的最小梯度.
    pub const MARCHING_K1: f32 = 15.0;

    /// 快速行进: 结构内部的平均梯度幅值.
    pub const MARCHING_K2: f32 = 7.5;

    /// 快速行进的停止时间.
    pub const MARCHING_TIME: f32 = 5.0;

    /// 纹理特征体的尺度参数 (单位: 毫米).
    pub const TEXTURE_SIGMA_MM: f32 = 3.0;

    /// 胸大肌表面拟合的控制点间距 (单位: 毫米).
    pub const PECTORAL_CONTROL_POINT_SPACING_MM: f32 = 30.0;

    /// 线圈裁剪: 从后侧图像边界去除的冠状平板厚度 (单位: 毫米). 0 表示关闭.
    pub const COIL_CROP_DISTANCE_MM: f32 = 10.0;

    /// 俯仰卧建模裁剪: 保留到胸骨中点后方多远 (单位: 毫米).
    pub const CROP_DIST_POST_MIDSTERNUM_MM: f32 = 80.0;

    /// 输入图像预平滑的高斯标准差 (单位: 毫米). 仅在开启 `smooth` 时使用.
    pub const PRE_SMOOTH_SIGMA_MM: f32 = 1.5;

    /// 自动估计背景阈值时, 残差 CDF 的穿越概率.
    ///
    /// 残差近似组织强度分布, 穿越概率即允许落在阈值之下 (被误判为空气)
    /// 的组织质量占比.
    pub const BACKGROUND_CDF_CROSSING: f32 = 0.02;

    /// 强度重标定的上百分位. 重标定后强度落在 `[0, RESCALE_UPPER_LIMIT]`.
    pub const RESCALE_UPPER_PERCENTILE: f64 = 98.0;

    /// 强度重标定的输出上限.
    pub const RESCALE_UPPER_LIMIT: f32 = 100.0;

    /// 灰度闭运算扫描线核的半径 (单位: 体素).
    pub const CLOSING_RADIUS: usize = 7;

    /// 纹理特征横向扩展时的相似度判据 (体素值差的上界).
    pub const TEXTURE_SIMILARITY_CRITERION: f32 = 0.5;

    /// 胸骨中点地标搜索带的半宽 (单位: 毫米).
    pub const MIDLINE_BAND_HALF_WIDTH_MM: f64 = 10.0;

    /// 快速行进种子相对胸骨中点的后移量 (单位: 毫米).
    pub const PECTORAL_SEED_OFFSET_MM: f64 = 5.0;
}

/// 体素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_BACKGROUND`, 代表背景.
    Background,

    /// `MASK_{BREAST, PECTORAL, BOUNDARY}`, 代表前景.
    Foreground,
}

impl ElemType {
    /// 从掩膜体素值构建.
    #[inline]
    pub const fn from_pixel(p: u8) -> Self {
        if gray::is_background(p) {
            Self::Background
        } else {
            Self::Foreground
        }
    }

    /// 是否为前景.
    #[inline]
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Foreground)
    }

    /// 是否为背景.
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.is_foreground()
    }
}
