//! 背景阈值估计与背景分割.
//!
//! 估计流程: 直方图 → 空气峰 Rayleigh 拟合 → 残差 CDF → 取配置概率的
//! 穿越点作为强度阈值. 估计只进行一次, 结果在下游各阶段复用且不可变.

mod histogram;
mod rayleigh;
mod region_grow;

pub use histogram::Histogram;
pub use rayleigh::RayleighFit;
pub use region_grow::segment_background;

pub(crate) use histogram::HISTOGRAM_BINS;

use itertools::izip;

use crate::error::StageError;

/// 背景阈值. 概率与派生强度一经计算即不可变.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundThreshold {
    /// 残差 CDF 的穿越概率, 在 (0, 1) 内.
    pub probability: f32,

    /// 派生出的强度阈值: 低于该强度的体素才可能是空气.
    pub intensity: f32,

    /// 是否因直方图退化而钳到了安全默认值.
    pub clamped: bool,
}

/// 阈值估计的完整输出.
#[derive(Debug, Clone)]
pub struct ThresholdEstimate {
    /// 阈值本体.
    pub threshold: BackgroundThreshold,

    /// Rayleigh 拟合 (退化路径上为 `None`).
    pub fit: Option<RayleighFit>,

    /// 组织-空气残差的 CDF, 与直方图 bin 一一对应 (退化路径上为空).
    pub cdf: Vec<f64>,
}

/// 退化直方图的安全默认: 阈值取 `min + 1` 个量纲单位.
///
/// 对全空气的均匀体而言, 所有体素强度都严格低于该默认阈值,
/// 区域生长会把整个体判为背景, 最终掩膜为空.
#[inline]
fn clamped_default(hist: &Histogram, probability: f32) -> ThresholdEstimate {
    ThresholdEstimate {
        threshold: BackgroundThreshold {
            probability,
            intensity: (hist.min() + 1.0) as f32,
            clamped: true,
        },
        fit: None,
        cdf: vec![],
    }
}

/// 估计背景阈值.
///
/// `crossing` 是残差 CDF 的穿越概率 (用户覆盖值或自动默认).
/// 退化 (接近单 bin) 的直方图钳到安全默认值而不是失败;
/// 真正的拟合发散才返回错误.
pub fn estimate_threshold(
    hist: &Histogram,
    crossing: f32,
) -> Result<ThresholdEstimate, StageError> {
    debug_assert!(crossing > 0.0 && crossing < 1.0);

    if hist.is_degenerate() {
        return Ok(clamped_default(hist, crossing));
    }

    let fit = rayleigh::fit_rayleigh(hist)?;

    // 残差 = 直方图减去空气峰拟合, 负值截断为 0.
    let residual: Vec<f64> = izip!(hist.freq(), &fit.values)
        .map(|(f, g)| (f - g).max(0.0))
        .collect();
    let total: f64 = residual.iter().sum();
    if total <= 0.0 {
        // 拟合吃掉了全部质量: 没有可辨认的组织峰, 同样走安全默认.
        return Ok(clamped_default(hist, crossing));
    }

    let mut cdf = Vec::with_capacity(residual.len());
    let mut acc = 0.0f64;
    for r in &residual {
        acc += r;
        cdf.push(acc / total);
    }

    let crossing_bin = cdf
        .iter()
        .position(|p| *p >= crossing as f64)
        .unwrap_or(cdf.len() - 1);

    // 阈值不允许越过组织强度众数.
    let tissue_mode = residual
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    let bin = crossing_bin.min(tissue_mode);

    Ok(ThresholdEstimate {
        threshold: BackgroundThreshold {
            probability: crossing,
            intensity: hist.center(bin) as f32,
            clamped: false,
        },
        fit: Some(fit),
        cdf,
    })
}
