//! 低强度 (空气/噪声) 峰的 Rayleigh 分布拟合.
//!
//! MR 背景噪声的幅值服从 Rayleigh 分布, 其密度形状
//! `g(x; sigma) = x / sigma^2 * exp(-x^2 / (2 sigma^2))` 只有一个形状参数,
//! 众数恰好位于 `x = sigma`. 对给定 sigma, 幅值有最小二乘闭式解,
//! 因此整个拟合化为对 sigma 的一维最小化, 用黄金分割搜索完成.

use super::Histogram;
use crate::error::StageError;

/// 黄金分割搜索的迭代次数上限.
const MAX_ITERATIONS: u32 = 64;

/// 拟合区间上界相对初始 sigma 的倍数. 只有空气峰附近的 bin 参与拟合.
const FIT_RANGE_SIGMA: f64 = 3.0;

/// Rayleigh 密度形状 (未乘幅值).
#[inline]
fn rayleigh_shape(x: f64, sigma: f64) -> f64 {
    let s2 = sigma * sigma;
    x / s2 * (-x * x / (2.0 * s2)).exp()
}

/// 空气峰的 Rayleigh 拟合结果.
#[derive(Debug, Clone, PartialEq)]
pub struct RayleighFit {
    /// 形状参数 (等于分布众数).
    pub sigma: f64,

    /// 幅值.
    pub amplitude: f64,

    /// 每个直方图 bin 中心处的拟合值, 与直方图 bin 一一对应.
    pub values: Vec<f64>,

    /// 拟合区间上的残差平方和.
    pub sse: f64,
}

impl RayleighFit {
    /// 在 `x` 处求拟合曲线值.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.amplitude * rayleigh_shape(x, self.sigma)
    }
}

/// 对给定 sigma 求最小二乘幅值与残差平方和.
///
/// 幅值的正规方程是一维的: `amp = sum(f_i g_i) / sum(g_i^2)`.
fn amplitude_and_sse(hist: &Histogram, fit_bins: usize, sigma: f64) -> (f64, f64) {
    let (mut fg, mut gg) = (0.0f64, 0.0f64);
    for i in 0..fit_bins {
        let g = rayleigh_shape(hist.center(i), sigma);
        fg += hist.freq()[i] * g;
        gg += g * g;
    }
    if gg <= 0.0 {
        return (0.0, f64::INFINITY);
    }
    let amp = fg / gg;

    let mut sse = 0.0;
    for i in 0..fit_bins {
        let r = hist.freq()[i] - amp * rayleigh_shape(hist.center(i), sigma);
        sse += r * r;
    }
    (amp, sse)
}

/// 对直方图的低强度峰做单参数 Rayleigh 最小二乘拟合.
///
/// 调用方必须先排除退化直方图. 拟合失败 (幅值非正或残差非有限) 时
/// 返回 [`StageError::RayleighFitDiverged`].
pub fn fit_rayleigh(hist: &Histogram) -> Result<RayleighFit, StageError> {
    debug_assert!(!hist.is_degenerate());

    // 空气峰通常就是全局众数; 以它为 sigma 初值.
    let sigma0 = hist.center(hist.mode_bin()).max(hist.bin_width());
    let fit_limit = hist.min() + FIT_RANGE_SIGMA * sigma0;
    let fit_bins = (0..hist.len())
        .take_while(|i| hist.center(*i) <= fit_limit)
        .count()
        .max(3)
        .min(hist.len());

    // 黄金分割搜索 sigma.
    const PHI: f64 = 0.618_033_988_749_894_8;
    let (mut lo, mut hi) = (0.3 * sigma0, 3.0 * sigma0);
    let mut iterations = 0u32;
    while iterations < MAX_ITERATIONS && (hi - lo) > 1e-6 * sigma0 {
        let m1 = hi - PHI * (hi - lo);
        let m2 = lo + PHI * (hi - lo);
        let (_, sse1) = amplitude_and_sse(hist, fit_bins, m1);
        let (_, sse2) = amplitude_and_sse(hist, fit_bins, m2);
        if sse1 <= sse2 {
            hi = m2;
        } else {
            lo = m1;
        }
        iterations += 1;
    }

    let sigma = 0.5 * (lo + hi);
    let (amplitude, sse) = amplitude_and_sse(hist, fit_bins, sigma);
    if !(amplitude > 0.0 && sse.is_finite()) {
        return Err(StageError::RayleighFitDiverged { iterations });
    }

    let values = (0..hist.len())
        .map(|i| amplitude * rayleigh_shape(hist.center(i), sigma))
        .collect();
    Ok(RayleighFit {
        sigma,
        amplitude,
        values,
        sse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MrScan;
    use ndarray::Array3;

    /// 采样一个近似 Rayleigh 的强度场: 用逆 CDF 把均匀格点映射过去.
    fn rayleigh_scan(sigma: f64) -> MrScan {
        let n = 24usize;
        let total = (n * n * n) as f64;
        let data = Array3::from_shape_fn((n, n, n), |(z, h, w)| {
            let u = ((z * n * n + h * n + w) as f64 + 0.5) / total;
            // Rayleigh 逆 CDF.
            (sigma * (-2.0 * (1.0 - u).ln()).sqrt()) as f32
        });
        MrScan::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3])
    }

    #[test]
    fn test_fit_recovers_sigma() {
        let scan = rayleigh_scan(8.0);
        let hist = Histogram::from_scan(&scan, 64);
        assert!(!hist.is_degenerate());

        let fit = fit_rayleigh(&hist).unwrap();
        // 直方图离散化会带来偏差, 容忍 15%.
        assert!(
            (fit.sigma - 8.0).abs() / 8.0 < 0.15,
            "sigma = {}",
            fit.sigma
        );
        assert!(fit.amplitude > 0.0);
    }

    #[test]
    fn test_fit_values_follow_mode() {
        let scan = rayleigh_scan(5.0);
        let hist = Histogram::from_scan(&scan, 64);
        let fit = fit_rayleigh(&hist).unwrap();

        // 拟合曲线的最大值应落在众数附近.
        let peak = fit
            .values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        let expect = hist.mode_bin();
        assert!(peak.abs_diff(expect) <= 3, "peak {peak} vs mode {expect}");
    }
}
