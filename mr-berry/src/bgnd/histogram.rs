//! 合成像强度直方图.

use crate::data::MrScan;

/// 直方图的 bin 个数. 强度重标定后的量程是 `[0, 100]`, 每个 bin 约宽 1.
pub(crate) const HISTOGRAM_BINS: usize = 100;

/// 判定直方图退化的单 bin 质量占比.
const DEGENERATE_MASS: f64 = 0.95;

/// 等宽强度直方图.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f64,
    bin_width: f64,
    freq: Vec<f64>,
}

impl Histogram {
    /// 统计扫描全体强度, 构建 `n_bins` 个等宽 bin 的直方图.
    ///
    /// 非有限强度被忽略. `n_bins` 为 0 时程序 panic.
    pub fn from_scan(scan: &MrScan, n_bins: usize) -> Self {
        assert_ne!(n_bins, 0, "直方图至少需要一个 bin");

        let (lo, hi) = scan.min_max();
        let (lo, hi) = (lo as f64, hi as f64);
        let span = hi - lo;

        let mut freq = vec![0.0f64; n_bins];
        if span <= 0.0 {
            // 全体强度相同: 所有质量堆进第一个 bin, 由退化检查接手.
            freq[0] = scan.data().iter().filter(|v| v.is_finite()).count() as f64;
            return Self {
                min: lo,
                bin_width: 1.0,
                freq,
            };
        }

        let bin_width = span / n_bins as f64;
        for v in scan.data().iter().copied().filter(|v| v.is_finite()) {
            let bin = (((v as f64 - lo) / bin_width) as usize).min(n_bins - 1);
            freq[bin] += 1.0;
        }
        Self {
            min: lo,
            bin_width,
            freq,
        }
    }

    /// bin 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.freq.len()
    }

    /// 直方图是否为空 (没有 bin)?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    /// 第 `i` 个 bin 的中心强度.
    #[inline]
    pub fn center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.bin_width
    }

    /// 强度量程下界.
    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// bin 宽度.
    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// 各 bin 频数.
    #[inline]
    pub fn freq(&self) -> &[f64] {
        &self.freq
    }

    /// 总频数.
    #[inline]
    pub fn total(&self) -> f64 {
        self.freq.iter().sum()
    }

    /// 频数最大的 bin 下标.
    pub fn mode_bin(&self) -> usize {
        self.freq
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// 非空 bin 个数.
    pub fn occupied_bins(&self) -> usize {
        self.freq.iter().filter(|f| **f > 0.0).count()
    }

    /// 直方图是否退化 (接近单 bin)?
    ///
    /// 当几乎全部质量集中于一个 bin 时, Rayleigh 拟合没有意义,
    /// 阈值估计必须钳到安全默认值而不是报错失败.
    pub fn is_degenerate(&self) -> bool {
        let total = self.total();
        if total <= 0.0 || self.occupied_bins() <= 1 {
            return true;
        }
        self.freq[self.mode_bin()] / total >= DEGENERATE_MASS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MrScan;
    use ndarray::Array3;

    #[test]
    fn test_histogram_counts_all_voxels() {
        let data = Array3::from_shape_fn((2, 4, 4), |(_, h, w)| (h * 4 + w) as f32);
        let scan = MrScan::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3]);
        let hist = Histogram::from_scan(&scan, 16);

        assert_eq!(hist.total(), 32.0);
        assert!(!hist.is_degenerate());
        // 每个强度出现两次, 16 个 bin 均非空.
        assert_eq!(hist.occupied_bins(), 16);
    }

    #[test]
    fn test_histogram_single_value_is_degenerate() {
        let scan = MrScan::from_parts(
            Array3::from_elem((3, 3, 3), 5.0),
            [1.0, 1.0, 1.0],
            [0.0; 3],
        );
        let hist = Histogram::from_scan(&scan, 32);
        assert!(hist.is_degenerate());
        assert_eq!(hist.total(), 27.0);
    }
}
