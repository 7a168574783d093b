//! 基于直方图百分位的强度重标定.
//!
//! 不同扫描仪输出的 MR 强度没有统一量纲. 在分割开始前,
//! 把结构像按 `[p0, p98]` 百分位线性映射到 `[0, 100]`,
//! 可以让后续的直方图拟合与梯度参数 (K1/K2) 在不同输入之间可迁移.

use crate::consts::defaults;
use crate::data::{MrScan, VolumeHeaderAttr};

/// 求给定强度序列的 `pct` 百分位 (0 <= pct <= 100).
///
/// 非有限值被忽略. 序列为空时返回 `None`.
pub(crate) fn percentile(values: &mut Vec<f32>, pct: f64) -> Option<f32> {
    debug_assert!((0.0..=100.0).contains(&pct));
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f32::total_cmp);
    let rank = (pct / 100.0 * (values.len() - 1) as f64).round() as usize;
    Some(values[rank])
}

/// 把扫描强度按 `[0, 98]` 百分位线性映射到 `[0, 100]`, 返回新扫描.
///
/// 超出上百分位的强度被钳到上限. 全体强度相同 (映射退化) 时返回全零扫描,
/// 由下游的直方图退化检查接手.
pub fn rescale_to_unit_range(scan: &MrScan) -> MrScan {
    let mut values: Vec<f32> = scan.data().iter().copied().collect();
    let lower = percentile(&mut values, 0.0).unwrap_or(0.0);
    let upper = percentile(&mut values, defaults::RESCALE_UPPER_PERCENTILE).unwrap_or(0.0);

    let span = upper - lower;
    let data = if span > 0.0 {
        let limit = defaults::RESCALE_UPPER_LIMIT;
        scan.data()
            .mapv(|v| (((v - lower) / span) * limit).clamp(0.0, limit))
    } else {
        scan.data().mapv(|_| 0.0)
    };
    MrScan::with_geometry_of(scan, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_percentile() {
        let mut v: Vec<f32> = (0..=100).map(|i| i as f32).collect();
        assert_eq!(percentile(&mut v, 0.0), Some(0.0));
        assert_eq!(percentile(&mut v, 50.0), Some(50.0));
        assert_eq!(percentile(&mut v, 100.0), Some(100.0));
    }

    #[test]
    fn test_rescale_range() {
        let data = Array3::from_shape_fn((4, 5, 5), |(z, h, w)| (z * 25 + h * 5 + w) as f32);
        let scan = MrScan::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3]);
        let rescaled = rescale_to_unit_range(&scan);

        let (lo, hi) = rescaled.min_max();
        assert_eq!(lo, 0.0);
        assert_eq!(hi, 100.0);
    }

    #[test]
    fn test_rescale_degenerate_input() {
        let scan = MrScan::from_parts(
            Array3::from_elem((3, 3, 3), 7.5),
            [1.0, 1.0, 1.0],
            [0.0; 3],
        );
        let rescaled = rescale_to_unit_range(&scan);
        assert_eq!(rescaled.min_max(), (0.0, 0.0));
    }
}
