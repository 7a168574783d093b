//! sigmoid 速度场.

use crate::data::MrScan;

/// 把梯度幅值图映射为快速行进速度场.
///
/// 采用单调递减的 sigmoid: `speed = 1 / (1 + exp(-(g - beta) / alpha))`,
/// 其中 `alpha = (k2 - k1) / 6`, `beta = (k1 + k2) / 2`. `k1` 是待分割
/// 结构轮廓上的最小梯度, `k2` 是结构内部的平均梯度; 映射后均匀组织内
/// (`g ~ k2`) 速度接近 1, 强边缘上 (`g ~ k1`) 速度接近 0.
///
/// 要求 `k1 > k2`, 否则程序 panic.
pub fn sigmoid_speed(gradient: &MrScan, k1: f32, k2: f32) -> MrScan {
    assert!(k1 > k2, "K1 (轮廓最小梯度) 必须大于 K2 (内部平均梯度)");

    let alpha = (k2 - k1) as f64 / 6.0; // 负值: 梯度越大速度越小.
    let beta = (k1 + k2) as f64 / 2.0;

    let data = gradient
        .data()
        .mapv(|g| (1.0 / (1.0 + (-((g as f64) - beta) / alpha).exp())) as f32);
    MrScan::with_geometry_of(gradient, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::VolumeHeaderAttr;
    use ndarray::Array3;

    fn speed_of(g: f32) -> f32 {
        let scan = MrScan::from_parts(Array3::from_elem((1, 1, 1), g), [1.0; 3], [0.0; 3]);
        sigmoid_speed(&scan, 15.0, 7.5)[(0, 0, 0)]
    }

    #[test]
    fn test_speed_is_monotone_decreasing() {
        let speeds: Vec<f32> = [0.0, 5.0, 7.5, 11.25, 15.0, 30.0]
            .into_iter()
            .map(speed_of)
            .collect();
        assert!(speeds.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_speed_near_extremes() {
        // 内部平均梯度处速度接近 1, 轮廓最小梯度处接近 0, 中点恰为 0.5.
        assert!(speed_of(7.5) > 0.9);
        assert!(speed_of(15.0) < 0.1);
        assert!((speed_of(11.25) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_speed_keeps_geometry() {
        let scan = MrScan::from_parts(Array3::zeros((2, 3, 4)), [2.0, 1.0, 1.0], [0.0; 3]);
        let speed = sigmoid_speed(&scan, 15.0, 7.5);
        assert!(speed.same_geometry(&scan));
    }
}
