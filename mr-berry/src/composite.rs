//! 最大值合成像与灰度闭运算.
//!
//! 结构像和脂肪抑制像配准在同一格点上, 对两者逐体素取最大值能同时保留
//! 两个序列各自的组织-空气对比. 随后的扫描线灰度闭运算用于抹平乳房内部
//! 由脂肪抑制造成的低强度孔洞, 避免背景分割从孔洞漏进组织内部.

use ndarray::{Array3, Axis, Zip};
use num::Float;

use crate::consts::defaults;
use crate::data::{MrScan, VolumeHeaderAttr};

/// 体素级最大值合成像.
///
/// 两个体的几何一致性应在流水线入口处校验; 此处只对形状断言.
pub fn max_image(structural: &MrScan, fat_sat: Option<&MrScan>) -> MrScan {
    let Some(fs) = fat_sat else {
        return structural.clone();
    };
    assert_eq!(structural.shape(), fs.shape(), "合成像输入形状不一致");

    let data = Zip::from(structural.data())
        .and(fs.data())
        .map_collect(|a, b| a.max(*b));
    MrScan::with_geometry_of(structural, data)
}

/// 对一条扫描线做半径为 `radius` 的一维灰度膨胀或腐蚀.
fn line_morph<T: Float>(line: &[T], radius: usize, out: &mut [T], dilate: bool) {
    let n = line.len();
    for (i, o) in out.iter_mut().enumerate() {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(n - 1);
        let window = &line[lo..=hi];
        *o = if dilate {
            window.iter().copied().fold(T::min_value(), T::max)
        } else {
            window.iter().copied().fold(T::max_value(), T::min)
        };
    }
}

/// 沿给定轴对整个体做一维灰度闭运算 (先膨胀后腐蚀).
fn close_axis(data: &Array3<f32>, axis: Axis, radius: usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros(data.dim());

    let zip = Zip::from(out.lanes_mut(axis)).and(data.lanes(axis));
    let op = |mut out_lane: ndarray::ArrayViewMut1<f32>, in_lane: ndarray::ArrayView1<f32>| {
        let line: Vec<f32> = in_lane.iter().copied().collect();
        let mut dilated = vec![0.0f32; line.len()];
        line_morph(&line, radius, &mut dilated, true);
        let mut closed = vec![0.0f32; line.len()];
        line_morph(&dilated, radius, &mut closed, false);
        for (o, v) in out_lane.iter_mut().zip(closed) {
            *o = v;
        }
    };

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(op);
        } else {
            zip.for_each(op);
        }
    }
    out
}

/// 扫描线灰度闭运算.
///
/// 在每个水平切片内, 分别沿行 (前后方向) 和列 (左右方向) 做有界半径的
/// 一维灰度闭运算, 然后逐体素取两个方向结果的最大值. 闭运算是扩张性的,
/// 因此输出处处不小于输入.
pub fn grey_close(scan: &MrScan, radius: usize) -> MrScan {
    assert_ne!(radius, 0, "闭运算核半径不能为 0");

    let data = scan.data().to_owned();
    let closed_h = close_axis(&data, Axis(1), radius);
    let closed_w = close_axis(&data, Axis(2), radius);

    let merged = Zip::from(&closed_h)
        .and(&closed_w)
        .map_collect(|a, b| a.max(*b));
    MrScan::with_geometry_of(scan, merged)
}

/// 合成 + 闭运算的组合入口, 使用默认核半径.
pub fn closed_max_image(structural: &MrScan, fat_sat: Option<&MrScan>) -> (MrScan, MrScan) {
    let max = max_image(structural, fat_sat);
    let closed = grey_close(&max, defaults::CLOSING_RADIUS);
    (max, closed)
}
