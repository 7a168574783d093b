//! 表面拟合.
//!
//! 给定一批 `(z, w, 高度)` 边界点, 该模块可以拟合出一张平滑的控制点表面.
//! 胸大肌边界与皮肤边界的拟合共用同一套算法, 只是输入点云不同.

mod surface;

pub use surface::{fit_surface, ControlPointSurface};

use crate::data::VolumeHeaderAttr;
use crate::Idx3d;

/// 把体素索引点云转换为拟合输入: `(z_mm, w_mm, h_mm)`.
pub fn points_to_mm<V: VolumeHeaderAttr>(volume: &V, points: &[Idx3d]) -> Vec<(f64, f64, f64)> {
    let [z_mm, h_mm, w_mm] = volume.pix_dim();
    points
        .iter()
        .map(|(z, h, w)| (*z as f64 * z_mm, *w as f64 * w_mm, *h as f64 * h_mm))
        .collect()
}

/// 体数据平面内量程 `(z 方向毫米数, w 方向毫米数)`.
pub fn plane_extent_mm<V: VolumeHeaderAttr>(volume: &V) -> (f64, f64) {
    let (nz, _, nw) = volume.shape();
    let [z_mm, _, w_mm] = volume.pix_dim();
    ((nz - 1) as f64 * z_mm, (nw - 1) as f64 * w_mm)
}
