//! 控制点表面的最小二乘拟合实现.

use ndarray::{Array1, Array2};
use ndarray_linalg::Solve;

use crate::error::StageError;

/// 拟合至少需要的边界点数.
pub(crate) const MIN_SURFACE_POINTS: usize = 16;

/// 平滑正则权重 (乘以点数/控制点数之后作为二阶差分罚项系数).
const SMOOTHNESS_WEIGHT: f64 = 0.5;

/// 规则网格控制点表面.
///
/// 控制点按配置的平面内间距布成 `(z, w)` 规则网格, 每个控制点持有一个
/// 高度 (前后方向坐标, 单位: 毫米). 表面在任意平面内坐标处可求值,
/// 求值用双线性插值, 网格外按边界钳制.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPointSurface {
    spacing_mm: f64,
    heights: Array2<f64>,
}

impl ControlPointSurface {
    /// 控制点间距 (单位: 毫米).
    #[inline]
    pub fn spacing_mm(&self) -> f64 {
        self.spacing_mm
    }

    /// 控制点网格形状 `(z 方向个数, w 方向个数)`.
    #[inline]
    pub fn grid_shape(&self) -> (usize, usize) {
        self.heights.dim()
    }

    /// 在平面内坐标 `(z_mm, w_mm)` 处求表面高度 (单位: 毫米).
    pub fn eval(&self, z_mm: f64, w_mm: f64) -> f64 {
        let (nz, nw) = self.heights.dim();
        let u = (z_mm / self.spacing_mm).clamp(0.0, (nz - 1) as f64);
        let v = (w_mm / self.spacing_mm).clamp(0.0, (nw - 1) as f64);

        let (i0, j0) = (u.floor() as usize, v.floor() as usize);
        let (i1, j1) = ((i0 + 1).min(nz - 1), (j0 + 1).min(nw - 1));
        let (fu, fv) = (u - i0 as f64, v - j0 as f64);

        let h = &self.heights;
        (1.0 - fu) * (1.0 - fv) * h[(i0, j0)]
            + (1.0 - fu) * fv * h[(i0, j1)]
            + fu * (1.0 - fv) * h[(i1, j0)]
            + fu * fv * h[(i1, j1)]
    }

    /// 相邻控制点间二阶差分绝对值的最大值, 用于检查平滑性.
    pub fn max_second_difference(&self) -> f64 {
        let (nz, nw) = self.heights.dim();
        let mut ans = 0.0f64;
        for i in 0..nz {
            for j in 1..nw.saturating_sub(1) {
                let d = self.heights[(i, j - 1)] - 2.0 * self.heights[(i, j)]
                    + self.heights[(i, j + 1)];
                ans = ans.max(d.abs());
            }
        }
        for j in 0..nw {
            for i in 1..nz.saturating_sub(1) {
                let d = self.heights[(i - 1, j)] - 2.0 * self.heights[(i, j)]
                    + self.heights[(i + 1, j)];
                ans = ans.max(d.abs());
            }
        }
        ans
    }
}

/// 把边界点云拟合成控制点表面.
///
/// # 参数
///
/// 1. `points`: `(z_mm, w_mm, h_mm)` 格式的边界点, 平面内坐标非负.
/// 2. `extent_mm`: 平面内量程 `(z 方向, w 方向)`, 决定网格覆盖范围.
/// 3. `spacing_mm`: 控制点间距, 必须为正.
///
/// 最小化 "各点到表面的平方距离之和 + 平滑罚项 (控制点二阶差分的平方和)".
/// 点数不足或正规方程奇异时返回 [`StageError::UnderdeterminedSurfaceFit`].
pub fn fit_surface(
    points: &[(f64, f64, f64)],
    extent_mm: (f64, f64),
    spacing_mm: f64,
) -> Result<ControlPointSurface, StageError> {
    assert!(spacing_mm > 0.0, "控制点间距必须为正");

    if points.len() < MIN_SURFACE_POINTS {
        return Err(StageError::UnderdeterminedSurfaceFit {
            points: points.len(),
            needed: MIN_SURFACE_POINTS,
        });
    }

    let nz = (extent_mm.0 / spacing_mm).ceil() as usize + 1;
    let nw = (extent_mm.1 / spacing_mm).ceil() as usize + 1;
    let n_ctrl = nz * nw;
    let at = |i: usize, j: usize| i * nw + j;

    // 正规方程: (A^T A + lambda R) c = A^T h.
    let mut m = Array2::<f64>::zeros((n_ctrl, n_ctrl));
    let mut rhs = Array1::<f64>::zeros(n_ctrl);

    for (pz, pw, ph) in points {
        let u = (pz / spacing_mm).clamp(0.0, (nz - 1) as f64);
        let v = (pw / spacing_mm).clamp(0.0, (nw - 1) as f64);
        let (i0, j0) = (u.floor() as usize, v.floor() as usize);
        let (i1, j1) = ((i0 + 1).min(nz - 1), (j0 + 1).min(nw - 1));
        let (fu, fv) = (u - i0 as f64, v - j0 as f64);

        let weights = [
            (at(i0, j0), (1.0 - fu) * (1.0 - fv)),
            (at(i0, j1), (1.0 - fu) * fv),
            (at(i1, j0), fu * (1.0 - fv)),
            (at(i1, j1), fu * fv),
        ];
        for (a, wa) in weights {
            rhs[a] += wa * ph;
            for (b, wb) in weights {
                m[(a, b)] += wa * wb;
            }
        }
    }

    // 二阶差分罚项, 沿两个网格方向.
    let lambda = SMOOTHNESS_WEIGHT * points.len() as f64 / n_ctrl as f64;
    let mut add_penalty = |a: usize, b: usize, c: usize| {
        let idx = [(a, 1.0), (b, -2.0), (c, 1.0)];
        for (p, cp) in idx {
            for (q, cq) in idx {
                m[(p, q)] += lambda * cp * cq;
            }
        }
    };
    for i in 0..nz {
        for j in 1..nw.saturating_sub(1) {
            add_penalty(at(i, j - 1), at(i, j), at(i, j + 1));
        }
    }
    for j in 0..nw {
        for i in 1..nz.saturating_sub(1) {
            add_penalty(at(i - 1, j), at(i, j), at(i + 1, j));
        }
    }

    let solution = m
        .solve(&rhs)
        .map_err(|_| StageError::UnderdeterminedSurfaceFit {
            points: points.len(),
            needed: MIN_SURFACE_POINTS,
        })?;
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(StageError::UnderdeterminedSurfaceFit {
            points: points.len(),
            needed: MIN_SURFACE_POINTS,
        });
    }

    let heights = Array2::from_shape_vec((nz, nw), solution.to_vec()).unwrap();
    Ok(ControlPointSurface {
        spacing_mm,
        heights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 在平面 `h = 20 + 0.1 z + 0.05 w` 上采样一批点.
    fn plane_points(noise: f64) -> Vec<(f64, f64, f64)> {
        let mut points = Vec::new();
        for i in 0..12 {
            for j in 0..12 {
                let (z, w) = (i as f64 * 10.0, j as f64 * 10.0);
                // 确定性的 "噪声".
                let e = noise * if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
                points.push((z, w, 20.0 + 0.1 * z + 0.05 * w + e));
            }
        }
        points
    }

    #[test]
    fn test_fit_recovers_plane() {
        let surface = fit_surface(&plane_points(0.0), (110.0, 110.0), 30.0).unwrap();
        for (z, w) in [(0.0, 0.0), (55.0, 40.0), (110.0, 110.0)] {
            let expect = 20.0 + 0.1 * z + 0.05 * w;
            assert!(
                (surface.eval(z, w) - expect).abs() < 0.5,
                "({z}, {w}): {} vs {expect}",
                surface.eval(z, w)
            );
        }
    }

    #[test]
    fn test_fit_smooths_noise() {
        let surface = fit_surface(&plane_points(4.0), (110.0, 110.0), 30.0).unwrap();
        // 有界曲率: 平面加对称噪声的拟合结果接近平面, 二阶差分受正则约束.
        assert!(surface.max_second_difference() < 4.0);

        let mid = surface.eval(55.0, 55.0);
        let expect = 20.0 + 0.1 * 55.0 + 0.05 * 55.0;
        assert!((mid - expect).abs() < 2.0);
    }

    #[test]
    fn test_fit_rejects_too_few_points() {
        let points = vec![(0.0, 0.0, 1.0); 5];
        let err = fit_surface(&points, (10.0, 10.0), 5.0).unwrap_err();
        assert!(matches!(
            err,
            StageError::UnderdeterminedSurfaceFit { points: 5, needed: _ }
        ));
    }

    #[test]
    fn test_eval_clamps_outside_grid() {
        let surface = fit_surface(&plane_points(0.0), (110.0, 110.0), 30.0).unwrap();
        let inside = surface.eval(0.0, 0.0);
        let outside = surface.eval(-50.0, -50.0);
        assert!((inside - outside).abs() < 1e-9);
    }
}
