//! 乳房掩膜组装.
//!
//! 从背景分割的前景中去掉拟合胸大肌表面后方 (含肌肉本身) 的体素,
//! 再对剩余的二值掩膜做高斯平滑并按最终阈值重新二值化, 以圆化边角:
//! 阈值小于 0.5 时扩张掩膜, 大于 0.5 时收缩掩膜. 无论阈值如何,
//! 组装结果永远是背景分割前景的子集 —— 组装绝不添加先前被排除的组织.

use ndarray::{Array3, Zip};

use crate::config::BreastSide;
use crate::consts::gray::{is_breast, is_foreground, MASK_BREAST};
use crate::data::{MrMask, MrScan, VolumeHeaderAttr};
use crate::fitting::ControlPointSurface;
use crate::smooth::gaussian_smooth;

/// 组装输出: 合并掩膜与可选的左右分侧掩膜.
#[derive(Debug, Clone)]
pub struct BreastMasks {
    /// 双侧合并的乳房掩膜.
    pub union: MrMask,

    /// 左乳掩膜 (仅在配置要求时产生).
    pub left: Option<MrMask>,

    /// 右乳掩膜 (仅在配置要求时产生).
    pub right: Option<MrMask>,

    /// 实际使用的正中矢状列.
    pub mid_sagittal: usize,
}

/// 去掉拟合胸大肌表面后方与肌肉本身的体素, 得到乳房候选掩膜.
fn anterior_of_surface(
    foreground: &MrMask,
    pectoral: &MrMask,
    surface: &ControlPointSurface,
) -> MrMask {
    let (nz, nh, nw) = foreground.shape();
    let [z_mm, h_mm, w_mm] = foreground.pix_dim();

    let mut out = MrMask::zeros_like(foreground);
    for z in 0..nz {
        for w in 0..nw {
            let limit_mm = surface.eval(z as f64 * z_mm, w as f64 * w_mm);
            for h in 0..nh {
                let pos = (z, h, w);
                if is_foreground(foreground[pos])
                    && !is_foreground(pectoral[pos])
                    && (h as f64 * h_mm) < limit_mm
                {
                    out[pos] = MASK_BREAST;
                }
            }
        }
    }
    out
}

/// 平滑 + 重新阈值化.
///
/// 把二值掩膜视为 0/1 浮点场做高斯平滑, 再与 `threshold` 比较.
/// 结果与前景求交, 保证子集性质.
fn smooth_and_rethreshold(
    candidate: &MrMask,
    foreground: &MrMask,
    sigma_mm: f64,
    threshold: f32,
) -> MrMask {
    let field = Array3::from_shape_fn(candidate.shape(), |pos| {
        if is_foreground(candidate[pos]) {
            1.0f32
        } else {
            0.0
        }
    });
    let smoothed = gaussian_smooth(&MrScan::with_geometry_of(candidate, field), sigma_mm);

    let data = Zip::from(smoothed.data())
        .and(foreground.data())
        .map_collect(|s, f| {
            if *s >= threshold && is_foreground(*f) {
                MASK_BREAST
            } else {
                0
            }
        });
    MrMask::with_geometry_of(candidate, data)
}

/// 把合并掩膜限制到一侧并保留最大连通分量.
fn extract_side(union: &MrMask, side: BreastSide, mid_sagittal: usize) -> MrMask {
    let (_, _, nw) = union.shape();
    let cols = side.columns(mid_sagittal, nw);

    let mut mask = union.clone();
    for mut sli in mask.slice_iter_mut() {
        let (sh, sw) = sli.shape();
        for h in 0..sh {
            for w in (0..sw).filter(|w| !cols.contains(w)) {
                sli[(h, w)] = 0;
            }
        }
    }
    mask.retain_largest_component(MASK_BREAST);
    mask
}

/// 组装最终乳房掩膜.
///
/// `mid_sagittal` 为 `None` 时取组装后掩膜质心所在列.
#[allow(clippy::too_many_arguments)]
pub fn assemble_breast_masks(
    foreground: &MrMask,
    pectoral: &MrMask,
    surface: &ControlPointSurface,
    final_threshold: f32,
    sigma_mm: f64,
    mid_sagittal: Option<usize>,
    want_left: bool,
    want_right: bool,
) -> BreastMasks {
    let candidate = anterior_of_surface(foreground, pectoral, surface);
    let union = smooth_and_rethreshold(&candidate, foreground, sigma_mm, final_threshold);

    let mid_sagittal = mid_sagittal.unwrap_or_else(|| {
        union
            .foreground_centroid()
            .map(|c| c[2].round() as usize)
            .unwrap_or(union.shape().2 / 2)
    });

    let left = want_left.then(|| extract_side(&union, BreastSide::Left, mid_sagittal));
    let right = want_right.then(|| extract_side(&union, BreastSide::Right, mid_sagittal));

    BreastMasks {
        union,
        left,
        right,
        mid_sagittal,
    }
}

/// 掩膜是否是另一掩膜的子集 (逐体素蕴含)?
pub fn is_subset_of(inner: &MrMask, outer: &MrMask) -> bool {
    debug_assert_eq!(inner.shape(), outer.shape());
    inner
        .data()
        .iter()
        .zip(outer.data().iter())
        .all(|(a, b)| !is_breast(*a) || is_foreground(*b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::fit_surface;
    use ndarray::Array3;

    /// 前景: 两个靠前的方块 (乳房) + 一个靠后的平板 (胸壁组织).
    fn phantom() -> (MrMask, MrMask, ControlPointSurface) {
        let (nz, nh, nw) = (12, 24, 24);
        let mut fg = Array3::<u8>::zeros((nz, nh, nw));
        // 胸壁组织: h >= 16.
        for z in 0..nz {
            for h in 16..nh {
                for w in 0..nw {
                    fg[(z, h, w)] = MASK_BREAST;
                }
            }
        }
        // 两个乳房方块: h in 4..16.
        for z in 3..9 {
            for h in 4..16 {
                for w in [3usize, 16] {
                    for dw in 0..5 {
                        fg[(z, h, w + dw)] = MASK_BREAST;
                    }
                }
            }
        }
        let foreground = MrMask::from_parts(fg, [1.0, 1.0, 1.0], [0.0; 3]);

        // 胸大肌掩膜: h in 16..20 的一层.
        let mut pec = Array3::<u8>::zeros((nz, nh, nw));
        for z in 0..nz {
            for h in 16..20 {
                for w in 0..nw {
                    pec[(z, h, w)] = crate::consts::gray::MASK_PECTORAL;
                }
            }
        }
        let pectoral = MrMask::from_parts(pec, [1.0, 1.0, 1.0], [0.0; 3]);

        // 拟合表面: 平面 h = 16.
        let mut points = Vec::new();
        for z in 0..nz {
            for w in 0..nw {
                points.push((z as f64, w as f64, 16.0));
            }
        }
        let surface = fit_surface(&points, (11.0, 23.0), 6.0).unwrap();
        (foreground, pectoral, surface)
    }

    #[test]
    fn test_assembled_mask_is_subset_of_foreground() {
        let (fg, pec, surface) = phantom();
        let masks = assemble_breast_masks(&fg, &pec, &surface, 0.45, 2.0, None, true, true);

        assert!(is_subset_of(&masks.union, &fg));
        assert!(masks.union.count(MASK_BREAST) > 0);
        // 表面后方的胸壁组织被去掉.
        assert_eq!(masks.union[(5, 20, 5)], 0);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let (fg, pec, surface) = phantom();
        let mut last = usize::MAX;
        for t in [0.1f32, 0.3, 0.5, 0.7, 0.9] {
            let masks = assemble_breast_masks(&fg, &pec, &surface, t, 2.0, None, false, false);
            let count = masks.union.count(MASK_BREAST);
            assert!(count <= last, "t = {t}: {count} > {last}");
            last = count;
        }
    }

    #[test]
    fn test_side_masks_partition_union() {
        let (fg, pec, surface) = phantom();
        let masks = assemble_breast_masks(&fg, &pec, &surface, 0.45, 2.0, None, true, true);

        let (left, right) = (masks.left.unwrap(), masks.right.unwrap());
        assert_eq!(
            left.count(MASK_BREAST) + right.count(MASK_BREAST),
            masks.union.count(MASK_BREAST)
        );

        // 两侧质心分别落在正中矢状面两侧.
        let lc = left.foreground_centroid().unwrap();
        let rc = right.foreground_centroid().unwrap();
        assert!(lc[2] >= masks.mid_sagittal as f64);
        assert!(rc[2] < masks.mid_sagittal as f64);
    }
}
