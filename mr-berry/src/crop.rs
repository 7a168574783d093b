//! 掩膜裁剪.
//!
//! 三个互相独立、可自由组合的裁剪器, 逐个作用在组装好的掩膜上:
//! 拟合皮肤表面裁剪、线圈距离裁剪和胸骨中点后方裁剪.
//! 每个裁剪器都接收不可变输入并产出全新掩膜.

use crate::consts::gray::is_foreground;
use crate::data::{ElevationMap, MrMask, VolumeHeaderAttr};
use crate::error::StageError;
use crate::fitting::{fit_surface, plane_extent_mm, ControlPointSurface};
use crate::landmarks::Landmark;

/// 拟合皮肤表面时允许的前向容差 (单位: 毫米).
///
/// 最小二乘表面会在乳房隆起处低估高程; 容差保证隆起顶端不被误裁.
const FITTED_SURFACE_TOLERANCE_MM: f64 = 5.0;

/// 用皮肤高程图拟合外表面.
///
/// 与胸大肌表面共用同一套拟合算法, 仅输入点云不同 (皮肤边界而非胸壁边界).
pub fn fit_skin_surface(
    mask: &MrMask,
    elevation: &ElevationMap,
    spacing_mm: f64,
) -> Result<ControlPointSurface, StageError> {
    let [z_mm, h_mm, w_mm] = mask.pix_dim();
    let points: Vec<(f64, f64, f64)> = elevation
        .iter_defined()
        .map(|((z, w), h)| (z as f64 * z_mm, w as f64 * w_mm, h as f64 * h_mm))
        .collect();
    fit_surface(&points, plane_extent_mm(mask), spacing_mm)
}

/// 拟合表面裁剪: 去掉拟合皮肤表面前方 (表面高程减容差之外) 的体素.
///
/// 皮肤之外的高强度伪影 (线圈、手臂等) 位于拟合表面前方, 被整体裁掉.
pub fn crop_with_fitted_surface(mask: &MrMask, surface: &ControlPointSurface) -> MrMask {
    let (nz, nh, nw) = mask.shape();
    let [z_mm, h_mm, w_mm] = mask.pix_dim();

    let mut out = mask.clone();
    for z in 0..nz {
        for w in 0..nw {
            let limit_mm =
                surface.eval(z as f64 * z_mm, w as f64 * w_mm) - FITTED_SURFACE_TOLERANCE_MM;
            for h in 0..nh {
                if (h as f64 * h_mm) < limit_mm {
                    out[(z, h, w)] = 0;
                }
            }
        }
    }
    out
}

/// 线圈距离裁剪: 去掉紧贴后侧图像边界、厚度为 `distance_mm` 的冠状平板.
///
/// 体素到后侧边界面的距离按 `(nh - 1 - h) * h_mm` 计算, 严格小于
/// `distance_mm` 的体素被去除; 恰好位于 `distance_mm` 处的体素保留.
pub fn crop_coil_distance(mask: &MrMask, distance_mm: f64) -> MrMask {
    debug_assert!(distance_mm >= 0.0);

    let (nz, nh, nw) = mask.shape();
    let h_mm = mask.height_mm();

    let mut out = mask.clone();
    for z in 0..nz {
        for h in 0..nh {
            if (nh - 1 - h) as f64 * h_mm < distance_mm {
                for w in 0..nw {
                    out[(z, h, w)] = 0;
                }
            }
        }
    }
    out
}

/// 胸骨中点后方裁剪: 去掉比胸骨中点冠状面更靠后超过 `distance_mm` 的体素.
///
/// 恰好位于边界 (到胸骨冠状面的后向距离等于 `distance_mm`) 的体素保留.
/// 该裁剪依赖已检出的胸骨中点地标 —— 这是显式的跨阶段顺序约束.
pub fn crop_posterior_to_sternum(
    mask: &MrMask,
    mid_sternum: &Landmark,
    distance_mm: f64,
) -> MrMask {
    debug_assert!(distance_mm >= 0.0);

    let (nz, nh, nw) = mask.shape();
    let h_mm = mask.height_mm();
    let sternum_h = mid_sternum.index.1;

    let mut out = mask.clone();
    for h in 0..nh {
        let posterior_mm = (h as f64 - sternum_h as f64) * h_mm;
        if posterior_mm > distance_mm {
            for z in 0..nz {
                for w in 0..nw {
                    out[(z, h, w)] = 0;
                }
            }
        }
    }
    out
}

/// 裁剪器只会去除体素, 绝不添加: 输出是输入的子集.
#[allow(dead_code)]
fn crop_never_adds(before: &MrMask, after: &MrMask) -> bool {
    before
        .data()
        .iter()
        .zip(after.data().iter())
        .all(|(b, a)| !is_foreground(*a) || is_foreground(*b))
}
