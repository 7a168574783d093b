//! 背景区域生长.
//!
//! 从空气中的种子出发, 对合成像做 6-连通的连通阈值生长, 把与种子连通的
//! 低强度区域判为背景, 其余体素判为前景组织. 被组织完全包裹的气腔
//! 不与外部空气连通, 因此会保留为前景, 这与连通阈值分割的语义一致.

use std::collections::VecDeque;

use ndarray::Array3;

use crate::consts::gray::MASK_BREAST;
use crate::data::{MrMask, MrScan, VolumeHeaderAttr};
use crate::error::StageError;
use crate::Idx3d;

/// 分割背景, 返回前景掩膜 (组织 = `MASK_BREAST`).
///
/// `threshold` 为强度阈值: 低于它的体素才可能被判为空气.
/// 种子的合法性 (不越界) 由配置校验保证; 种子落在组织上时返回
/// [`StageError::SeedInForeground`].
pub fn segment_background(
    composite: &MrScan,
    seed: Idx3d,
    threshold: f32,
) -> Result<MrMask, StageError> {
    assert!(composite.check(&seed), "种子必须已通过配置校验");

    if composite[seed] >= threshold {
        return Err(StageError::SeedInForeground {
            seed,
            intensity: composite[seed],
        });
    }

    let shape = composite.shape();
    let mut air = Array3::<bool>::from_elem(shape, false);
    let mut frontier = VecDeque::with_capacity(1024);

    air[seed] = true;
    frontier.push_back(seed);
    while let Some(pos) = frontier.pop_front() {
        for next in diamond_neighbours(shape, pos) {
            if !air[next] && composite[next] < threshold {
                air[next] = true;
                frontier.push_back(next);
            }
        }
    }

    let mut mask = MrMask::zeros_like(composite);
    for (pos, is_air) in air.indexed_iter() {
        if !*is_air {
            mask[pos] = MASK_BREAST;
        }
    }
    Ok(mask)
}

/// 获取 `pos` 前后上下左右六个点中不越界的坐标.
fn diamond_neighbours((sz, sh, sw): Idx3d, (z, h, w): Idx3d) -> impl Iterator<Item = Idx3d> {
    [
        (z.wrapping_sub(1), h, w),
        (z.saturating_add(1), h, w),
        (z, h.wrapping_sub(1), w),
        (z, h.saturating_add(1), w),
        (z, h, w.wrapping_sub(1)),
        (z, h, w.saturating_add(1)),
    ]
    .into_iter()
    .filter(move |(a, b, c)| *a < sz && *b < sh && *c < sw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::*;
    use ndarray::Array3;

    fn scan_with_box() -> MrScan {
        // 8^3 空气中放一个 3^3 亮方块.
        let mut data = Array3::<f32>::zeros((8, 8, 8));
        for z in 3..6 {
            for h in 3..6 {
                for w in 3..6 {
                    data[(z, h, w)] = 50.0;
                }
            }
        }
        MrScan::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3])
    }

    #[test]
    fn test_grow_separates_box_from_air() {
        let scan = scan_with_box();
        let mask = segment_background(&scan, (0, 0, 0), 10.0).unwrap();

        assert_eq!(mask.count(MASK_BREAST), 27);
        assert!(is_breast(mask[(4, 4, 4)]));
        assert!(is_background(mask[(0, 0, 0)]));
    }

    #[test]
    fn test_enclosed_cavity_stays_foreground() {
        let mut scan = scan_with_box();
        // 方块中心挖一个暗腔: 不与外部空气连通, 应保留为前景.
        scan[(4, 4, 4)] = 0.0;
        let mask = segment_background(&scan, (0, 0, 0), 10.0).unwrap();

        assert!(is_breast(mask[(4, 4, 4)]));
        assert_eq!(mask.count(MASK_BREAST), 27);
    }

    #[test]
    fn test_seed_on_tissue_is_an_error() {
        let scan = scan_with_box();
        let err = segment_background(&scan, (4, 4, 4), 10.0).unwrap_err();
        assert!(matches!(err, StageError::SeedInForeground { .. }));
    }
}
