//! 前侧皮肤表面提取.
//!
//! 对每个 `(z, w)` 列从前侧 (`h == 0`) 向后扫描, 第一个前景体素的 `h`
//! 即该列的皮肤高程. 乳房向前隆起, 对应列的高程显著小于同一切片的
//! 高程中位数; 据此可以把躯干 (不含乳房) 的皮肤单独分离出来.

use crate::consts::gray::{is_foreground, MASK_BOUNDARY};
use crate::data::{ElevationMap, MrMask, VolumeHeaderAttr};

/// 躯干皮肤判定: 高程比切片中位数靠前超过该距离 (单位: 毫米) 的列视为乳房.
const TORSO_OFFSET_MM: f64 = 10.0;

/// 计算前侧皮肤表面高程图.
///
/// 每列恰好产生一个条目; 全背景的列用哨兵占位.
pub fn elevation_of_anterior_surface(foreground: &MrMask) -> ElevationMap {
    let (nz, nh, nw) = foreground.shape();
    let mut map = ElevationMap::empty((nz, nw));

    for (z, sli) in foreground.slice_iter().enumerate() {
        for w in 0..nw {
            for h in 0..nh {
                if is_foreground(sli[(h, w)]) {
                    map.set((z, w), h);
                    break;
                }
            }
        }
    }
    map
}

/// 从高程图分离躯干 (不含乳房) 的皮肤表面掩膜.
///
/// 皮肤体素以 `MASK_BOUNDARY` 标记. 高程比所在切片的高程中位数
/// 靠前 (小) 超过 [`TORSO_OFFSET_MM`] 的列被视为乳房隆起, 不参与输出.
pub fn torso_skin_mask(foreground: &MrMask, elevation: &ElevationMap) -> MrMask {
    let h_mm = foreground.height_mm();
    let mut mask = MrMask::zeros_like(foreground);

    let (nz, _) = elevation.shape();
    for z in 0..nz {
        let Some(median) = elevation.slice_median(z) else {
            continue;
        };
        let anterior_limit = median as f64 - TORSO_OFFSET_MM / h_mm;

        for ((ez, w), h) in elevation.iter_defined().filter(|((ez, _), _)| *ez == z) {
            if (h as f64) >= anterior_limit {
                mask[(ez, h, w)] = MASK_BOUNDARY;
            }
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::MASK_BREAST;
    use ndarray::Array3;

    /// 平坦胸壁 (h >= 10) 加上一个向前突出到 h = 2 的 "乳房" 方块.
    fn phantom() -> MrMask {
        let mut data = Array3::<u8>::zeros((8, 16, 16));
        for z in 0..8 {
            for h in 10..16 {
                for w in 0..16 {
                    data[(z, h, w)] = MASK_BREAST;
                }
            }
        }
        for z in 2..6 {
            for h in 2..10 {
                for w in 4..8 {
                    data[(z, h, w)] = MASK_BREAST;
                }
            }
        }
        MrMask::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3])
    }

    #[test]
    fn test_elevation_map_finds_most_anterior() {
        let mask = phantom();
        let map = elevation_of_anterior_surface(&mask);

        assert_eq!(map.shape(), (8, 16));
        assert_eq!(map.count_defined(), 8 * 16);
        assert_eq!(map.get((0, 0)), Some(10));
        assert_eq!(map.get((3, 5)), Some(2)); // 隆起列
    }

    #[test]
    fn test_torso_skin_excludes_bulge() {
        let mask = phantom();
        let map = elevation_of_anterior_surface(&mask);
        let skin = torso_skin_mask(&mask, &map);

        // 平坦胸壁列保留.
        assert_eq!(skin[(0, 10, 0)], MASK_BOUNDARY);
        // 隆起列 (高程 2, 中位数 10, 差 8 毫米 < 10 毫米) 依然保留;
        // 把隆起加深到超过判据再验证剔除.
        assert_eq!(skin[(3, 2, 5)], MASK_BOUNDARY);

        // 胸壁后移到 h >= 13, 隆起伸到 h == 0: 差 13 毫米, 超过判据, 应被剔除.
        let mut data = Array3::<u8>::zeros((8, 16, 16));
        for z in 0..8 {
            for h in 13..16 {
                for w in 0..16 {
                    data[(z, h, w)] = MASK_BREAST;
                }
            }
        }
        for z in 2..6 {
            for w in 4..8 {
                for h in 0..16 {
                    data[(z, h, w)] = MASK_BREAST;
                }
            }
        }
        let deep = MrMask::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3]);
        let map = elevation_of_anterior_surface(&deep);
        let skin = torso_skin_mask(&deep, &map);
        assert_eq!(skin[(3, 0, 5)], 0);
        assert_eq!(skin[(0, 13, 0)], MASK_BOUNDARY);
    }
}
