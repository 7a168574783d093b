//! 解剖地标检测.
//!
//! 三个地标 (左右乳头与胸骨中点) 都直接取自高程图几何:
//! 乳头是各半边最靠前的皮肤点, 胸骨中点是正中矢状搜索带内最靠前的皮肤点.
//! 除分区域取全局极值外没有任何假阳性抑制 —— 这是记录在案的局限,
//! 不在此处悄悄 "修复".

use ordered_float::NotNan;

use crate::config::BreastSide;
use crate::consts::defaults;
use crate::data::{ElevationMap, MrMask, VolumeHeaderAttr};
use crate::error::LandmarkKind;
use crate::Idx3d;

/// 单个地标: 体素索引与派生的世界坐标. 一经计算即不可变.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Landmark {
    /// 体素索引, `(z, h, w)` 格式.
    pub index: Idx3d,

    /// 世界坐标 `(x, y, z)`, 单位: 毫米.
    pub world: [f64; 3],
}

/// 三个地标的集合. 字段为 `None` 表示对应搜索区域内没有候选.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Landmarks {
    /// 左乳头.
    pub left_nipple: Option<Landmark>,

    /// 右乳头.
    pub right_nipple: Option<Landmark>,

    /// 胸骨中点.
    pub mid_sternum: Option<Landmark>,
}

impl Landmarks {
    /// 按种类取地标.
    #[inline]
    pub fn get(&self, kind: LandmarkKind) -> Option<Landmark> {
        match kind {
            LandmarkKind::LeftNipple => self.left_nipple,
            LandmarkKind::RightNipple => self.right_nipple,
            LandmarkKind::MidSternum => self.mid_sternum,
        }
    }
}

/// 从几何元信息构建地标.
#[inline]
fn landmark_at<V: VolumeHeaderAttr>(volume: &V, index: Idx3d) -> Landmark {
    Landmark {
        index,
        world: volume.index_to_world(index),
    }
}

/// 在给定列集合中找最靠前 (高程最小) 的皮肤点.
///
/// 迭代顺序固定为 z 升序、w 升序, 并列时取最先出现者, 保证结果稳定.
fn most_anterior<I>(elevation: &ElevationMap, columns: I, h_mm: f64) -> Option<Idx3d>
where
    I: Iterator<Item = (usize, usize)>,
{
    columns
        .filter_map(|(z, w)| elevation.get((z, w)).map(|h| (z, h, w)))
        .min_by_key(|(_, h, _)| NotNan::new(*h as f64 * h_mm).unwrap())
}

/// 检测某一侧的乳头候选.
pub fn find_nipple(
    foreground: &MrMask,
    elevation: &ElevationMap,
    side: BreastSide,
    mid_sagittal: usize,
) -> Option<Landmark> {
    let (nz, nw) = elevation.shape();
    let cols = side.columns(mid_sagittal, nw);
    let it = (0..nz).flat_map(move |z| cols.clone().map(move |w| (z, w)));
    most_anterior(elevation, it, foreground.height_mm()).map(|idx| landmark_at(foreground, idx))
}

/// 检测胸骨中点候选.
///
/// 搜索带为 `|w - mid| * w_mm <= 带半宽` 的正中矢状列.
pub fn find_mid_sternum(
    foreground: &MrMask,
    elevation: &ElevationMap,
    mid_sagittal: usize,
) -> Option<Landmark> {
    let (nz, nw) = elevation.shape();
    let w_mm = foreground.width_mm();
    let half_band = (defaults::MIDLINE_BAND_HALF_WIDTH_MM / w_mm).ceil() as usize;
    let lo = mid_sagittal.saturating_sub(half_band);
    let hi = (mid_sagittal + half_band + 1).min(nw);

    let it = (0..nz).flat_map(move |z| (lo..hi).map(move |w| (z, w)));
    most_anterior(elevation, it, foreground.height_mm()).map(|idx| landmark_at(foreground, idx))
}

/// 一次性检测全部三个地标.
pub fn find_landmarks(
    foreground: &MrMask,
    elevation: &ElevationMap,
    mid_sagittal: usize,
) -> Landmarks {
    Landmarks {
        left_nipple: find_nipple(foreground, elevation, BreastSide::Left, mid_sagittal),
        right_nipple: find_nipple(foreground, elevation, BreastSide::Right, mid_sagittal),
        mid_sternum: find_mid_sternum(foreground, elevation, mid_sagittal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::MASK_BREAST;
    use crate::skin::elevation_of_anterior_surface;
    use ndarray::Array3;

    /// 胸壁在 h >= 12, 两个隆起分别伸到 h = 3 (右, w=6) 和 h = 2 (左, w=18).
    fn phantom() -> MrMask {
        let mut data = Array3::<u8>::zeros((10, 16, 24));
        for z in 0..10 {
            for h in 12..16 {
                for w in 0..24 {
                    data[(z, h, w)] = MASK_BREAST;
                }
            }
        }
        for (w0, top) in [(5usize, 3usize), (17, 2)] {
            for z in 4..7 {
                for h in top..12 {
                    for w in w0..w0 + 3 {
                        data[(z, h, w)] = MASK_BREAST;
                    }
                }
            }
        }
        MrMask::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3])
    }

    #[test]
    fn test_nipples_found_on_each_side() {
        let mask = phantom();
        let map = elevation_of_anterior_surface(&mask);

        let left = find_nipple(&mask, &map, BreastSide::Left, 12).unwrap();
        let right = find_nipple(&mask, &map, BreastSide::Right, 12).unwrap();

        assert_eq!(left.index.1, 2);
        assert!(left.index.2 >= 17 && left.index.2 < 20);
        assert_eq!(right.index.1, 3);
        assert!(right.index.2 >= 5 && right.index.2 < 8);
    }

    #[test]
    fn test_mid_sternum_on_midline() {
        let mask = phantom();
        let map = elevation_of_anterior_surface(&mask);

        // 正中带 (w = 12 +- 10 体素) 内最靠前的是... 两个隆起都在带外时取胸壁.
        let sternum = find_mid_sternum(&mask, &map, 12).unwrap();
        // 带半宽 10 毫米会覆盖到隆起; 此处验证的是确定性与前向极值本身.
        let h = sternum.index.1;
        assert!(h <= 12);
        assert_eq!(mask[sternum.index], MASK_BREAST);
    }

    #[test]
    fn test_landmark_world_roundtrip() {
        let mask = phantom();
        let map = elevation_of_anterior_surface(&mask);
        let lm = find_landmarks(&mask, &map, 12);

        for landmark in [
            lm.left_nipple.unwrap(),
            lm.right_nipple.unwrap(),
            lm.mid_sternum.unwrap(),
        ] {
            assert_eq!(mask.world_to_index(landmark.world), Some(landmark.index));
        }
    }

    #[test]
    fn test_empty_region_yields_none() {
        let data = Array3::<u8>::zeros((4, 4, 4));
        let mask = MrMask::from_parts(data, [1.0, 1.0, 1.0], [0.0; 3]);
        let map = elevation_of_anterior_surface(&mask);
        let lm = find_landmarks(&mask, &map, 2);

        assert_eq!(lm.left_nipple, None);
        assert_eq!(lm.right_nipple, None);
        assert_eq!(lm.mid_sternum, None);
    }
}
