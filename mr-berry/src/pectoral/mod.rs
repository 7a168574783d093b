//! 胸大肌边界提取.
//!
//! 流程: 梯度幅值 → sigmoid 速度场 → 从胸壁种子做波前传播 →
//! 到达时间阈值化成胸大肌掩膜 → (可选) 纹理横向扩展 → 逐列提取
//! 最靠前的肌肉体素作为胸壁边界点云.

mod extend;
mod gradient;
mod march;
mod speed;

pub use extend::extend_laterally;
pub use gradient::gradient_magnitude;
pub use march::propagate;
pub use speed::sigmoid_speed;

use crate::consts::defaults;
use crate::consts::gray::MASK_PECTORAL;
use crate::data::{MrMask, MrScan, VolumeHeaderAttr};
use crate::error::StageError;
use crate::landmarks::Landmark;
use crate::Idx3d;

/// 掩膜体素数低于该值视为退化 (波前没有走出种子邻域).
const MIN_PECTORAL_VOXELS: usize = 8;

/// 由胸骨中点地标推出胸壁种子: 沿前后方向向后偏移固定距离.
///
/// 偏移后越界时钳到最后一层. 胸大肌紧贴胸骨后方, 种子落在肌肉内部附近
/// 即可, 波前传播对种子的精确位置不敏感.
pub fn seed_from_mid_sternum<V: VolumeHeaderAttr>(volume: &V, sternum: &Landmark) -> Idx3d {
    let (z, h, w) = sternum.index;
    let offset = (defaults::PECTORAL_SEED_OFFSET_MM / volume.height_mm()).round() as usize;
    let nh = volume.shape().1;
    (z, (h + offset).min(nh - 1), w)
}

/// 把到达时间图按停止时间阈值化为胸大肌掩膜.
///
/// 到达时间不超过 `stop_time` 的体素标为 `MASK_PECTORAL`.
/// 退化 (近空) 掩膜返回 [`StageError::EmptyPectoralMask`],
/// 绝不把退化结果静默传给下游.
pub fn threshold_arrival(arrival: &MrScan, stop_time: f64) -> Result<MrMask, StageError> {
    let mut mask = MrMask::zeros_like(arrival);
    let mut reached = 0usize;
    for (pos, t) in arrival.data().indexed_iter() {
        if *t as f64 <= stop_time {
            mask[pos] = MASK_PECTORAL;
            reached += 1;
        }
    }
    if reached < MIN_PECTORAL_VOXELS {
        return Err(StageError::EmptyPectoralMask { reached });
    }
    Ok(mask)
}

/// 逐列提取胸壁边界点云: 每个 `(z, w)` 列最靠前的肌肉体素.
pub fn chest_surface_points(pectoral: &MrMask) -> Vec<Idx3d> {
    let (nz, nh, nw) = pectoral.shape();
    let mut points = Vec::with_capacity(nz * nw / 4);

    for (z, sli) in pectoral.slice_iter().enumerate() {
        for w in 0..nw {
            for h in 0..nh {
                if sli[(h, w)] == MASK_PECTORAL {
                    points.push((z, h, w));
                    break;
                }
            }
        }
    }
    points
}
