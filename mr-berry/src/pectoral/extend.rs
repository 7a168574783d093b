//! 基于纹理特征的胸大肌横向扩展.
//!
//! 波前传播会在胸大肌外侧的弱边缘处提前停住. 若调用方提供了预计算的
//! 纹理特征体, 则把与已判定肌肉的众数纹理类足够相似的体素沿左右方向
//! 吸收进掩膜, 修正传播的横向边界.

use std::collections::VecDeque;

use crate::consts::gray::MASK_PECTORAL;
use crate::data::{MrMask, MrScan, VolumeHeaderAttr};

/// 计算掩膜覆盖下纹理类的众数.
///
/// 纹理特征体素值是离散类标号 (以浮点存储), 四舍五入后统计.
/// 掩膜为空时返回 `None`.
fn modal_texture_class(mask: &MrMask, texture: &MrScan) -> Option<f32> {
    use std::collections::HashMap;

    let mut counts: HashMap<i64, usize> = HashMap::with_capacity(32);
    for (pos, p) in mask.data().indexed_iter() {
        if *p == MASK_PECTORAL {
            let class = texture[pos].round() as i64;
            *counts.entry(class).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(class, n)| (n, -class)) // 并列时取小类号, 保证稳定.
        .map(|(class, _)| class as f32)
}

/// 对掩膜做横向 (左右方向) 纹理相似扩展, 就地修改并返回新增体素数.
///
/// `criterion` 是相似度判据: 体素纹理类与肌肉众数类之差不超过它才会被吸收.
pub fn extend_laterally(mask: &mut MrMask, texture: &MrScan, criterion: f32) -> usize {
    debug_assert!(mask.same_geometry(texture));

    let Some(modal) = modal_texture_class(mask, texture) else {
        return 0;
    };

    let mut frontier: VecDeque<_> = mask
        .filter_pos(|p| p == MASK_PECTORAL)
        .into_iter()
        .collect();
    let mut added = 0usize;

    while let Some((z, h, w)) = frontier.pop_front() {
        // 只向左右两个方向扩展.
        for next in [(z, h, w.wrapping_sub(1)), (z, h, w.saturating_add(1))] {
            if !mask.check(&next) || mask[next] == MASK_PECTORAL {
                continue;
            }
            if (texture[next].round() - modal).abs() <= criterion {
                mask[next] = MASK_PECTORAL;
                added += 1;
                frontier.push_back(next);
            }
        }
    }
    added
}
