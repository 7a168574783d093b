//! 波前传播 (快速行进) 求解器.
//!
//! 从种子出发, 在速度场上按到达时间从小到大扩展波前. 堆顶永远是当前
//! 最早可到达的体素, 因此满足因果不变量: 先确定的体素到达时间
//! 不大于后确定的体素. 该循环有固有的顺序依赖, 不做并行化.

use binary_heap_plus::BinaryHeap;
use ndarray::Array3;

use crate::data::{MrScan, VolumeHeaderAttr};
use crate::Idx3d;

/// 速度低于该值的体素视为不可通过, 波前不会进入.
const SPEED_FLOOR: f64 = 1e-6;

/// 堆元素: 候选到达时间与体素索引.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    time: f64,
    pos: Idx3d,
}

/// 在速度场上从 `seeds` 传播波前, 返回到达时间图.
///
/// 到达时间大于 `stop_time` 的体素不再扩展, 未到达处为 `f32::INFINITY`.
/// 越界种子由调用方预先排除, 此处 panic.
pub fn propagate(speed: &MrScan, seeds: &[Idx3d], stop_time: f64) -> MrScan {
    assert!(stop_time > 0.0, "停止时间必须为正");

    let shape = speed.shape();
    let [z_mm, h_mm, w_mm] = speed.pix_dim();
    let mut arrival = Array3::<f64>::from_elem(shape, f64::INFINITY);
    let mut settled = Array3::<bool>::from_elem(shape, false);

    // 堆顶是到达时间最小的候选.
    let mut heap: BinaryHeap<Candidate, _> =
        BinaryHeap::new_by(|a: &Candidate, b: &Candidate| b.time.total_cmp(&a.time));
    heap.reserve(64);

    for seed in seeds {
        assert!(speed.check(seed), "种子必须在数据范围内");
        arrival[*seed] = 0.0;
        heap.push(Candidate {
            time: 0.0,
            pos: *seed,
        });
    }

    while let Some(Candidate { time, pos }) = heap.pop() {
        if settled[pos] {
            continue;
        }
        if time > stop_time {
            break;
        }
        settled[pos] = true;

        let (z, h, w) = pos;
        let steps = [
            ((z.wrapping_sub(1), h, w), z_mm),
            ((z.saturating_add(1), h, w), z_mm),
            ((z, h.wrapping_sub(1), w), h_mm),
            ((z, h.saturating_add(1), w), h_mm),
            ((z, h, w.wrapping_sub(1)), w_mm),
            ((z, h, w.saturating_add(1)), w_mm),
        ];
        for (next, step_mm) in steps {
            if !speed.check(&next) || settled[next] {
                continue;
            }
            let v = speed[next] as f64;
            if v < SPEED_FLOOR {
                continue;
            }
            let t = time + step_mm / v;
            if t < arrival[next] {
                arrival[next] = t;
                heap.push(Candidate { time: t, pos: next });
            }
        }
    }

    let out = arrival.mapv(|t| if t.is_finite() { t as f32 } else { f32::INFINITY });
    MrScan::with_geometry_of(speed, out)
}
