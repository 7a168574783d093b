//! 梯度幅值计算.

use ndarray::{Array3, Zip};

use crate::data::{MrScan, VolumeHeaderAttr};

/// 计算三维梯度幅值图.
///
/// 内部用中心差分, 边界处退化为单侧差分; 各轴差分按毫米分辨率归一,
/// 因此幅值的量纲是 "强度每毫米", 与 K1/K2 参数直接可比.
pub fn gradient_magnitude(scan: &MrScan) -> MrScan {
    let (nz, nh, nw) = scan.shape();
    let [z_mm, h_mm, w_mm] = scan.pix_dim();
    let data = scan.data();

    let mut out = Array3::<f32>::zeros((nz, nh, nw));

    let compute = |(z, h, w): (usize, usize, usize)| -> f32 {
        // 某轴上的中心/单侧差分.
        let diff = |lo: f32, hi: f32, steps: f64, mm: f64| -> f64 {
            (hi - lo) as f64 / (steps * mm)
        };

        let (z0, z1) = (z.saturating_sub(1), (z + 1).min(nz - 1));
        let (h0, h1) = (h.saturating_sub(1), (h + 1).min(nh - 1));
        let (w0, w1) = (w.saturating_sub(1), (w + 1).min(nw - 1));

        let gz = diff(data[(z0, h, w)], data[(z1, h, w)], (z1 - z0) as f64, z_mm);
        let gh = diff(data[(z, h0, w)], data[(z, h1, w)], (h1 - h0) as f64, h_mm);
        let gw = diff(data[(z, h, w0)], data[(z, h, w1)], (w1 - w0) as f64, w_mm);
        ((gz * gz + gh * gh + gw * gw).sqrt()) as f32
    };

    let zip = Zip::indexed(&mut out);
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(|pos, o| *o = compute(pos));
        } else {
            zip.for_each(|pos, o| *o = compute(pos));
        }
    }
    MrScan::with_geometry_of(scan, out)
}
