//! 可分离高斯平滑.
//!
//! 标准差以毫米为单位, 按各轴体素分辨率折算后分三趟一维卷积完成.
//! 趟内各扫描线互相独立, 可以并行.

use ndarray::{Array3, Axis, Zip};

use crate::data::{MrScan, VolumeHeaderAttr};

/// 构建归一化的一维高斯核. 核半径取 `ceil(3 * sigma)`.
fn gaussian_kernel(sigma_vox: f64) -> Vec<f64> {
    debug_assert!(sigma_vox > 0.0);
    let radius = (3.0 * sigma_vox).ceil() as i64;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    for i in -radius..=radius {
        let x = i as f64 / sigma_vox;
        kernel.push((-0.5 * x * x).exp());
    }
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= total);
    kernel
}

/// 沿一条扫描线做一维卷积. 边界按最近值延拓.
fn convolve_line(line: &[f32], kernel: &[f64], out: &mut [f32]) {
    let radius = (kernel.len() / 2) as i64;
    let n = line.len() as i64;
    for (i, o) in out.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for (k, coeff) in kernel.iter().enumerate() {
            let j = (i as i64 + k as i64 - radius).clamp(0, n - 1);
            acc += *coeff * line[j as usize] as f64;
        }
        *o = acc as f32;
    }
}

/// 沿给定轴做一趟一维高斯卷积.
fn smooth_axis(data: &Array3<f32>, axis: Axis, sigma_vox: f64) -> Array3<f32> {
    let kernel = gaussian_kernel(sigma_vox);
    let mut out = Array3::<f32>::zeros(data.dim());

    let zip = Zip::from(out.lanes_mut(axis)).and(data.lanes(axis));
    let op = |mut out_lane: ndarray::ArrayViewMut1<f32>, in_lane: ndarray::ArrayView1<f32>| {
        let line: Vec<f32> = in_lane.iter().copied().collect();
        let mut buf = vec![0.0f32; line.len()];
        convolve_line(&line, &kernel, &mut buf);
        for (o, v) in out_lane.iter_mut().zip(buf) {
            *o = v;
        }
    };

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(op);
        } else {
            zip.for_each(op);
        }
    }
    out
}

/// 对扫描做各向同性 (以毫米计) 的高斯平滑, 返回新扫描.
///
/// `sigma_mm` 必须为正, 否则程序 panic.
pub fn gaussian_smooth(scan: &MrScan, sigma_mm: f64) -> MrScan {
    assert!(sigma_mm > 0.0, "高斯标准差必须为正");

    let [z_mm, h_mm, w_mm] = scan.pix_dim();
    let mut data = scan.data().to_owned();
    for (axis, mm) in [(Axis(0), z_mm), (Axis(1), h_mm), (Axis(2), w_mm)] {
        data = smooth_axis(&data, axis, sigma_mm / mm);
    }
    MrScan::with_geometry_of(scan, data)
}
