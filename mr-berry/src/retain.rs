//! 诊断中间体的保留钩子.
//!
//! 流水线的每个阶段完成后, 会把自己的中间产物以借用形式交给调用方提供的
//! 单一回调. 不提供回调时各阶段行为完全不变 —— 回调只拿到共享借用,
//! 无法影响流水线结果.

use crate::bgnd::{Histogram, RayleighFit};
use crate::data::{ElevationMap, MrMask, MrScan};
use crate::fitting::ControlPointSurface;
use crate::Idx3d;

/// 单个被保留的中间产物, 按来源阶段打标.
#[derive(Debug)]
#[non_exhaustive]
pub enum Retained<'a> {
    /// 预平滑后的结构像.
    SmoothedStructural(&'a MrScan),

    /// 预平滑后的脂肪抑制像.
    SmoothedFatSat(&'a MrScan),

    /// 体素级最大值合成像.
    MaxImage(&'a MrScan),

    /// 灰度闭运算后的合成像.
    ClosedMaxImage(&'a MrScan),

    /// 合成像直方图.
    Histogram(&'a Histogram),

    /// 空气峰的 Rayleigh 拟合曲线.
    RayleighFit(&'a RayleighFit),

    /// 直方图减去拟合后的残差 CDF (与直方图的 bin 一一对应).
    ResidualCdf(&'a [f64]),

    /// 背景分割掩膜 (前景 = 组织).
    BackgroundMask(&'a MrMask),

    /// 前侧皮肤表面高程图.
    SkinElevationMap(&'a ElevationMap),

    /// 只含躯干 (不含乳房) 的皮肤表面掩膜.
    TorsoSkinMask(&'a MrMask),

    /// 胸壁表面点集, `(z, h, w)` 格式.
    ChestSurfacePoints(&'a [Idx3d]),

    /// 梯度幅值图.
    GradientMagnitude(&'a MrScan),

    /// sigmoid 速度图.
    SpeedImage(&'a MrScan),

    /// 快速行进到达时间图 (未到达处为 `f32::INFINITY`).
    ArrivalTimes(&'a MrScan),

    /// 到达时间阈值化得到的胸大肌掩膜.
    PectoralMask(&'a MrMask),

    /// 胸大肌边界的拟合表面.
    PectoralSurface(&'a ControlPointSurface),

    /// 皮肤边界的拟合表面 (仅在启用拟合表面裁剪时产生).
    FittedSkinSurface(&'a ControlPointSurface),
}

/// 保留钩子类型. `None` 表示不保留任何中间体.
pub type RetainHook<'a> = &'a mut dyn FnMut(Retained<'_>);

/// 有钩子时才构造并发送中间体. 构造闭包懒执行, 不保留时零开销.
#[inline]
pub(crate) fn emit<'h, 'b, F>(hook: &mut Option<RetainHook<'h>>, make: F)
where
    F: FnOnce() -> Retained<'b>,
{
    if let Some(h) = hook.as_mut() {
        h(make());
    }
}
