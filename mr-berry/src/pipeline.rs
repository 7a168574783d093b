//! 分割流水线入口.
//!
//! 各阶段都是纯函数: 不可变输入, 全新输出, 阶段间除显式传递的数据外
//! 没有共享可变状态. 任何阶段失败都会中止整次调用并报告失败的阶段与
//! 数值条件. 阶段执行顺序:
//!
//! 1. 配置与几何校验 (任何阶段执行之前);
//! 2. 强度重标定 → (可选) 高斯预平滑;
//! 3. 最大值合成 + 灰度闭运算;
//! 4. 直方图 → Rayleigh 拟合 → 背景阈值;
//! 5. 背景区域生长 → 前景掩膜;
//! 6. 皮肤高程图 + 躯干皮肤;
//! 7. 地标检测 (在胸大肌阶段之前: 胸壁种子和胸骨裁剪都依赖胸骨中点,
//!    这是规格说明中显式记录的跨阶段顺序例外);
//! 8. 胸大肌: 梯度 → 速度场 → 波前传播 → 阈值化 → (可选) 纹理扩展;
//! 9. 胸大肌表面拟合;
//! 10. 掩膜组装 (含左右分侧);
//! 11. 可组合裁剪;
//! 12. (可选) 网格提取.

use either::Either;
use log::{debug, info};

use crate::assemble::{assemble_breast_masks, BreastMasks};
use crate::bgnd::{estimate_threshold, segment_background, BackgroundThreshold, Histogram,
                  HISTOGRAM_BINS};
use crate::composite::closed_max_image;
use crate::config::SegmConfig;
use crate::consts::defaults;
use crate::crop::{crop_coil_distance, crop_posterior_to_sternum, crop_with_fitted_surface,
                  fit_skin_surface};
use crate::data::{MrMask, MrScan, VolumeHeaderAttr};
use crate::error::{ConfigError, LandmarkKind, SegmResult, StageError};
use crate::fitting::{fit_surface, plane_extent_mm, points_to_mm};
use crate::landmarks::{find_landmarks, Landmarks};
use crate::mesh::{extract_mesh, TriMesh};
use crate::pectoral::{chest_surface_points, extend_laterally, gradient_magnitude, propagate,
                      seed_from_mid_sternum, sigmoid_speed, threshold_arrival};
use crate::rescale::rescale_to_unit_range;
use crate::retain::{emit, RetainHook, Retained};
use crate::skin::{elevation_of_anterior_surface, torso_skin_mask};
use crate::smooth::gaussian_smooth;

/// 流水线输入: 必需的结构像和两个可选伴随体.
///
/// 伴随体必须与结构像配准在同一格点上, 几何不一致是硬错误,
/// 本库绝不隐式重采样.
#[derive(Debug, Clone, Copy)]
pub struct SegmInputs<'a> {
    /// 结构像 (必需).
    pub structural: &'a MrScan,

    /// 脂肪抑制像 (可选, 与结构像同几何).
    pub fat_sat: Option<&'a MrScan>,

    /// 预计算的纹理特征体 (可选, 仅用于胸大肌横向扩展).
    pub texture: Option<&'a MrScan>,
}

impl<'a> SegmInputs<'a> {
    /// 只有结构像的输入.
    #[inline]
    pub fn structural_only(structural: &'a MrScan) -> Self {
        Self {
            structural,
            fat_sat: None,
            texture: None,
        }
    }
}

/// 流水线输出.
#[derive(Debug, Clone)]
pub struct SegmOutput {
    /// 最终掩膜 (合并 + 可选左右分侧).
    pub masks: BreastMasks,

    /// 三个地标 (前景为空时全为 `None`).
    pub landmarks: Landmarks,

    /// 采用的背景阈值.
    pub threshold: BackgroundThreshold,

    /// 最终掩膜的边界网格 (仅在配置请求时构建).
    pub mesh: Option<TriMesh>,
}

/// 校验输入几何: 伴随体必须与结构像同格点.
fn validate_inputs(inputs: &SegmInputs) -> Result<(), ConfigError> {
    if let Some(fs) = inputs.fat_sat {
        if !inputs.structural.same_geometry(fs) {
            return Err(ConfigError::GeometryMismatch("fat-saturated"));
        }
    }
    if let Some(tex) = inputs.texture {
        if !inputs.structural.same_geometry(tex) {
            return Err(ConfigError::GeometryMismatch("texture-feature"));
        }
    }
    Ok(())
}

/// 按配置决定是否预平滑; 返回持有或借用的扫描.
fn maybe_smooth<'a>(scan: &'a MrScan, config: &SegmConfig) -> Either<MrScan, &'a MrScan> {
    if config.smooth {
        Either::Left(gaussian_smooth(
            scan,
            defaults::PRE_SMOOTH_SIGMA_MM as f64,
        ))
    } else {
        Either::Right(scan)
    }
}

/// 全前景为空时的提前返回: 空掩膜 + 全空地标.
///
/// 均匀的全空气体 (场景 A) 走这条路径: 任何阈值下最终掩膜都为空,
/// 这不是错误.
fn empty_output(
    structural: &MrScan,
    threshold: BackgroundThreshold,
    config: &SegmConfig,
) -> SegmOutput {
    let union = MrMask::zeros_like(structural);
    let mid = structural.shape().2 / 2;
    SegmOutput {
        masks: BreastMasks {
            left: config.left_breast.then(|| union.clone()),
            right: config.right_breast.then(|| union.clone()),
            union,
            mid_sagittal: mid,
        },
        landmarks: Landmarks::default(),
        threshold,
        mesh: config.extract_mesh.then(TriMesh::default),
    }
}

/// 运行完整分割流水线.
///
/// `retain` 是唯一的诊断保留钩子; 传 `None` 时不保留任何中间体,
/// 且保留与否不改变任何流水线结果.
pub fn segment(
    inputs: SegmInputs<'_>,
    config: &SegmConfig,
    mut retain: Option<RetainHook<'_>>,
) -> SegmResult<SegmOutput> {
    // 阶段 0: 所有校验先于任何阶段执行.
    validate_inputs(&inputs)?;
    config.validate(inputs.structural)?;

    let verbose = config.verbose;
    macro_rules! stage {
        ($($arg: tt)*) => {
            if verbose {
                info!($($arg)*);
            }
        };
    }

    // 阶段 1: 强度重标定.
    stage!("rescaling input intensities to [0, {}]", defaults::RESCALE_UPPER_LIMIT);
    let structural = rescale_to_unit_range(inputs.structural);
    let fat_sat = inputs.fat_sat.map(rescale_to_unit_range);

    // 阶段 2: 可选预平滑.
    let structural = maybe_smooth(&structural, config);
    let structural: &MrScan = structural.as_ref().either(|o| o, |b| *b);
    let fat_sat = fat_sat.as_ref().map(|fs| maybe_smooth(fs, config));
    let fat_sat: Option<&MrScan> = fat_sat.as_ref().map(|e| e.as_ref().either(|o| o, |b| *b));
    if config.smooth {
        stage!("pre-smoothed inputs with sigma {} mm", defaults::PRE_SMOOTH_SIGMA_MM);
        emit(&mut retain, || Retained::SmoothedStructural(structural));
        if let Some(fs) = fat_sat {
            emit(&mut retain, || Retained::SmoothedFatSat(fs));
        }
    }

    // 阶段 3: 最大值合成 + 灰度闭运算.
    stage!("building composite maximum image");
    let (max, closed) = closed_max_image(structural, fat_sat);
    emit(&mut retain, || Retained::MaxImage(&max));
    emit(&mut retain, || Retained::ClosedMaxImage(&closed));

    // 阶段 4: 背景阈值估计.
    stage!("estimating background threshold");
    let hist = Histogram::from_scan(&closed, HISTOGRAM_BINS);
    emit(&mut retain, || Retained::Histogram(&hist));
    let estimate = estimate_threshold(&hist, config.background_crossing())?;
    if let Some(fit) = &estimate.fit {
        emit(&mut retain, || Retained::RayleighFit(fit));
    }
    if !estimate.cdf.is_empty() {
        emit(&mut retain, || Retained::ResidualCdf(&estimate.cdf));
    }
    let threshold = estimate.threshold;
    debug!(
        "background threshold: probability {}, intensity {}{}",
        threshold.probability,
        threshold.intensity,
        if threshold.clamped { " (clamped)" } else { "" }
    );

    // 阶段 5: 背景区域生长.
    let seed = config.seed_or_default(structural.shape());
    stage!("segmenting background from seed {:?}", seed);
    let foreground = segment_background(&closed, seed, threshold.intensity)?;
    emit(&mut retain, || Retained::BackgroundMask(&foreground));

    if foreground.count_foreground() == 0 {
        stage!("foreground is empty: returning empty masks");
        return Ok(empty_output(inputs.structural, threshold, config));
    }

    // 阶段 6: 皮肤高程图与躯干皮肤.
    stage!("computing anterior skin elevation map");
    let elevation = elevation_of_anterior_surface(&foreground);
    emit(&mut retain, || Retained::SkinElevationMap(&elevation));
    let torso = torso_skin_mask(&foreground, &elevation);
    emit(&mut retain, || Retained::TorsoSkinMask(&torso));

    // 阶段 7: 地标检测 (胸大肌阶段之前, 见模块文档).
    let provisional_mid = config.mid_sagittal.unwrap_or_else(|| {
        foreground
            .foreground_centroid()
            .map(|c| c[2].round() as usize)
            .unwrap_or(foreground.shape().2 / 2)
    });
    stage!("detecting landmarks around mid-sagittal column {}", provisional_mid);
    let landmarks = find_landmarks(&foreground, &elevation, provisional_mid);
    let Some(mid_sternum) = landmarks.mid_sternum else {
        return Err(StageError::LandmarkNotFound(LandmarkKind::MidSternum).into());
    };

    // 阶段 8: 胸大肌边界.
    stage!("segmenting pectoral muscle by front propagation");
    let gradient = gradient_magnitude(structural);
    emit(&mut retain, || Retained::GradientMagnitude(&gradient));
    let speed = sigmoid_speed(&gradient, config.marching_k1, config.marching_k2);
    emit(&mut retain, || Retained::SpeedImage(&speed));

    let pec_seed = seed_from_mid_sternum(structural, &mid_sternum);
    let arrival = propagate(&speed, &[pec_seed], config.marching_time as f64);
    emit(&mut retain, || Retained::ArrivalTimes(&arrival));
    let mut pectoral = threshold_arrival(&arrival, config.marching_time as f64)?;

    if config.extend_pectoral_laterally {
        if let Some(texture) = inputs.texture {
            let added = extend_laterally(
                &mut pectoral,
                texture,
                defaults::TEXTURE_SIMILARITY_CRITERION,
            );
            debug!("lateral texture extension added {added} voxels");
        }
    }
    emit(&mut retain, || Retained::PectoralMask(&pectoral));

    // 阶段 9: 胸大肌表面拟合.
    stage!("fitting pectoral surface");
    let chest_points = chest_surface_points(&pectoral);
    emit(&mut retain, || Retained::ChestSurfacePoints(&chest_points));
    let pec_surface = fit_surface(
        &points_to_mm(structural, &chest_points),
        plane_extent_mm(structural),
        config.pectoral_control_point_spacing_mm as f64,
    )?;
    emit(&mut retain, || Retained::PectoralSurface(&pec_surface));

    // 阶段 10: 掩膜组装.
    stage!("assembling breast masks");
    let mut masks = assemble_breast_masks(
        &foreground,
        &pectoral,
        &pec_surface,
        config.final_segm_threshold,
        config.pectoral_smoothing_sigma_mm as f64,
        config.mid_sagittal,
        config.left_breast,
        config.right_breast,
    );

    // 阶段 11: 可组合裁剪. 依次作用在合并与分侧掩膜上.
    let mut crops: Vec<Box<dyn Fn(&MrMask) -> MrMask>> = Vec::with_capacity(3);

    if config.crop_with_fitted_surface {
        stage!("fitting skin surface for the fitted-surface crop");
        let skin_surface = fit_skin_surface(
            &masks.union,
            &elevation,
            config.pectoral_control_point_spacing_mm as f64,
        )?;
        emit(&mut retain, || Retained::FittedSkinSurface(&skin_surface));
        crops.push(Box::new(move |m| crop_with_fitted_surface(m, &skin_surface)));
    }
    if config.coil_crop_distance_mm > 0.0 {
        let d = config.coil_crop_distance_mm as f64;
        crops.push(Box::new(move |m| crop_coil_distance(m, d)));
    }
    if config.profile.crops_past_sternum() {
        // 显式跨阶段依赖: 该裁剪读取阶段 7 产出的胸骨中点.
        let d = config.crop_dist_post_midsternum_mm as f64;
        crops.push(Box::new(move |m| {
            crop_posterior_to_sternum(m, &mid_sternum, d)
        }));
    }

    for crop in &crops {
        masks.union = crop(&masks.union);
        masks.left = masks.left.as_ref().map(|m| crop(m));
        masks.right = masks.right.as_ref().map(|m| crop(m));
    }

    // 阶段 12: 可选网格提取.
    let mesh = config.extract_mesh.then(|| {
        stage!("extracting boundary mesh");
        extract_mesh(&masks.union)
    });

    stage!(
        "segmentation finished: {} foreground voxels",
        masks.union.count_foreground()
    );
    Ok(SegmOutput {
        masks,
        landmarks,
        threshold,
        mesh,
    })
}
