//! 端到端场景测试: 在合成体上跑完整流水线.

use ndarray::Array3;

use crate::assemble::is_subset_of;
use crate::consts::gray::MASK_BREAST;
use crate::prelude::*;

/// 均匀全空气体.
fn uniform_air() -> MrScan {
    MrScan::from_parts(Array3::zeros((12, 16, 16)), [1.0, 1.0, 1.0], [0.0; 3])
}

/// 场景 B 的合成体: 胸壁平板 + 两个互不相连的高强度方块.
///
/// 分辨率 `(z, h, w) = (1, 1, 2)` 毫米. 平板占 `h >= 26` 的全部 `(z, w)`;
/// 两个方块位于 `z in 4..12`, `h in 10..26`, 分别在 `w in 8..16` 和
/// `w in 36..44`. 方块到图像边缘和彼此之间的空气间隔都宽于灰度闭运算
/// 的核直径, 正中间隙也宽于胸骨搜索带, 因此胸骨中点会落在间隙内的
/// 平板前表面上.
fn two_block_phantom() -> MrScan {
    let (nz, nh, nw) = (16, 40, 52);
    let mut data = Array3::<f32>::zeros((nz, nh, nw));
    for z in 0..nz {
        for h in 26..nh {
            for w in 0..nw {
                data[(z, h, w)] = 100.0;
            }
        }
    }
    for (w_lo, w_hi) in [(8usize, 16usize), (36, 44)] {
        for z in 4..12 {
            for h in 10..26 {
                for w in w_lo..w_hi {
                    data[(z, h, w)] = 100.0;
                }
            }
        }
    }
    MrScan::from_parts(data, [1.0, 1.0, 2.0], [0.0; 3])
}

fn both_sides_config() -> SegmConfig {
    let mut config = SegmConfig::default();
    config.left_breast = true;
    config.right_breast = true;
    // 合成体远离后侧边界, 关掉线圈裁剪让计数断言更直接.
    config.coil_crop_distance_mm = 0.0;
    // 合成体很小且胸骨种子贴近 z 边界, 行进时间放宽到 8 毫米当量.
    config.marching_time = 8.0;
    config
}

#[test]
fn test_scenario_a_uniform_air_yields_empty_mask() {
    let scan = uniform_air();
    for t in [0.1f32, 0.45, 0.9] {
        let mut config = both_sides_config();
        config.final_segm_threshold = t;

        let out = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();

        // 估计器在单 bin 直方图上钳到安全默认值而不是失败.
        assert!(out.threshold.clamped);
        assert_eq!(out.masks.union.count_foreground(), 0);
        assert_eq!(out.masks.left.unwrap().count_foreground(), 0);
        assert_eq!(out.landmarks.mid_sternum, None);
        assert_eq!(out.landmarks.left_nipple, None);
    }
}

#[test]
fn test_scenario_b_two_blocks_partition_across_midline() {
    let scan = two_block_phantom();
    let out = segment(SegmInputs::structural_only(&scan), &both_sides_config(), None).unwrap();

    let union_count = out.masks.union.count(MASK_BREAST);
    assert!(union_count > 0, "合成体应产生非空掩膜");

    let left = out.masks.left.unwrap();
    let right = out.masks.right.unwrap();
    assert_eq!(
        left.count(MASK_BREAST) + right.count(MASK_BREAST),
        union_count,
        "两侧掩膜合计应等于合并掩膜"
    );

    let mid = out.masks.mid_sagittal as f64;
    let lc = left.foreground_centroid().unwrap();
    let rc = right.foreground_centroid().unwrap();
    assert!(lc[2] > mid, "左乳质心应在正中矢状面左侧");
    assert!(rc[2] < mid, "右乳质心应在正中矢状面右侧");
}

#[test]
fn test_scenario_b_landmarks_on_blocks() {
    let scan = two_block_phantom();
    let out = segment(SegmInputs::structural_only(&scan), &both_sides_config(), None).unwrap();

    // 乳头 = 各半边最靠前的皮肤点, 即方块前表面.
    let left = out.landmarks.left_nipple.unwrap();
    let right = out.landmarks.right_nipple.unwrap();
    assert_eq!(left.index.1, 10);
    assert!(left.index.2 >= 36);
    assert_eq!(right.index.1, 10);
    assert!(right.index.2 < 16);

    // 胸骨中点在间隙内的平板前表面.
    let sternum = out.landmarks.mid_sternum.unwrap();
    assert_eq!(sternum.index.1, 26);
    assert!(sternum.index.2 >= 16 && sternum.index.2 < 36);

    // 地标往返: 世界坐标再转回体素索引.
    for lm in [left, right, sternum] {
        assert_eq!(scan.world_to_index(lm.world), Some(lm.index));
    }
}

#[test]
fn test_final_mask_is_subset_of_background_split() {
    let scan = two_block_phantom();

    // 用保留钩子截取背景分割掩膜 (压缩快照), 之后验证子集性质.
    let mut background: Option<CompactMask> = None;
    let mut hook = |item: Retained<'_>| {
        if let Retained::BackgroundMask(mask) = item {
            background = Some(CompactMask::from_mask(mask));
        }
    };
    let out = segment(
        SegmInputs::structural_only(&scan),
        &both_sides_config(),
        Some(&mut hook),
    )
    .unwrap();

    let foreground = background.expect("钩子应收到背景掩膜").restore();
    assert!(is_subset_of(&out.masks.union, &foreground));
}

#[test]
fn test_retention_hook_never_alters_results() {
    // 顺便冒烟测试 verbose 日志: 开着日志跑与不开着跑结果必须一致.
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init()
        .ok();

    let scan = two_block_phantom();
    let mut config = both_sides_config();
    config.verbose = true;

    let mut seen = 0usize;
    let mut hook = |_: Retained<'_>| {
        seen += 1;
    };
    let with_hook = segment(
        SegmInputs::structural_only(&scan),
        &config,
        Some(&mut hook),
    )
    .unwrap();
    let without = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();

    assert!(seen > 5, "钩子应收到一系列中间体");
    assert_eq!(with_hook.masks.union, without.masks.union);
    assert_eq!(with_hook.landmarks, without.landmarks);
    assert_eq!(with_hook.threshold, without.threshold);
}

#[test]
fn test_idempotence_bit_identical_masks() {
    let scan = two_block_phantom();
    let config = both_sides_config();

    let a = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();
    let b = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();

    assert_eq!(a.masks.union, b.masks.union);
    assert_eq!(a.masks.left, b.masks.left);
    assert_eq!(a.masks.right, b.masks.right);
    assert_eq!(a.landmarks, b.landmarks);
}

#[test]
fn test_final_threshold_monotonicity() {
    let scan = two_block_phantom();
    let mut last = usize::MAX;
    for t in [0.2f32, 0.45, 0.7] {
        let mut config = both_sides_config();
        config.final_segm_threshold = t;
        let out = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();
        let count = out.masks.union.count(MASK_BREAST);
        assert!(count <= last, "阈值 {t} 下掩膜体素数不应增加");
        last = count;
    }
}

#[test]
fn test_geometry_mismatch_fails_before_any_stage() {
    let scan = two_block_phantom();
    // 形状相同但体素分辨率不同: 绝不隐式重采样, 必须硬错误.
    let other = MrScan::from_parts(Array3::zeros((16, 40, 52)), [1.0, 1.0, 1.0], [0.0; 3]);

    let inputs = SegmInputs {
        structural: &scan,
        fat_sat: Some(&other),
        texture: None,
    };
    let err = segment(inputs, &both_sides_config(), None).unwrap_err();
    assert!(matches!(
        err,
        SegmError::Config(ConfigError::GeometryMismatch("fat-saturated"))
    ));
}

#[test]
fn test_mesh_on_request_is_closed() {
    let scan = two_block_phantom();
    let mut config = both_sides_config();
    config.extract_mesh = true;

    let out = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();
    let mesh = out.mesh.unwrap();
    assert!(!mesh.is_empty());
    assert!(mesh.is_closed());
}

#[test]
fn test_prone_supine_profile_crops_past_sternum() {
    let scan = two_block_phantom();
    let mut config = both_sides_config();
    config.profile = SegmProfile::ProneSupineModelling;
    config.crop_dist_post_midsternum_mm = 4.0;

    let out = segment(SegmInputs::structural_only(&scan), &config, None).unwrap();
    let baseline = segment(SegmInputs::structural_only(&scan), &both_sides_config(), None).unwrap();

    // 胸骨中点在 h = 26, 边界在 26 + 4 = 30 毫米: 更后方的体素一律被裁掉.
    let (nz, nh, nw) = out.masks.union.shape();
    for z in 0..nz {
        for h in 31..nh {
            for w in 0..nw {
                assert_eq!(out.masks.union[(z, h, w)], 0, "({z}, {h}, {w})");
            }
        }
    }
    assert!(out.masks.union.count(MASK_BREAST) <= baseline.masks.union.count(MASK_BREAST));
    assert!(is_subset_of(&out.masks.union, &baseline.masks.union));
}
