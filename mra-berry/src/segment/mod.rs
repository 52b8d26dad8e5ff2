//! 区域生长血管分割.
//!
//! 流水线 (各步均可由配置开关):
//!
//! 1. 表层剥离: 基于 DFE 腐蚀掉头皮/颅骨外壳 ([`scalp`]).
//! 2. 中值滤波去噪 ([`median`]).
//! 3. 逐切片直方图阈值提取 2D 种子, 以卡方平滑度与 z-差约束
//!    跨切片延续 ([`seeds`]).
//! 4. 26-连通 3D 区域生长 ([`grow`]).
//! 5. 方向射线计数补洞 ([`hole_fill`]).
//! 6. 小簇剔除 (委托 [`crate::cluster`]).
//!
//! 找不到任何种子不是错误: 返回空 mask, 下游各阶段对空输入
//! 返回空输出.

mod grow;
mod hole_fill;
mod median;
mod scalp;
mod seeds;

pub use hole_fill::fill_holes;
pub use median::median_filter;
#[cfg(feature = "rayon")]
pub use median::median_filter_par;
pub use scalp::strip_rind;

use log::{debug, info};
use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::pc::PhaseContrast;
use crate::{cluster, consts, CancelToken, Result, SegMask, VesselError, Volume};

/// 区域生长分割配置. 默认值取 [`crate::consts`] 中的缺省口径.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentConfig {
    /// 2D 种子区域最小像素数.
    pub min_seed_size_2d: usize,

    /// 3D 簇最小体素数, 低于该值的簇被剔除.
    pub min_cluster_size_3d: usize,

    /// 相邻切片种子区域形状偏差的卡方上限.
    pub max_chisq: f64,

    /// 相邻切片种子区域质心 / 强度允许的最大偏移 (体素 / σ 单位).
    pub z_diff: f64,

    /// 种子强度直方图累计比例门限, 决定生长下阈值.
    pub seed_hist_threshold: f64,

    /// 表层剥离深度, 毫米. 0 表示关闭.
    pub scalp_strip_mm: f64,

    /// 补洞迭代次数.
    pub hole_fill_iterations: usize,

    /// 26 个方向中至少命中该数量的方向才补洞.
    pub hole_fill_directions: usize,

    /// 补洞射线搜索半径, 体素.
    pub hole_fill_radius: usize,

    /// 中值滤波窗口半径, 体素. 0 表示关闭.
    pub median_filter_size: usize,

    /// 中值滤波标准差倍率: 仅替换高于 `median + k * sigma` 的样本.
    pub median_std_dev_factor: f64,

    /// 区域生长上阈值.
    pub upper_threshold: u16,

    /// 辅助种子信号: 相位对比速度场. 给定时, 生长仅接受速度模长
    /// 不低于 `pc_magnitude_min` 的体素.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub phase_contrast: Option<PhaseContrast>,

    /// 相位对比速度模长下限.
    pub pc_magnitude_min: f64,

    /// 保留诊断用 2D 种子图.
    pub show_steps: bool,

    /// 协作式取消标志.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel: CancelToken,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_seed_size_2d: consts::MIN_2D_SEED_SIZE,
            min_cluster_size_3d: consts::MIN_3D_CLUSTER_SIZE,
            max_chisq: consts::CHI_SQ_SMOOTHNESS,
            z_diff: consts::VOXEL_Z_DIFF,
            seed_hist_threshold: consts::SEED_HIST_THRESHOLD,
            scalp_strip_mm: 0.0,
            hole_fill_iterations: consts::HOLE_FILL_ITERATIONS,
            hole_fill_directions: consts::HOLE_FILL_DIRECTIONS,
            hole_fill_radius: consts::HOLE_FILL_RADIUS,
            median_filter_size: 0,
            median_std_dev_factor: consts::MEDIAN_STD_DEV_FACTOR,
            upper_threshold: u16::MAX,
            phase_contrast: None,
            pc_magnitude_min: 0.0,
            show_steps: false,
            cancel: CancelToken::new(),
        }
    }
}

impl SegmentConfig {
    /// 在计算开始前校验配置一致性.
    pub fn validate(&self) -> Result<()> {
        let err = |m: &str| Err(VesselError::Config(m.to_string()));
        if self.hole_fill_directions > 26 {
            return err("hole_fill_directions 超过 26 个方向");
        }
        if !(0.0..1.0).contains(&self.seed_hist_threshold) {
            return err("seed_hist_threshold 必须落在 [0, 1)");
        }
        if !self.max_chisq.is_finite() || self.max_chisq < 0.0 {
            return err("max_chisq 必须为非负有限值");
        }
        if !self.z_diff.is_finite() || self.z_diff < 0.0 {
            return err("z_diff 必须为非负有限值");
        }
        if !self.scalp_strip_mm.is_finite() || self.scalp_strip_mm < 0.0 {
            return err("scalp_strip_mm 必须为非负有限值");
        }
        if !self.pc_magnitude_min.is_finite() || self.pc_magnitude_min < 0.0 {
            return err("pc_magnitude_min 必须为非负有限值");
        }
        if self.min_seed_size_2d == 0 {
            return err("min_seed_size_2d 必须为正");
        }
        Ok(())
    }
}

/// 分割结果. 诊断种子图仅在 `show_steps` 打开时保留.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// 分割 mask: 0 为背景, 前景保留源强度.
    pub mask: SegMask,

    /// 诊断用 2D 种子图 (z-MIP 平面), `(h, w)` 格式.
    pub seed_plane: Option<Array2<u16>>,
}

/// 对强度体数据运行区域生长分割.
///
/// 找不到种子时返回空 mask (`Ok`), 只有结构性错误才返回 `Err`.
pub fn segment(volume: &Volume<u16>, config: &SegmentConfig) -> Result<Segmentation> {
    config.validate()?;
    if let Some(pc) = &config.phase_contrast {
        pc.congruent(volume)?;
    }

    // 预处理会改写工作副本, 输入保持只读
    let mut working = volume.clone();

    if config.scalp_strip_mm > 0.0 {
        strip_rind(&mut working, config.scalp_strip_mm, &config.cancel)?;
    }
    if config.median_filter_size > 0 && config.median_std_dev_factor > 0.0 {
        median_filter(
            &mut working,
            config.median_filter_size,
            config.median_std_dev_factor,
            &config.cancel,
        )?;
    }

    let found = seeds::find_seeds(&working, config)?;
    info!(
        "seeds: {} grow threshold: {}",
        found.seeds.len(),
        found.lower_threshold
    );
    if found.seeds.is_empty() {
        debug!("no seeds found, returning empty mask");
        return Ok(Segmentation {
            mask: SegMask::zeros(working.shape(), *working.res()),
            seed_plane: found.seed_plane,
        });
    }

    let mut mask = grow::grow_regions(
        &working,
        &found.seeds,
        found.lower_threshold,
        config.upper_threshold,
        config.phase_contrast.as_ref(),
        config.pc_magnitude_min,
        &config.cancel,
    )?;

    for _ in 0..config.hole_fill_iterations {
        config.cancel.check()?;
        fill_holes(
            &working,
            &mut mask,
            config.hole_fill_directions,
            config.hole_fill_radius,
        );
    }

    let kept = cluster::threshold_clusters(&mut mask, config.min_cluster_size_3d);
    info!(
        "segmentation: {} voxels in {} clusters",
        mask.foreground_count(),
        kept.len()
    );

    Ok(Segmentation {
        mask,
        seed_plane: found.seed_plane,
    })
}

#[cfg(test)]
mod tests {
    use super::{segment, SegmentConfig};
    use crate::{phantom, CancelToken, Resolution, SegMask, VesselError};

    fn tube_config() -> SegmentConfig {
        SegmentConfig {
            min_seed_size_2d: 5,
            min_cluster_size_3d: 50,
            max_chisq: 3.0,
            z_diff: 4.0,
            hole_fill_radius: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validate() {
        let mut cfg = SegmentConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.hole_fill_directions = 27;
        assert!(matches!(cfg.validate(), Err(VesselError::Config(_))));
        cfg = SegmentConfig {
            seed_hist_threshold: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        cfg = SegmentConfig {
            z_diff: -1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_segment_straight_tube() {
        let res = Resolution::isotropic(1.0).unwrap();
        let vol = phantom::straight_tube((24, 17, 17), res, (8, 8), 3.0, 1000);
        let seg = segment(&vol, &tube_config()).unwrap();
        // 管内体素全部被恢复
        assert_eq!(seg.mask.foreground_count(), vol.foreground_count());
        for (p, v) in vol.data().indexed_iter() {
            assert_eq!(seg.mask[p] > 0, *v > 0);
        }
    }

    #[test]
    fn test_segment_empty_volume_is_empty_mask() {
        let res = Resolution::isotropic(1.0).unwrap();
        let vol = SegMask::zeros((12, 12, 12), res);
        let seg = segment(&vol, &tube_config()).unwrap();
        assert_eq!(seg.mask.foreground_count(), 0);
    }

    #[test]
    fn test_segment_cancelled() {
        let res = Resolution::isotropic(1.0).unwrap();
        let vol = phantom::straight_tube((24, 17, 17), res, (8, 8), 3.0, 1000);
        let cancel = CancelToken::new();
        cancel.cancel();
        let cfg = SegmentConfig {
            cancel,
            ..tube_config()
        };
        assert!(matches!(segment(&vol, &cfg), Err(VesselError::Cancelled)));
    }

    #[test]
    fn test_segment_prunes_small_clusters() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut vol = phantom::straight_tube((24, 17, 17), res, (8, 8), 3.0, 1000);
        // 远处一小块亮斑: 种子阶段可能接受, 簇剔除必须丢弃
        vol[(12, 1, 1)] = 1000;
        let seg = segment(&vol, &tube_config()).unwrap();
        assert_eq!(seg.mask[(12, 1, 1)], 0);
    }
}
