//! 各向异性 distance-from-edge (DFE) 变换.
//!
//! 对 mask 中每个前景体素, 沿 26 个射线方向走到第一个背景体素,
//! 每步累加按分辨率换算的物理步长, 取 26 个方向的最小值.
//! 结果以定点量化存储: `stored = round(mm * DISTANCE_PRECISION)`.
//!
//! 该射线扫描在轴对齐边界上是精确的 (最近边界面沿坐标轴方向时,
//! 轴向射线给出准确距离). 一般方向上它是 26 方向 chamfer 类近似,
//! 最坏情况 (射线夹角正中) 相对真实欧氏距离的偏差不超过约 7.6%
//! (各向同性体素), 测试中以暴力最小距离校验该界.
//!
//! 距图像 z 两端 [`lower_3d_cutoff`](crate::consts::LOWER_3D_CUTOFF)
//! 层以内的切片仅使用 8 个平面内方向 (2D DFE): 贯穿图像上下边缘的
//! 血管在 3D 扫描下会被整体赋予过低的 DFE.

use itertools::iproduct;
use log::debug;

use crate::consts::{DISTANCE_PRECISION, LOWER_3D_CUTOFF};
use crate::graph::Graph;
use crate::{CancelToken, Resolution, Result, SegMask, Volume, VesselError};

/// 量化后的 DFE 体数据. 0 当且仅当背景.
pub type DistanceVolume = Volume<u16>;

/// 射线方向偏移 `(dz, dh, dw)`.
type Dir = (i64, i64, i64);

/// 体素级量化步长表. 七类方向 (三个面方向, 三类面对角,
/// 一类体对角) 各自按分辨率预先换算成定点数.
#[derive(Copy, Clone, Debug)]
pub struct VoxelDistance {
    res: Resolution,
    col: u16,
    row: u16,
    z: u16,
    col_row: u16,
    col_z: u16,
    row_z: u16,
    col_row_z: u16,
}

impl VoxelDistance {
    /// 根据分辨率构建步长表. 任一单步量化后超出 `u16` 表示范围时
    /// 返回 [`VesselError::TooLarge`].
    pub fn new(res: &Resolution) -> Result<Self> {
        let (x, y, z) = (res.x_mm(), res.y_mm(), res.z_mm());
        let q = |mm: f64| -> Result<u16> {
            let v = (mm * DISTANCE_PRECISION).round();
            if v <= u16::MAX as f64 {
                Ok(v as u16)
            } else {
                Err(VesselError::TooLarge(mm))
            }
        };
        let vd = Self {
            res: *res,
            col: q(x)?,
            row: q(y)?,
            z: q(z)?,
            col_row: q((x * x + y * y).sqrt())?,
            col_z: q((x * x + z * z).sqrt())?,
            row_z: q((y * y + z * z).sqrt())?,
            col_row_z: q((x * x + y * y + z * z).sqrt())?,
        };
        // 单步量化为零会让前景 DFE 退化为 0, 违反零值当且仅当背景
        if vd.col == 0 || vd.row == 0 || vd.z == 0 {
            return Err(VesselError::Resolution(x, y, z));
        }
        debug!(
            "voxel steps: col={} row={} z={} colRow={} colZ={} rowZ={} colRowZ={}",
            vd.col, vd.row, vd.z, vd.col_row, vd.col_z, vd.row_z, vd.col_row_z
        );
        Ok(vd)
    }

    /// 物理距离 (毫米) 的定点量化. 超界饱和.
    #[inline]
    pub fn quantize(mm: f64) -> u16 {
        (mm * DISTANCE_PRECISION).round().min(u16::MAX as f64) as u16
    }

    /// 定点量化值还原为毫米.
    #[inline]
    pub fn to_mm(q: u16) -> f64 {
        q as f64 / DISTANCE_PRECISION
    }

    /// 所用分辨率.
    #[inline]
    pub fn res(&self) -> &Resolution {
        &self.res
    }

    /// 两个体素索引之间的物理欧氏距离, 毫米.
    #[inline]
    pub fn distance(&self, a: crate::Idx3d, b: crate::Idx3d) -> f64 {
        self.res.distance(a, b)
    }

    /// 按方向类型取单步量化代价.
    #[inline]
    fn step_cost(&self, (dz, dh, dw): Dir) -> u16 {
        match (dz != 0, dh != 0, dw != 0) {
            (true, true, true) => self.col_row_z,
            (false, true, true) => self.col_row,
            (true, false, true) => self.col_z,
            (true, true, false) => self.row_z,
            (false, false, true) => self.col,
            (false, true, false) => self.row,
            (true, false, false) => self.z,
            (false, false, false) => unreachable!(),
        }
    }

    /// 26 个射线方向与对应单步代价.
    fn rays_3d(&self) -> Vec<(Dir, u16)> {
        let mut rays = Vec::with_capacity(26);
        for (dz, dh, dw) in iproduct!(-1i64..=1, -1i64..=1, -1i64..=1) {
            if (dz, dh, dw) == (0, 0, 0) {
                continue;
            }
            rays.push(((dz, dh, dw), self.step_cost((dz, dh, dw))));
        }
        rays
    }

    /// 8 个平面内射线方向与对应单步代价.
    fn rays_2d(&self) -> Vec<(Dir, u16)> {
        self.rays_3d()
            .into_iter()
            .filter(|((dz, _, _), _)| *dz == 0)
            .collect()
    }
}

/// 计算 mask 的 DFE 体数据, 使用默认
/// [`LOWER_3D_CUTOFF`](crate::consts::LOWER_3D_CUTOFF).
#[inline]
pub fn distance_from_edge(mask: &SegMask) -> Result<DistanceVolume> {
    distance_from_edge_with(mask, LOWER_3D_CUTOFF, &CancelToken::new())
}

/// 计算 mask 的 DFE 体数据.
///
/// `lower_3d_cutoff` 为仅做 2D 扫描的 z 端部层数; `cancel`
/// 在每层切片边界被检查.
///
/// # 返回值
///
/// 与 mask 全等的量化 DFE 体数据. 背景处为 0, 前景处严格为正.
pub fn distance_from_edge_with(
    mask: &SegMask,
    lower_3d_cutoff: usize,
    cancel: &CancelToken,
) -> Result<DistanceVolume> {
    let vd = VoxelDistance::new(mask.res())?;
    let (zs, hs, ws) = mask.shape();
    let mut out = DistanceVolume::zeros(mask.shape(), *mask.res());

    let rays3 = vd.rays_3d();
    let rays2 = vd.rays_2d();
    let low = zs.saturating_sub(lower_3d_cutoff);

    for z in 0..zs {
        cancel.check()?;
        // z 端部仅做平面内扫描
        let rays = if z <= lower_3d_cutoff || z >= low {
            &rays2
        } else {
            &rays3
        };
        for (h, w) in iproduct!(0..hs, 0..ws) {
            if mask[(z, h, w)] == 0 {
                continue;
            }
            out[(z, h, w)] = min_ray_dfe(mask, (z, h, w), rays);
        }
    }
    Ok(out)
}

/// 沿 `rays` 各方向走到第一个背景体素, 返回最小累计量化距离.
fn min_ray_dfe(mask: &SegMask, (z, h, w): crate::Idx3d, rays: &[(Dir, u16)]) -> u16 {
    let (zs, hs, ws) = mask.shape();
    let mut dfe = u32::MAX;
    for &((dz, dh, dw), step) in rays {
        let mut acc = 0u32;
        let (mut cz, mut ch, mut cw) = (z as i64, h as i64, w as i64);
        loop {
            if cz < 0 || ch < 0 || cw < 0 || cz >= zs as i64 || ch >= hs as i64 || cw >= ws as i64 {
                break; // 射线贯穿图像边缘, 按前景延续处理
            }
            if mask[(cz as usize, ch as usize, cw as usize)] == 0 {
                break;
            }
            acc += step as u32;
            cz += dz;
            ch += dh;
            cw += dw;
        }
        if acc < dfe {
            dfe = acc;
        }
    }
    dfe.min(u16::MAX as u32) as u16
}

/// 将体数据中低于 `threshold` 的体素置零. 幂等.
///
/// 既用作 DFE 边缘修剪 (建图前丢弃靠近血管壁的表层),
/// 也与分割组合实现头皮/颅骨表层剥离.
pub fn threshold_under<T>(volume: &mut Volume<T>, threshold: T)
where
    T: Copy + PartialOrd + num::Zero,
{
    for v in volume.data_mut().iter_mut() {
        if *v < threshold {
            *v = T::zero();
        }
    }
}

/// 计算各图结点的 modified DFE (MDFE).
///
/// `mdfe = dfe + 同值邻居数 / n_max`. DFE 在血管中轴附近常出现
/// 平台区 (同值体素连片), 同值邻居计数用于在平台内区分更接近
/// 中轴的体素, 供源结点选择使用.
pub fn modify_dfe(graphs: &mut [Graph<u16>], n_max: u16) {
    for graph in graphs.iter_mut() {
        for i in 0..graph.len() {
            let dfe = graph.node(i).dfe;
            if dfe == 0 {
                continue;
            }
            let mut same = 1u16;
            for a in graph.neighbours(i) {
                if graph.node(a).dfe == dfe {
                    same += 1;
                }
            }
            graph.node_mut(i).mdfe = dfe as f32 + same as f32 / n_max as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{distance_from_edge, threshold_under, DistanceVolume, VoxelDistance};
    use crate::consts::DISTANCE_PRECISION;
    use crate::phantom;
    use crate::{Resolution, Volume};
    use itertools::iproduct;

    /// 暴力计算: `pos` 到最近背景体素的物理欧氏距离.
    fn brute_force_mm(mask: &crate::SegMask, pos: crate::Idx3d) -> f64 {
        let (zs, hs, ws) = mask.shape();
        let mut best = f64::MAX;
        for p in iproduct!(0..zs, 0..hs, 0..ws) {
            if mask[p] == 0 {
                best = best.min(mask.res().distance(pos, p));
            }
        }
        best
    }

    #[test]
    fn test_voxel_distance_steps() {
        let res = Resolution::new(0.5, 0.5, 1.2).unwrap();
        let vd = VoxelDistance::new(&res).unwrap();
        assert_eq!(vd.col, 50);
        assert_eq!(vd.row, 50);
        assert_eq!(vd.z, 120);
        // 面对角: sqrt(0.25 + 0.25) ~ 0.7071
        assert_eq!(vd.col_row, 71);
        assert!((VoxelDistance::to_mm(71) - 0.71).abs() < 1e-9);
    }

    #[test]
    fn test_voxel_distance_overflow() {
        let res = Resolution::new(1000.0, 1000.0, 1000.0).unwrap();
        assert!(VoxelDistance::new(&res).is_err());
    }

    #[test]
    fn test_dfe_zero_iff_background() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::solid_cuboid((12, 12, 12), res, (3, 3, 3), (8, 8, 8), 100);
        let dfe = distance_from_edge(&mask).unwrap();
        let (zs, hs, ws) = mask.shape();
        for p in iproduct!(0..zs, 0..hs, 0..ws) {
            assert_eq!(mask[p] == 0, dfe[p] == 0, "违反 DFE 零值性质: {p:?}");
        }
    }

    #[test]
    fn test_dfe_cube_center_matches_brute_force() {
        // 各向异性分辨率下, 立方体中心的 DFE 应等于
        // 到最近边界面的暴力最小物理距离 (轴对齐精确性).
        let res = Resolution::new(0.5, 0.7, 1.1).unwrap();
        let mask = phantom::solid_cuboid((15, 15, 15), res, (3, 3, 3), (11, 11, 11), 1);
        let dfe = distance_from_edge(&mask).unwrap();

        let center = (7, 7, 7);
        let expect = brute_force_mm(&mask, center);
        let got = VoxelDistance::to_mm(dfe[center]);
        // 量化误差半步以内
        assert!(
            (got - expect).abs() <= 1.0 / DISTANCE_PRECISION,
            "中心 DFE {got} mm, 暴力 {expect} mm"
        );
    }

    #[test]
    fn test_dfe_ray_error_bound() {
        // 一般方向的射线近似误差不超过真实距离的 ~7.6%.
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::solid_cuboid((20, 20, 20), res, (2, 2, 2), (17, 17, 17), 1);
        let dfe = distance_from_edge(&mask).unwrap();
        let (zs, hs, ws) = mask.shape();
        for p in iproduct!(7..zs - 7, 7..hs - 7, 7..ws - 7) {
            if mask[p] == 0 {
                continue;
            }
            let exact = brute_force_mm(&mask, p);
            let got = VoxelDistance::to_mm(dfe[p]);
            // 下界留出逐步量化舍入的累计余量 (每步半个量化单位)
            assert!(got >= exact * 0.99 - 2.0 / DISTANCE_PRECISION);
            assert!(got <= exact * 1.08 + 2.0 / DISTANCE_PRECISION);
        }
    }

    #[test]
    fn test_dfe_2d_cutoff_at_stack_ends() {
        // 贯穿整个 z 的柱体: 端部切片仅做 2D 扫描,
        // 其 DFE 应与中部切片一致 (不被 z 边缘拉低).
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::straight_tube((24, 15, 15), res, (7, 7), 3.0, 50);
        let dfe = distance_from_edge(&mask).unwrap();
        assert_eq!(dfe[(1, 7, 7)], dfe[(12, 7, 7)]);
    }

    #[test]
    fn test_threshold_under_idempotent() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::solid_cuboid((10, 10, 10), res, (2, 2, 2), (7, 7, 7), 9);
        let mut once: DistanceVolume = distance_from_edge(&mask).unwrap();
        threshold_under(&mut once, 150);
        let mut twice = once.clone();
        threshold_under(&mut twice, 150);
        assert_eq!(once.data(), twice.data());
        // 门限之下确实被清零
        assert!(once.data().iter().all(|&v| v == 0 || v >= 150));
    }

    #[test]
    fn test_threshold_under_float() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut vol = Volume::<f32>::zeros((2, 2, 2), res);
        vol[(0, 0, 0)] = 0.5;
        vol[(1, 1, 1)] = 2.0;
        threshold_under(&mut vol, 1.0f32);
        assert_eq!(vol[(0, 0, 0)], 0.0);
        assert_eq!(vol[(1, 1, 1)], 2.0);
    }
}
