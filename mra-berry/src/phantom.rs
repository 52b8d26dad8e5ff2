//! 合成体数据构造器. 测试与算法标定用的已知几何形状:
//! 实心长方体, 直管, 螺旋管, Y 形分叉.
//!
//! 所有形状参数均为物理量 (毫米), 按体数据分辨率体素化.

use itertools::iproduct;

use crate::{Idx2d, Idx3d, Resolution, SegMask};

/// 实心长方体. `lo`, `hi` 为体素索引闭区间端点.
///
/// 若区间越界则被裁剪到体数据范围内.
pub fn solid_cuboid(shape: Idx3d, res: Resolution, lo: Idx3d, hi: Idx3d, value: u16) -> SegMask {
    let mut mask = SegMask::zeros(shape, res);
    let (zs, hs, ws) = shape;
    for p in iproduct!(
        lo.0..=hi.0.min(zs - 1),
        lo.1..=hi.1.min(hs - 1),
        lo.2..=hi.2.min(ws - 1)
    ) {
        mask[p] = value;
    }
    mask
}

/// 沿 z 贯穿整个体数据的直圆管.
///
/// `center` 为管轴的切片内坐标 `(h, w)`, `radius_mm` 为物理半径.
pub fn straight_tube(
    shape: Idx3d,
    res: Resolution,
    center: Idx2d,
    radius_mm: f64,
    value: u16,
) -> SegMask {
    let mut mask = SegMask::zeros(shape, res);
    let (zs, hs, ws) = shape;
    let r2 = radius_mm * radius_mm;
    for (z, h, w) in iproduct!(0..zs, 0..hs, 0..ws) {
        let dy = (h as f64 - center.0 as f64) * res.y_mm();
        let dx = (w as f64 - center.1 as f64) * res.x_mm();
        if dy * dy + dx * dx <= r2 {
            mask[(z, h, w)] = value;
        }
    }
    mask
}

/// 以浮点索引坐标 `(z, h, w)` 为球心盖一个实心球.
pub fn stamp_ball(mask: &mut SegMask, center: [f64; 3], radius_mm: f64, value: u16) {
    let res = *mask.res();
    let (zs, hs, ws) = mask.shape();
    let r2 = radius_mm * radius_mm;
    // 包围盒
    let reach = |mm: f64| (radius_mm / mm).ceil() as i64 + 1;
    let (rz, rh, rw) = (reach(res.z_mm()), reach(res.y_mm()), reach(res.x_mm()));
    let (cz, ch, cw) = (center[0].round() as i64, center[1].round() as i64, center[2].round() as i64);
    for (z, h, w) in iproduct!(cz - rz..=cz + rz, ch - rh..=ch + rh, cw - rw..=cw + rw) {
        if z < 0 || h < 0 || w < 0 || z >= zs as i64 || h >= hs as i64 || w >= ws as i64 {
            continue;
        }
        let dz = (z as f64 - center[0]) * res.z_mm();
        let dy = (h as f64 - center[1]) * res.y_mm();
        let dx = (w as f64 - center[2]) * res.x_mm();
        if dz * dz + dy * dy + dx * dx <= r2 {
            mask[(z as usize, h as usize, w as usize)] = value;
        }
    }
}

/// 沿线段 `a -> b` (浮点索引坐标) 盖一根实心圆管.
pub fn stamp_segment(mask: &mut SegMask, a: [f64; 3], b: [f64; 3], radius_mm: f64, value: u16) {
    let res = *mask.res();
    let len = res.distance_f64(a, b);
    // 采样间距取最细分辨率的一半, 保证体素级连续
    let step_mm = (res.x_mm().min(res.y_mm()).min(res.z_mm())) * 0.5;
    let n = (len / step_mm).ceil().max(1.0) as usize;
    for i in 0..=n {
        let t = i as f64 / n as f64;
        let p = [
            a[0] + (b[0] - a[0]) * t,
            a[1] + (b[1] - a[1]) * t,
            a[2] + (b[2] - a[2]) * t,
        ];
        stamp_ball(mask, p, radius_mm, value);
    }
}

/// 螺旋圆管. 轴线绕体数据中心竖直轴旋转:
/// 半径 `helix_radius_mm`, 每圈 z 向前进 `pitch_mm`,
/// 管半径 `tube_radius_mm`. 螺旋占满除边界两层外的全部 z 范围.
pub fn helix_tube(
    shape: Idx3d,
    res: Resolution,
    helix_radius_mm: f64,
    pitch_mm: f64,
    tube_radius_mm: f64,
    value: u16,
) -> SegMask {
    let mut mask = SegMask::zeros(shape, res);
    let (zs, hs, ws) = shape;
    let (ch, cw) = (hs as f64 / 2.0, ws as f64 / 2.0);
    let two_pi = std::f64::consts::TAU;

    let z_lo = 2usize;
    let z_hi = zs - 3;
    // 沿轴线密集采样
    let z_span_mm = (z_hi - z_lo) as f64 * res.z_mm();
    let step_mm = res.z_mm().min(res.x_mm()).min(res.y_mm()) * 0.5;
    let n = (z_span_mm / step_mm).ceil() as usize;
    for i in 0..=n {
        let z_mm = i as f64 * z_span_mm / n as f64;
        let theta = two_pi * z_mm / pitch_mm;
        let center = [
            z_lo as f64 + z_mm / res.z_mm(),
            ch + helix_radius_mm * theta.cos() / res.y_mm(),
            cw + helix_radius_mm * theta.sin() / res.x_mm(),
        ];
        stamp_ball(&mut mask, center, tube_radius_mm, value);
    }
    mask
}

/// Y 形三臂结构: 一根竖直主干与两根斜向支臂交汇于一点.
///
/// 返回 `(mask, junction)`, `junction` 为交汇点体素坐标.
pub fn y_branch(shape: Idx3d, res: Resolution, radius_mm: f64, value: u16) -> (SegMask, Idx3d) {
    let (zs, hs, ws) = shape;
    let mut mask = SegMask::zeros(shape, res);
    let junction = [zs as f64 / 2.0, hs as f64 / 2.0, ws as f64 / 2.0];

    // 主干: 朝 z 低端
    stamp_segment(
        &mut mask,
        junction,
        [2.0, hs as f64 / 2.0, ws as f64 / 2.0],
        radius_mm,
        value,
    );
    // 两根支臂: 朝 z 高端张开
    stamp_segment(
        &mut mask,
        junction,
        [zs as f64 - 3.0, hs as f64 / 4.0, ws as f64 / 4.0],
        radius_mm,
        value,
    );
    stamp_segment(
        &mut mask,
        junction,
        [zs as f64 - 3.0, hs as f64 * 3.0 / 4.0, ws as f64 * 3.0 / 4.0],
        radius_mm,
        value,
    );
    (
        mask,
        (
            junction[0].round() as usize,
            junction[1].round() as usize,
            junction[2].round() as usize,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::{helix_tube, solid_cuboid, y_branch};
    use crate::cluster::label_clusters;
    use crate::Resolution;

    #[test]
    fn test_cuboid_volume() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = solid_cuboid((6, 6, 6), res, (1, 1, 1), (3, 4, 5), 7);
        assert_eq!(mask.foreground_count(), 3 * 4 * 5);
    }

    #[test]
    fn test_helix_is_one_cluster() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = helix_tube((40, 30, 30), res, 8.0, 20.0, 2.0, 100);
        assert!(mask.foreground_count() > 0);
        assert_eq!(label_clusters(&mask).len(), 1);
    }

    #[test]
    fn test_y_branch_is_one_cluster() {
        let res = Resolution::isotropic(1.0).unwrap();
        let (mask, junction) = y_branch((32, 24, 24), res, 1.8, 50);
        assert!(mask.is_foreground(junction));
        assert_eq!(label_clusters(&mask).len(), 1);
    }
}
