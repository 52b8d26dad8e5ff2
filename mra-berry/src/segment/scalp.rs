//! 表层剥离: 去掉头皮/颅骨等外壳结构.
//!
//! 以逐切片均值门限提取 "头部" mask, 对其做 DFE 变换, 再用
//! [`threshold_under`](crate::dfe::threshold_under) 修剪出指定
//! 物理深度的表层, 最后把表层体素从工作体数据中抹除.
//! 血管位于头部内部, 不会落入被剥离的外壳.

use log::debug;

use crate::dfe::{distance_from_edge_with, threshold_under, VoxelDistance};
use crate::{CancelToken, Result, SegMask, Volume};

/// 从工作体数据上剥离 `depth_mm` 深的表层.
pub fn strip_rind(vol: &mut Volume<u16>, depth_mm: f64, cancel: &CancelToken) -> Result<()> {
    debug_assert!(depth_mm > 0.0);
    let (zs, hs, ws) = vol.shape();

    // 头部 mask: 逐切片均值门限
    let mut head = SegMask::zeros(vol.shape(), *vol.res());
    for z in 0..zs {
        cancel.check()?;
        let mean = vol.slice_at(z).mean();
        for h in 0..hs {
            for w in 0..ws {
                let v = vol[(z, h, w)];
                if v > 0 && v as f64 >= mean {
                    head[(z, h, w)] = 1;
                }
            }
        }
    }

    // 表层 = 头部中 DFE 小于剥离深度的体素
    let mut dfe = distance_from_edge_with(&head, 0, cancel)?;
    threshold_under(&mut dfe, VoxelDistance::quantize(depth_mm));

    let mut stripped = 0usize;
    for ((pos, v), &d) in head.data().indexed_iter().zip(dfe.data().iter()) {
        if *v > 0 && d == 0 {
            vol[pos] = 0;
            stripped += 1;
        }
    }
    debug!("scalp strip {depth_mm} mm: removed {stripped} voxels");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::strip_rind;
    use crate::{phantom, CancelToken, Resolution};

    #[test]
    fn test_strip_rind_erodes_shell() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut vol = phantom::solid_cuboid((11, 11, 11), res, (2, 2, 2), (8, 8, 8), 600);
        strip_rind(&mut vol, 2.2, &CancelToken::new()).unwrap();
        // 外壳两层被剥掉, 只剩 3x3x3 的芯
        assert_eq!(vol.foreground_count(), 27);
        assert_eq!(vol[(5, 5, 5)], 600);
        assert_eq!(vol[(2, 5, 5)], 0);
        assert_eq!(vol[(3, 5, 5)], 0);
    }

    #[test]
    fn test_strip_rind_empty_volume() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut vol = crate::SegMask::zeros((6, 6, 6), res);
        strip_rind(&mut vol, 3.0, &CancelToken::new()).unwrap();
        assert_eq!(vol.foreground_count(), 0);
    }
}
