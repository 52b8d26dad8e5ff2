//! 26-连通 3D 区域生长.

use std::collections::VecDeque;

use log::debug;

use crate::pc::PhaseContrast;
use crate::{CancelToken, Idx3d, Result, SegMask, Volume};

/// 从全部种子出发生长分割 mask.
///
/// 候选体素满足 `lower < input < upper` (种子本身直接接受) 才被
/// 纳入, 纳入的体素在 mask 中保留源强度. 给定相位对比速度场时,
/// 额外要求速度模长不低于 `pc_magnitude_min`.
pub(crate) fn grow_regions(
    input: &Volume<u16>,
    seeds: &[Idx3d],
    lower: u16,
    upper: u16,
    pc: Option<&PhaseContrast>,
    pc_magnitude_min: f64,
    cancel: &CancelToken,
) -> Result<SegMask> {
    let mut mask = SegMask::zeros(input.shape(), *input.res());
    let mut clustered = ndarray::Array3::<bool>::from_elem(input.shape(), false);
    let mut queue = VecDeque::new();
    let mut grown = 0usize;

    let pass_pc =
        |pos: Idx3d| -> bool { pc.map_or(true, |f| f.magnitude_at(pos) >= pc_magnitude_min) };

    for &seed in seeds {
        cancel.check()?;
        if clustered[seed] || input[seed] == 0 {
            continue;
        }
        clustered[seed] = true;
        mask[seed] = input[seed];
        grown += 1;
        queue.extend(input.cube_neighbours(seed));

        while let Some(pos) = queue.pop_front() {
            if clustered[pos] || mask[pos] > 0 {
                continue;
            }
            let v = input[pos];
            if v > lower && v < upper && pass_pc(pos) {
                clustered[pos] = true;
                mask[pos] = v;
                grown += 1;
                queue.extend(input.cube_neighbours(pos));
            }
        }
    }
    debug!("region grow: {grown} voxels from {} seeds", seeds.len());
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::grow_regions;
    use crate::{phantom, CancelToken, Resolution};

    #[test]
    fn test_grow_fills_connected_tube() {
        let res = Resolution::isotropic(1.0).unwrap();
        let vol = phantom::straight_tube((12, 11, 11), res, (5, 5), 2.0, 700);
        let mask = grow_regions(
            &vol,
            &[(6, 5, 5)],
            0,
            u16::MAX,
            None,
            0.0,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(mask.foreground_count(), vol.foreground_count());
    }

    #[test]
    fn test_grow_respects_threshold() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut vol = phantom::straight_tube((12, 11, 11), res, (5, 5), 2.0, 700);
        // 一半管腔压暗到阈值之下
        for (p, v) in vol.clone().data().indexed_iter() {
            if *v > 0 && p.0 >= 6 {
                vol[p] = 100;
            }
        }
        let mask = grow_regions(
            &vol,
            &[(2, 5, 5)],
            500,
            u16::MAX,
            None,
            0.0,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(mask.foreground_count() > 0);
        assert!(mask.data().indexed_iter().all(|(p, &m)| m == 0 || p.0 < 6));
    }

    #[test]
    fn test_grow_does_not_cross_components() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut vol = phantom::solid_cuboid((10, 10, 10), res, (1, 1, 1), (3, 3, 3), 400);
        vol[(7, 7, 7)] = 400;
        let mask = grow_regions(
            &vol,
            &[(2, 2, 2)],
            0,
            u16::MAX,
            None,
            0.0,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(mask[(7, 7, 7)], 0);
        assert_eq!(mask.foreground_count(), 27);
    }
}
