//! 中心线路径的迭代 recenter.
//!
//! 每个路径结点的浮点坐标被反复推向其截面邻域 (窗口半径内的
//! 前景体素) 的 DFE 加权质心: DFE 大的体素更靠近血管中轴,
//! 质心因此偏向真实中心. 迭代轮数受最小/最大轮数约束,
//! 位移收敛后提前停止.

use log::debug;

use super::Centerline;
use crate::dfe::DistanceVolume;

/// 收敛判定: 单轮最大位移低于该值 (毫米) 即视为不再移动.
const CONVERGED_MM: f64 = 1e-3;

/// 对一条中心线做迭代 recenter.
pub(crate) fn recenter_line(
    line: &mut Centerline,
    dfe: &DistanceVolume,
    window: usize,
    min_iter: usize,
    max_iter: usize,
) {
    if window == 0 || max_iter == 0 {
        return;
    }
    let res = *dfe.res();
    let (zs, hs, ws) = dfe.shape();
    let r = window as i64;

    for round in 1..=max_iter {
        let mut max_move = 0.0f64;
        for node in line.nodes.iter_mut() {
            let c = node.point;
            let (cz, ch, cw) = (
                c[0].round() as i64,
                c[1].round() as i64,
                c[2].round() as i64,
            );
            let mut sums = [0.0f64; 3];
            let mut total = 0.0f64;
            for dz in -r..=r {
                for dh in -r..=r {
                    for dw in -r..=r {
                        let (z, h, w) = (cz + dz, ch + dh, cw + dw);
                        if z < 0 || h < 0 || w < 0 {
                            continue;
                        }
                        let p = (z as usize, h as usize, w as usize);
                        if p.0 >= zs || p.1 >= hs || p.2 >= ws {
                            continue;
                        }
                        let d = dfe[p];
                        if d == 0 {
                            continue;
                        }
                        let wt = d as f64;
                        sums[0] += p.0 as f64 * wt;
                        sums[1] += p.1 as f64 * wt;
                        sums[2] += p.2 as f64 * wt;
                        total += wt;
                    }
                }
            }
            if total <= 0.0 {
                continue;
            }
            let next = [sums[0] / total, sums[1] / total, sums[2] / total];
            let moved = res.distance_f64(c, next);
            max_move = max_move.max(moved);
            node.point = next;
        }
        if round >= min_iter && max_move < CONVERGED_MM {
            debug!("recenter converged after {round} rounds");
            break;
        }
    }
}
