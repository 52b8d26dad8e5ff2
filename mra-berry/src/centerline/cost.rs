//! 代价函数变体: 结点权重的计算与相位对比速度边代价.
//!
//! 所有变体产出的边代价都不为负, 并由固定下限保证严格为正,
//! 这是最短路搜索以最优路径终止的硬性前提.

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::pc::PhaseContrast;
use crate::{Idx3d, Resolution};

/// 中心线代价函数变体.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CostVariant {
    /// 仅逆 DFE 项: 路径倾向远离血管壁.
    Dfe,

    /// 仅局部 center-of-mass 偏移项.
    Com,

    /// DFE 加权的 center-of-mass (缺省变体).
    #[default]
    DfeWeightedCom,

    /// DFE 加权 center-of-mass 乘以相位对比叉积归一项.
    DfeComPcCrossNorm,

    /// 纯相位对比速度代价.
    VelocityCost,

    /// 速度加权 center-of-mass.
    VelocityCom,
}

impl CostVariant {
    /// 变体标签, 标注输出与持久化用.
    pub fn label(&self) -> &'static str {
        match self {
            CostVariant::Dfe => "DFE",
            CostVariant::Com => "COM",
            CostVariant::DfeWeightedCom => "DFEWTCOM",
            CostVariant::DfeComPcCrossNorm => "DFEWTCOM_MPCNorm",
            CostVariant::VelocityCost => "VelocCost",
            CostVariant::VelocityCom => "VelocCOM",
        }
    }

    /// 该变体是否需要相位对比速度场.
    pub fn needs_phase_contrast(&self) -> bool {
        matches!(
            self,
            CostVariant::DfeComPcCrossNorm | CostVariant::VelocityCost | CostVariant::VelocityCom
        )
    }
}

/// center-of-mass 权重计算参数.
pub(crate) struct ComParams {
    pub iterations_min: usize,
    pub iterations_max: usize,
    pub weight_power: f64,
    pub dfe_weighted: bool,
    pub fixed_cost: f32,
}

/// 逆 DFE 结点权重:
/// `w = a * (1 - mdfe / maxNeighborMdfe)^b + fixed_cost`.
///
/// 越靠近血管中轴 (MDFE 越接近局部最大) 权重越低.
pub(crate) fn weight_dfe(graphs: &mut [Graph<u16>], a: f32, b: f32, fixed_cost: f32) {
    for graph in graphs.iter_mut() {
        for i in 0..graph.len() {
            let mdfe = graph.node(i).mdfe;
            if mdfe <= 0.0 {
                continue;
            }
            let mut max_mdfe = mdfe;
            for n in graph.neighbours(i) {
                max_mdfe = max_mdfe.max(graph.node(n).mdfe);
            }
            let sub = 1.0 - mdfe / max_mdfe;
            graph.node_mut(i).weight = a * sub.powf(b) + fixed_cost;
        }
    }
}

/// center-of-mass 结点权重.
///
/// 每个结点的初始 COM 为自身与邻居坐标的 (可选 DFE 加权) 质心,
/// 初始权重为结点到 COM 的物理距离; 随后迭代把 COM 替换为邻域
/// COM 的加权均值并把每轮位移累加进权重, 位移收敛或达到迭代上限
/// 为止. 最后对全体图做最小非零归一并取幂.
/// 居中的结点 (几乎不动) 权重小, 靠壁的结点权重大.
pub(crate) fn weight_com(graphs: &mut [Graph<u16>], res: &Resolution, p: &ComParams) {
    let dfe_wt = |dfe: u16| -> f64 {
        if p.dfe_weighted {
            dfe.max(1) as f64
        } else {
            1.0
        }
    };

    // 初始 COM 与首轮权重
    for graph in graphs.iter_mut() {
        for i in 0..graph.len() {
            let (z, h, w) = graph.node(i).pos;
            let wt = dfe_wt(graph.node(i).dfe);
            let mut sums = [z as f64 * wt, h as f64 * wt, w as f64 * wt];
            let mut total = wt;
            for n in graph.neighbours(i) {
                let (nz, nh, nw) = graph.node(n).pos;
                let nwt = dfe_wt(graph.node(n).dfe);
                sums[0] += nz as f64 * nwt;
                sums[1] += nh as f64 * nwt;
                sums[2] += nw as f64 * nwt;
                total += nwt;
            }
            let com = [
                (sums[0] / total) as f32,
                (sums[1] / total) as f32,
                (sums[2] / total) as f32,
            ];
            let node = graph.node_mut(i);
            node.center_of_mass = Some(com);
            node.weight = res.distance_f64(
                [z as f64, h as f64, w as f64],
                [com[0] as f64, com[1] as f64, com[2] as f64],
            ) as f32;
        }
    }

    // 迭代 recenter, 每轮位移累加进权重
    for round in 2..=p.iterations_max {
        let mut max_delta = 0.0f64;
        for graph in graphs.iter_mut() {
            let mut next: Vec<[f32; 3]> = Vec::with_capacity(graph.len());
            for i in 0..graph.len() {
                let com = graph.node(i).center_of_mass.unwrap();
                let wt = dfe_wt(graph.node(i).dfe);
                let mut sums = [
                    com[0] as f64 * wt,
                    com[1] as f64 * wt,
                    com[2] as f64 * wt,
                ];
                let mut total = wt;
                for n in graph.neighbours(i) {
                    if let Some(ncom) = graph.node(n).center_of_mass {
                        let nwt = dfe_wt(graph.node(n).dfe);
                        sums[0] += ncom[0] as f64 * nwt;
                        sums[1] += ncom[1] as f64 * nwt;
                        sums[2] += ncom[2] as f64 * nwt;
                        total += nwt;
                    }
                }
                next.push([
                    (sums[0] / total) as f32,
                    (sums[1] / total) as f32,
                    (sums[2] / total) as f32,
                ]);
            }
            for i in 0..graph.len() {
                let com = graph.node(i).center_of_mass.unwrap();
                let delta = res.distance_f64(
                    [com[0] as f64, com[1] as f64, com[2] as f64],
                    [next[i][0] as f64, next[i][1] as f64, next[i][2] as f64],
                );
                max_delta = max_delta.max(delta);
                let node = graph.node_mut(i);
                node.weight += delta as f32;
                node.center_of_mass = Some(next[i]);
            }
        }
        if round >= p.iterations_min && max_delta < 1e-4 {
            break;
        }
    }

    normalize_weights(graphs, p.weight_power, p.fixed_cost);
}

/// 速度加权 center-of-mass 权重: COM 以相位对比速度分量加权,
/// 权重为结点到 COM 物理距离的平方, 归一方式与 [`weight_com`]
/// 相同.
pub(crate) fn weight_velocity_com(
    graphs: &mut [Graph<u16>],
    res: &Resolution,
    pc: &PhaseContrast,
    p: &ComParams,
) {
    for graph in graphs.iter_mut() {
        for i in 0..graph.len() {
            let (z, h, w) = graph.node(i).pos;
            let [vx, vy, vz] = pc.velocity_at((z, h, w));
            // 分量各自加权: (x·vx, y·vy, z·vz)
            let mut sums = [z as f64 * vz, h as f64 * vy, w as f64 * vx];
            let mut totals = [vz, vy, vx];
            let mut fallback = [z as f64, h as f64, w as f64];
            let mut count = 1.0f64;
            for n in graph.neighbours(i) {
                let npos = graph.node(n).pos;
                let [nvx, nvy, nvz] = pc.velocity_at(npos);
                sums[0] += npos.0 as f64 * nvz;
                sums[1] += npos.1 as f64 * nvy;
                sums[2] += npos.2 as f64 * nvx;
                totals[0] += nvz;
                totals[1] += nvy;
                totals[2] += nvx;
                fallback[0] += npos.0 as f64;
                fallback[1] += npos.1 as f64;
                fallback[2] += npos.2 as f64;
                count += 1.0;
            }
            // 分量速度和过小时退化为几何质心
            let com = [
                pick(sums[0], totals[0], fallback[0] / count),
                pick(sums[1], totals[1], fallback[1] / count),
                pick(sums[2], totals[2], fallback[2] / count),
            ];
            let d = res.distance_f64([z as f64, h as f64, w as f64], com);
            let node = graph.node_mut(i);
            node.center_of_mass = Some([com[0] as f32, com[1] as f32, com[2] as f32]);
            node.weight = (d * d) as f32;
        }
    }
    normalize_weights(graphs, p.weight_power, p.fixed_cost);
}

#[inline]
fn pick(sum: f64, total: f64, fallback: f64) -> f64 {
    if total.abs() > 1e-9 {
        sum / total
    } else {
        fallback
    }
}

/// 最小非零归一 + 幂次: `w = (w / minNonZero)^power + fixed_cost`.
fn normalize_weights(graphs: &mut [Graph<u16>], power: f64, fixed_cost: f32) {
    let mut min_non_zero = f32::MAX;
    for graph in graphs.iter() {
        for n in graph.nodes() {
            if n.weight != 0.0 && n.weight < min_non_zero {
                min_non_zero = n.weight;
            }
        }
    }
    if min_non_zero == f32::MAX {
        // 全部结点完全居中 (如单结点图): 统一为固定代价
        for graph in graphs.iter_mut() {
            for i in 0..graph.len() {
                graph.node_mut(i).weight = fixed_cost;
            }
        }
        return;
    }
    debug!("center of mass min non-zero weight: {min_non_zero}");
    for graph in graphs.iter_mut() {
        for i in 0..graph.len() {
            let node = graph.node_mut(i);
            node.weight = (node.weight / min_non_zero).powf(power as f32) + fixed_cost;
        }
    }
}

/// 相位对比速度边代价.
///
/// `cost(u -> v) = (|vel × dir| / (|vel · dir| + sigma))^power`:
/// 与血流方向平行的移动代价低, 正交移动代价高, `sigma`
/// 抑制近零点积的退化. 结果恒为非负.
pub(crate) struct PcEdge<'a> {
    pc: &'a PhaseContrast,
    res: Resolution,
    sigma: f64,
    power: f64,
}

impl<'a> PcEdge<'a> {
    pub(crate) fn new(pc: &'a PhaseContrast, res: Resolution, sigma: f64, power: f64) -> Self {
        Self {
            pc,
            res,
            sigma,
            power,
        }
    }

    /// 从结点 `u` 迈向邻居 `v` 的速度代价.
    pub(crate) fn cost(&self, u: Idx3d, v: Idx3d) -> f32 {
        let vel = self.pc.velocity_at(u);
        // 物理步进向量, (x, y, z) 分量序与速度一致
        let dir = [
            (v.2 as f64 - u.2 as f64) * self.res.x_mm(),
            (v.1 as f64 - u.1 as f64) * self.res.y_mm(),
            (v.0 as f64 - u.0 as f64) * self.res.z_mm(),
        ];
        let cross = [
            vel[1] * dir[2] - vel[2] * dir[1],
            vel[2] * dir[0] - vel[0] * dir[2],
            vel[0] * dir[1] - vel[1] * dir[0],
        ];
        let cross_mag = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
        let dot = (vel[0] * dir[0] + vel[1] * dir[1] + vel[2] * dir[2]).abs();
        let c = (cross_mag / (dot + self.sigma)).powf(self.power);
        if c.is_finite() {
            c as f32
        } else {
            0.0
        }
    }
}
