//! 基于最低代价路径搜索的中心线提取.
//!
//! 每张连通图独立处理:
//!
//! 1. 按所选代价函数变体为结点赋权 ([`cost`]).
//! 2. 选源结点 (最大 MDFE, 平台并列时取质心最近者).
//! 3. Dijkstra 单源最低代价路径 ([`dijkstra`]).
//! 4. 按 `path_len` 降序从各终端回溯前驱链: 长度达标的链成为
//!    中心线, 不达标的短链作为 surround 附着到汇入的中心线.
//! 5. 逐结点向截面邻域质心迭代 recenter ([`recenter`]).
//! 6. 可选的坏端修剪与动脉瘤旁增强.
//!
//! 空图列表与无法选出源结点的图都不会报错, 相应输出为空.

mod cost;
mod dijkstra;
mod recenter;

pub use cost::CostVariant;

use log::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dfe::{self, DistanceVolume, VoxelDistance};
use crate::graph::{self, Graph};
use crate::pc::PhaseContrast;
use crate::{consts, CancelToken, Idx3d, Resolution, Result, VesselError};

/// 中心线上的一个结点.
#[derive(Debug, Clone)]
pub struct CenterlineNode {
    /// 原体素坐标 `(z, h, w)`.
    pub pos: Idx3d,
    /// recenter 后的浮点索引坐标 `(z, h, w)`.
    pub point: [f64; 3],
    /// 该体素的 DFE, 毫米.
    pub dfe_mm: f64,
}

/// 一条中心线: 从一个终端回溯到源结点 (或汇入点) 的有序结点列.
#[derive(Debug, Clone, Default)]
pub struct Centerline {
    /// 结点序列, 从远端终端指向源结点方向.
    pub nodes: Vec<CenterlineNode>,
    /// 汇入已有中心线的分叉点 (链不以源结点收尾时).
    pub bifurcation: Option<Idx3d>,
    /// 附着的短链体素 (长度不足的回溯链).
    pub surround: Vec<Idx3d>,
}

impl Centerline {
    /// 结点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 是否没有任何结点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 沿结点序列累计的物理路径长度, 毫米.
    pub fn path_length_mm(&self, res: &Resolution) -> f64 {
        self.nodes
            .windows(2)
            .map(|w| res.distance_f64(w[0].point, w[1].point))
            .sum()
    }
}

/// 一张连通图的全部中心线, 标注所用代价函数变体与分辨率.
#[derive(Debug, Clone)]
pub struct CenterlineGraph {
    /// 中心线集合.
    pub centerlines: Vec<Centerline>,
    /// 源结点体素坐标.
    pub source: Idx3d,
    /// 中心线树的终端体素.
    pub tree_ends: Vec<Idx3d>,
    /// 所用代价函数变体.
    pub variant: CostVariant,
    /// 计算时的体素分辨率.
    pub resolution: Resolution,
}

impl CenterlineGraph {
    /// 全部中心线结点总数.
    pub fn node_count(&self) -> usize {
        self.centerlines.iter().map(Centerline::len).sum()
    }

    /// 结点最多的一条中心线.
    pub fn longest(&self) -> Option<&Centerline> {
        self.centerlines.iter().max_by_key(|c| c.len())
    }
}

/// 动脉瘤旁增强配置.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnhanceConfig {
    /// 端部 DFE 相对线均值的下限比例, 达到才尝试延伸.
    pub intensity_ratio: f64,
    /// 线长相对最短线长的下限比例, 达到才尝试延伸.
    pub size_ratio: f64,
    /// 候选体素 DFE 相对端部 DFE 的延伸接受比例.
    pub dfc_dfe_ratio: f64,
    /// 每个端部最多延伸的结点数.
    pub extend: usize,
}

/// 中心线提取配置. 默认值取 [`consts`] 中的缺省口径.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CenterlineConfig {
    /// 代价函数变体.
    pub variant: CostVariant,

    /// center-of-mass 项权重指数 `A`.
    pub a: f32,

    /// DFE 项权重指数 `B`.
    pub b: f32,

    /// MDFE 同值邻居归一化常数.
    pub n_max: u16,

    /// 边代价下限, 必须严格为正.
    pub fixed_cost: f32,

    /// center-of-mass 位移权重的归一化幂.
    pub mass_weight_power: f64,

    /// 速度对齐衰减常数 `sigma`.
    pub velocity_sigma: f64,

    /// 速度代价幂.
    pub velocity_power: f64,

    /// 相位对比速度场, 速度类变体必需.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub phase_contrast: Option<PhaseContrast>,

    /// recenter 截面邻域窗口半径, 体素.
    pub window_radius: usize,

    /// recenter 最少迭代轮数.
    pub min_recenter: usize,

    /// recenter 最多迭代轮数.
    pub max_recenter: usize,

    /// 中心线最少结点数.
    pub min_line_length: usize,

    /// 是否修剪 DFE 异常的线端.
    pub fix_bad_ends: bool,

    /// 坏端判定: 端部 DFE 低于该比例乘以线中位 DFE 时剔除.
    pub line_dfe_ratio: f64,

    /// 动脉瘤旁增强, `None` 关闭.
    pub enhance: Option<EnhanceConfig>,

    /// 协作式取消标志.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel: CancelToken,
}

impl Default for CenterlineConfig {
    fn default() -> Self {
        Self {
            variant: CostVariant::default(),
            a: consts::WEIGHT_A,
            b: consts::WEIGHT_B,
            n_max: consts::N_MAX,
            fixed_cost: consts::FIXED_COST,
            mass_weight_power: consts::MASS_WEIGHT_POWER,
            velocity_sigma: 1.0,
            velocity_power: 1.0,
            phase_contrast: None,
            window_radius: consts::RECENTER_WINDOW,
            min_recenter: consts::RECENTER_MIN,
            max_recenter: consts::RECENTER_MAX,
            min_line_length: consts::MIN_LINE_LENGTH,
            fix_bad_ends: false,
            line_dfe_ratio: consts::LINE_DFE_RATIO,
            enhance: None,
            cancel: CancelToken::new(),
        }
    }
}

impl CenterlineConfig {
    /// 在计算开始前校验配置一致性.
    pub fn validate(&self) -> Result<()> {
        let err = |m: &str| Err(VesselError::Config(m.to_string()));
        if !(self.fixed_cost.is_finite() && self.fixed_cost > 0.0) {
            return err("fixed_cost 必须严格为正 (非负边代价的硬性前提)");
        }
        if !self.a.is_finite() || !self.b.is_finite() || self.a < 0.0 || self.b < 0.0 {
            return err("权重指数 a/b 必须为非负有限值");
        }
        if !self.mass_weight_power.is_finite() {
            return err("mass_weight_power 必须为有限值");
        }
        if !self.velocity_sigma.is_finite() || self.velocity_sigma < 0.0 {
            return err("velocity_sigma 必须为非负有限值");
        }
        if !self.velocity_power.is_finite() || self.velocity_power < 0.0 {
            return err("velocity_power 必须为非负有限值");
        }
        if self.min_recenter > self.max_recenter {
            return err("min_recenter 不得大于 max_recenter");
        }
        if self.min_line_length < 2 {
            return err("min_line_length 至少为 2");
        }
        if !(0.0..=1.0).contains(&self.line_dfe_ratio) {
            return err("line_dfe_ratio 必须落在 [0, 1]");
        }
        if self.n_max == 0 {
            return err("n_max 必须为正");
        }
        Ok(())
    }
}

/// 对全部连通图提取中心线.
///
/// `dfe_vol` 为分割 mask 的量化 DFE 体数据; 结点的 DFE/MDFE
/// 由此填充. 速度类变体在缺少相位对比数据时退回
/// [`CostVariant::DfeWeightedCom`] 并告警 (不报错).
pub fn find_centerlines(
    graphs: &mut [Graph<u16>],
    dfe_vol: &DistanceVolume,
    config: &CenterlineConfig,
) -> Result<Vec<CenterlineGraph>> {
    config.validate()?;

    let mut variant = config.variant;
    if variant.needs_phase_contrast() && config.phase_contrast.is_none() {
        warn!(
            "missing phase contrast volumes, centerline algorithm falls back to {}",
            CostVariant::DfeWeightedCom.label()
        );
        variant = CostVariant::DfeWeightedCom;
    }
    if let Some(pc) = config.phase_contrast.as_ref() {
        pc.congruent(dfe_vol)?;
    }

    let res = *dfe_vol.res();
    let z_size = dfe_vol.len_z();

    graph::assign_dfe(graphs, dfe_vol);
    dfe::modify_dfe(graphs, config.n_max);

    let com_params = cost::ComParams {
        iterations_min: config.min_recenter,
        iterations_max: config.max_recenter,
        weight_power: config.mass_weight_power,
        dfe_weighted: variant != CostVariant::Com,
        fixed_cost: config.fixed_cost,
    };
    match (variant, config.phase_contrast.as_ref()) {
        (CostVariant::Dfe, _) => {
            cost::weight_dfe(graphs, config.a, config.b, config.fixed_cost);
        }
        (CostVariant::VelocityCom, Some(pc)) => {
            cost::weight_velocity_com(graphs, &res, pc, &com_params);
        }
        _ => {
            cost::weight_com(graphs, &res, &com_params);
        }
    }

    let mut out = Vec::new();
    for graph in graphs.iter_mut() {
        config.cancel.check()?;
        if graph.is_empty() {
            continue;
        }
        let Some(source) = graph.find_best_source(&res) else {
            continue;
        };

        let mode = match (variant, config.phase_contrast.as_ref()) {
            (CostVariant::DfeComPcCrossNorm, Some(pc)) => dijkstra::EdgeCostMode::WeightTimesPc(
                cost::PcEdge::new(pc, res, config.velocity_sigma, config.velocity_power),
            ),
            (CostVariant::VelocityCost, Some(pc)) => dijkstra::EdgeCostMode::PcOnly(
                cost::PcEdge::new(pc, res, config.velocity_sigma, config.velocity_power),
            ),
            _ => dijkstra::EdgeCostMode::Weight,
        };
        dijkstra::lowest_cost_paths(
            graph,
            source,
            z_size,
            &mode,
            config.fixed_cost,
            &config.cancel,
            None,
        )?;

        let mut cg = backtrace_centerlines(graph, source, config.min_line_length, variant, res);
        for line in cg.centerlines.iter_mut() {
            recenter::recenter_line(
                line,
                dfe_vol,
                config.window_radius,
                config.min_recenter,
                config.max_recenter,
            );
        }
        if config.fix_bad_ends {
            fix_bad_ends(&mut cg, config);
        }
        if let Some(en) = config.enhance.as_ref() {
            for line in cg.centerlines.iter_mut() {
                enhance_line(line, dfe_vol, en, config.min_line_length);
            }
        }
        info!(
            "graph source {:?}: {} centerlines, {} tree ends",
            cg.source,
            cg.centerlines.iter().filter(|c| !c.is_empty()).count(),
            cg.tree_ends.len()
        );
        out.push(cg);
    }
    Ok(out)
}

/// 从所有终端按 `path_len` 降序回溯前驱链, 组装中心线.
fn backtrace_centerlines(
    graph: &mut Graph<u16>,
    source: usize,
    min_line_length: usize,
    variant: CostVariant,
    resolution: Resolution,
) -> CenterlineGraph {
    let mut order: Vec<usize> = (0..graph.len()).collect();
    order.sort_by(|&x, &y| {
        graph
            .node(y)
            .path_len
            .cmp(&graph.node(x).path_len)
            .then(x.cmp(&y))
    });

    // 0 号为源结点锚线: 汇到源结点的短链附着在这里
    let mut lines: Vec<Centerline> = vec![Centerline::default()];
    let mut node_line: Vec<Option<usize>> = vec![None; graph.len()];
    node_line[source] = Some(0);
    let mut tree_ends: Vec<Idx3d> = Vec::new();

    for &start in order.iter() {
        if graph.node(start).graphed {
            continue;
        }
        let mut chain: Vec<usize> = Vec::new();
        let mut join: Option<usize> = None;
        let mut cur = start;
        loop {
            if cur == source {
                graph.node_mut(source).graphed = true;
                chain.push(source);
                break;
            }
            if graph.node(cur).graphed {
                join = Some(cur);
                break;
            }
            graph.node_mut(cur).graphed = true;
            chain.push(cur);
            match graph.node(cur).predecessor {
                Some(p) => cur = p,
                None => break, // 不可达孤链
            }
        }
        if chain.is_empty() {
            continue;
        }

        if chain.len() >= min_line_length {
            let id = lines.len();
            let mut nodes = Vec::with_capacity(chain.len());
            for &i in chain.iter() {
                if i != source {
                    node_line[i] = Some(id);
                }
                let n = graph.node_mut(i);
                n.is_centerline = true;
                nodes.push(CenterlineNode {
                    pos: n.pos,
                    point: [n.pos.0 as f64, n.pos.1 as f64, n.pos.2 as f64],
                    dfe_mm: VoxelDistance::to_mm(n.dfe),
                });
            }
            let last = *chain.last().unwrap();
            let bifurcation = (last != source).then(|| graph.node(last).pos);
            tree_ends.push(graph.node(start).pos);
            lines.push(Centerline {
                nodes,
                bifurcation,
                surround: Vec::new(),
            });
        } else {
            // 短链: 附着到汇入线 (或源锚线)
            let attach = join.and_then(|j| node_line[j]).unwrap_or(0);
            let positions: Vec<Idx3d> = chain.iter().map(|&i| graph.node(i).pos).collect();
            lines[attach].surround.extend(positions);
        }
    }

    // 丢弃没有任何内容的锚线
    lines.retain(|l| !l.nodes.is_empty() || !l.surround.is_empty());

    CenterlineGraph {
        centerlines: lines,
        source: graph.node(source).pos,
        tree_ends,
        variant,
        resolution,
    }
}

/// 修剪 DFE 异常的线端: 端部 DFE 低于 `line_dfe_ratio` 乘以线
/// 中位 DFE 的结点被剔除, 修剪后长度不足的线整体丢弃.
fn fix_bad_ends(cg: &mut CenterlineGraph, config: &CenterlineConfig) {
    let ratio = config.line_dfe_ratio;
    for line in cg.centerlines.iter_mut() {
        if line.nodes.len() < 3 {
            continue;
        }
        let mut dfes: Vec<f64> = line.nodes.iter().map(|n| n.dfe_mm).collect();
        dfes.sort_by(|a, b| a.total_cmp(b));
        let median = dfes[dfes.len() / 2];
        let bound = ratio * median;

        let keep_from = line.nodes.iter().position(|n| n.dfe_mm >= bound);
        let keep_to = line.nodes.iter().rposition(|n| n.dfe_mm >= bound);
        match (keep_from, keep_to) {
            (Some(a), Some(b)) if a <= b => {
                line.nodes.drain(b + 1..);
                line.nodes.drain(..a);
            }
            _ => line.nodes.clear(),
        }
    }
    cg.centerlines
        .retain(|l| l.nodes.len() >= config.min_line_length || !l.surround.is_empty());
    // 终端随修剪而变化, 由存活线的远端重建
    cg.tree_ends = cg
        .centerlines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.nodes[0].pos)
        .filter(|&p| p != cg.source)
        .collect();
}

/// 动脉瘤旁增强: 端部 DFE 足够大 (仍在粗血管内) 且线长达标时,
/// 沿 DFE 最大的前景邻居延伸端部, 之后对整条线做三点平滑.
fn enhance_line(
    line: &mut Centerline,
    dfe_vol: &DistanceVolume,
    en: &EnhanceConfig,
    min_line_length: usize,
) {
    if line.nodes.is_empty()
        || (line.nodes.len() as f64) < en.size_ratio * min_line_length as f64
    {
        return;
    }
    let mean_dfe = line.nodes.iter().map(|n| n.dfe_mm).sum::<f64>() / line.nodes.len() as f64;

    for front in [true, false] {
        let end = if front {
            line.nodes.first().unwrap()
        } else {
            line.nodes.last().unwrap()
        };
        let end_dfe = end.dfe_mm;
        if end_dfe < en.intensity_ratio * mean_dfe {
            continue;
        }
        let mut cur = end.pos;
        let mut added = Vec::new();
        let mut taken: std::collections::HashSet<Idx3d> =
            line.nodes.iter().map(|n| n.pos).collect();
        for _ in 0..en.extend {
            let mut best: Option<(u16, Idx3d)> = None;
            for p in dfe_vol.cube_neighbours(cur) {
                let d = dfe_vol[p];
                if d == 0 || taken.contains(&p) {
                    continue;
                }
                if best.map_or(true, |(bd, bp)| d > bd || (d == bd && p < bp)) {
                    best = Some((d, p));
                }
            }
            let Some((d, p)) = best else { break };
            if VoxelDistance::to_mm(d) < en.dfc_dfe_ratio * end_dfe {
                break;
            }
            taken.insert(p);
            added.push(CenterlineNode {
                pos: p,
                point: [p.0 as f64, p.1 as f64, p.2 as f64],
                dfe_mm: VoxelDistance::to_mm(d),
            });
            cur = p;
        }
        if front {
            for node in added.into_iter() {
                line.nodes.insert(0, node);
            }
        } else {
            line.nodes.extend(added);
        }
    }

    // 三点滑动平均, 端点不动
    if line.nodes.len() >= 3 {
        let pts: Vec<[f64; 3]> = line.nodes.iter().map(|n| n.point).collect();
        for i in 1..pts.len() - 1 {
            for k in 0..3 {
                line.nodes[i].point[k] = (pts[i - 1][k] + pts[i][k] + pts[i + 1][k]) / 3.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{find_centerlines, CenterlineConfig, CostVariant};
    use crate::segment::{segment, SegmentConfig};
    use crate::{cluster, dfe, graph, phantom, tortuosity, Resolution};

    fn centerline_config() -> CenterlineConfig {
        CenterlineConfig {
            variant: CostVariant::Dfe,
            min_line_length: 10,
            window_radius: 2,
            min_recenter: 2,
            max_recenter: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validate() {
        let mut cfg = CenterlineConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.fixed_cost = 0.0;
        assert!(cfg.validate().is_err());
        cfg = CenterlineConfig {
            min_recenter: 9,
            max_recenter: 3,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        cfg = CenterlineConfig {
            line_dfe_ratio: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_graph_list() {
        let res = Resolution::isotropic(1.0).unwrap();
        let dfev = crate::Volume::<u16>::zeros((6, 6, 6), res);
        let out = find_centerlines(&mut [], &dfev, &centerline_config()).unwrap();
        assert!(out.is_empty());
    }

    /// 螺旋管全流程: segment -> cluster -> DFE -> graph ->
    /// centerline -> tortuosity. 返回 (中心线数, 主线 z 范围, 评分).
    fn helix_pipeline(pitch_mm: f64) -> (usize, (usize, usize), f64) {
        let res = Resolution::isotropic(1.0).unwrap();
        let shape = (40, 30, 30);
        let mut vol = phantom::helix_tube(shape, res, 8.0, pitch_mm, 2.0, 1000);
        // 在螺旋高端加一个球形膨大 (动脉瘤样), 源结点固定于此
        let theta = std::f64::consts::TAU * 34.0 / pitch_mm;
        phantom::stamp_ball(
            &mut vol,
            [36.0, 15.0 + 8.0 * theta.cos(), 15.0 + 8.0 * theta.sin()],
            3.4,
            1000,
        );

        let seg_cfg = SegmentConfig {
            min_seed_size_2d: 5,
            min_cluster_size_3d: 50,
            max_chisq: 40.0,
            z_diff: 6.0,
            hole_fill_radius: 2,
            ..Default::default()
        };
        let seg = segment(&vol, &seg_cfg).unwrap();
        assert!(seg.mask.foreground_count() > 0);

        let clusters = cluster::label_clusters(&seg.mask);
        assert_eq!(clusters.len(), 1, "螺旋管应当是唯一的簇");

        let dfev = dfe::distance_from_edge(&seg.mask).unwrap();
        let mut graphs =
            graph::build_graphs(&dfev, &seg.mask, Default::default(), 0).unwrap();
        assert_eq!(graphs.len(), 1, "螺旋管应当是唯一的图");

        let cgs = find_centerlines(&mut graphs, &dfev, &centerline_config()).unwrap();
        assert_eq!(cgs.len(), 1);
        let cg = &cgs[0];
        let main_lines: Vec<_> = cg.centerlines.iter().filter(|c| !c.is_empty()).collect();
        assert_eq!(main_lines.len(), 1, "应当恰有一条中心线");
        let line = main_lines[0];

        let z_min = line.nodes.iter().map(|n| n.pos.0).min().unwrap();
        let z_max = line.nodes.iter().map(|n| n.pos.0).max().unwrap();
        let (score, records) = tortuosity::score(line, &cg.resolution, 0.5);
        assert!(!records.is_empty());
        (main_lines.len(), (z_min, z_max), score)
    }

    #[test]
    fn test_helix_end_to_end_and_pitch_monotonicity() {
        let (n_loose, (z_min, z_max), score_loose) = helix_pipeline(24.0);
        assert_eq!(n_loose, 1);
        // 中心线纵贯螺旋
        assert!(z_min <= 6, "z_min = {z_min}");
        assert!(z_max >= 32, "z_max = {z_max}");
        assert!(score_loose > 1.0);

        let (_, _, score_tight) = helix_pipeline(14.0);
        // 螺距越小 (缠绕越紧), 迂曲度严格上升
        assert!(
            score_tight > score_loose,
            "tight {score_tight} <= loose {score_loose}"
        );
    }

    #[test]
    fn test_y_branch_two_paths_share_source_region() {
        let res = Resolution::isotropic(1.0).unwrap();
        let (mask, _) = phantom::y_branch((36, 28, 28), res, 2.0, 700);
        let dfev = dfe::distance_from_edge(&mask).unwrap();
        let mut graphs = graph::build_graphs(&dfev, &mask, Default::default(), 0).unwrap();
        assert_eq!(graphs.len(), 1, "Y 形结构应当是一张连通图");

        let cfg = CenterlineConfig {
            min_line_length: 8,
            ..centerline_config()
        };
        let cgs = find_centerlines(&mut graphs, &dfev, &cfg).unwrap();
        assert_eq!(cgs.len(), 1);
        let cg = &cgs[0];

        assert!(cg.tree_ends.len() >= 2, "终端数: {}", cg.tree_ends.len());
        let main_lines: Vec<_> = cg.centerlines.iter().filter(|c| !c.is_empty()).collect();
        assert!(main_lines.len() >= 2, "中心线数: {}", main_lines.len());

        // 各主线的近源端都落在源结点附近 (共享近源区域)
        let near = main_lines
            .iter()
            .filter(|l| {
                let last = l.nodes.last().unwrap().pos;
                res.distance(last, cg.source) <= 6.0
            })
            .count();
        assert!(near >= 2, "近源主线数: {near}");
    }

    #[test]
    fn test_fix_bad_ends_trims_low_dfe_tail() {
        let res = Resolution::isotropic(1.0).unwrap();
        // 直管: 中心线端部本来就会落在 DFE 低的管口
        let mask = phantom::straight_tube((36, 13, 13), res, (6, 6), 3.0, 800);
        let dfev = dfe::distance_from_edge(&mask).unwrap();
        let mut graphs = graph::build_graphs(&dfev, &mask, Default::default(), 0).unwrap();
        let plain = find_centerlines(&mut graphs, &dfev, &centerline_config()).unwrap();
        let plain_len = plain[0].longest().unwrap().len();

        let mut graphs = graph::build_graphs(&dfev, &mask, Default::default(), 0).unwrap();
        let cfg = CenterlineConfig {
            fix_bad_ends: true,
            line_dfe_ratio: 0.9,
            ..centerline_config()
        };
        let fixed = find_centerlines(&mut graphs, &dfev, &cfg).unwrap();
        let line = fixed[0].longest().unwrap();
        assert!(!line.is_empty());
        assert!(line.len() <= plain_len);
        // 修剪后两端结点的 DFE 不低于中位数的九成
        let mut dfes: Vec<f64> = line.nodes.iter().map(|n| n.dfe_mm).collect();
        dfes.sort_by(|a, b| a.total_cmp(b));
        let median = dfes[dfes.len() / 2];
        for n in [line.nodes.first().unwrap(), line.nodes.last().unwrap()] {
            assert!(n.dfe_mm >= 0.9 * median - 1e-9);
        }
    }
}
