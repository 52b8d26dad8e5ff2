//! 体素邻接图. 每个连通分量一张图, 结点负载泛型化以同时覆盖
//! 整数强度与浮点权重两类体数据.
//!
//! 图不保存显式边表: 结点按坐标建哈希索引, 邻接关系在搜索时按
//! 连通规则即时推导 (坐标查找 O(1)). 每个结点恰好属于一张图.

use std::collections::{HashMap, VecDeque};

use itertools::iproduct;
use log::debug;
use ordered_float::NotNan;

use crate::{Idx3d, Resolution, Result, Volume};

/// 邻接连通规则.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Connectivity {
    /// 6-连通: 仅面相邻.
    N6,
    /// 18-连通: 面与棱相邻.
    N18,
    /// 26-连通: 面, 棱与角相邻.
    #[default]
    N26,
}

/// 6 个面方向偏移.
const FACES: [(i64, i64, i64); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// 12 个棱方向偏移.
const EDGES: [(i64, i64, i64); 12] = [
    (0, 1, 1),
    (0, 1, -1),
    (0, -1, 1),
    (0, -1, -1),
    (1, 0, 1),
    (1, 0, -1),
    (-1, 0, 1),
    (-1, 0, -1),
    (1, 1, 0),
    (1, -1, 0),
    (-1, 1, 0),
    (-1, -1, 0),
];

/// 8 个角方向偏移.
const CORNERS: [(i64, i64, i64); 8] = [
    (1, 1, 1),
    (1, 1, -1),
    (1, -1, 1),
    (1, -1, -1),
    (-1, 1, 1),
    (-1, 1, -1),
    (-1, -1, 1),
    (-1, -1, -1),
];

/// 26 个方向偏移, 面-棱-角顺序.
const N26_OFFSETS: [(i64, i64, i64); 26] = {
    let mut all = [(0i64, 0i64, 0i64); 26];
    let mut i = 0;
    while i < 6 {
        all[i] = FACES[i];
        i += 1;
    }
    let mut j = 0;
    while j < 12 {
        all[6 + j] = EDGES[j];
        j += 1;
    }
    let mut k = 0;
    while k < 8 {
        all[18 + k] = CORNERS[k];
        k += 1;
    }
    all
};

impl Connectivity {
    /// 该连通规则下的邻居偏移表 `(dz, dh, dw)`.
    #[inline]
    pub fn offsets(&self) -> &'static [(i64, i64, i64)] {
        match self {
            Connectivity::N6 => &N26_OFFSETS[..6],
            Connectivity::N18 => &N26_OFFSETS[..18],
            Connectivity::N26 => &N26_OFFSETS[..],
        }
    }
}

/// 图结点负载约束: 整数强度 (`u16`) 与浮点权重 (`f32`)
/// 共用同一套图实现.
pub trait GraphValue: Copy + PartialOrd + num::Zero + Into<f64> + std::fmt::Debug + 'static {}

impl GraphValue for u16 {}
impl GraphValue for f32 {}

/// 图结点. 为 Dijkstra 搜索保留路径状态
/// (`path_cost` 初始化为 +∞, 源结点为 0; `predecessor`
/// 在搜索结束后构成单亲树).
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// 体素坐标 `(z, h, w)`.
    pub pos: Idx3d,
    /// 源体数据采样值.
    pub value: T,
    /// 量化 DFE.
    pub dfe: u16,
    /// modified DFE, 平台区区分用.
    pub mdfe: f32,
    /// 结点代价权重 (由所选代价函数变体填充).
    pub weight: f32,
    /// 累计路径代价.
    pub path_cost: f32,
    /// 距源结点的路径步数.
    pub path_len: usize,
    /// 前驱结点下标 (本图内).
    pub predecessor: Option<usize>,
    /// 局部 center of mass, 浮点索引坐标 `(z, h, w)`.
    pub center_of_mass: Option<[f32; 3]>,
    /// 回溯标记.
    pub graphed: bool,
    /// 是否已属于某条中心线.
    pub is_centerline: bool,
}

impl<T: GraphValue> GraphNode<T> {
    /// 创建初始状态结点.
    pub fn new(pos: Idx3d, value: T) -> Self {
        Self {
            pos,
            value,
            dfe: 0,
            mdfe: 0.0,
            weight: 0.0,
            path_cost: f32::INFINITY,
            path_len: 0,
            predecessor: None,
            center_of_mass: None,
            graphed: false,
            is_centerline: false,
        }
    }

    /// 把结点恢复到算法初始状态, 以便重新搜索.
    pub fn algorithm_reset(&mut self) {
        self.path_cost = f32::INFINITY;
        self.predecessor = None;
        self.path_len = 0;
        self.graphed = false;
        self.is_centerline = false;
    }
}

/// 一个连通分量的体素邻接图.
#[derive(Debug, Clone)]
pub struct Graph<T> {
    nodes: Vec<GraphNode<T>>,
    index: HashMap<Idx3d, usize>,
    connectivity: Connectivity,
    source: Option<usize>,
}

impl<T: GraphValue> Graph<T> {
    fn with_connectivity(connectivity: Connectivity) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            connectivity,
            source: None,
        }
    }

    fn push(&mut self, node: GraphNode<T>) -> usize {
        let i = self.nodes.len();
        self.index.insert(node.pos, i);
        self.nodes.push(node);
        i
    }

    /// 结点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 图是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 按下标取结点.
    #[inline]
    pub fn node(&self, i: usize) -> &GraphNode<T> {
        &self.nodes[i]
    }

    /// 按下标取可变结点.
    #[inline]
    pub fn node_mut(&mut self, i: usize) -> &mut GraphNode<T> {
        &mut self.nodes[i]
    }

    /// 全部结点.
    #[inline]
    pub fn nodes(&self) -> &[GraphNode<T>] {
        &self.nodes
    }

    /// 按坐标查找结点下标.
    #[inline]
    pub fn find(&self, pos: Idx3d) -> Option<usize> {
        self.index.get(&pos).copied()
    }

    /// 本图的连通规则.
    #[inline]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// 源结点下标.
    #[inline]
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    /// 设置源结点. 所有最低代价路径都回溯到该结点.
    #[inline]
    pub fn set_source(&mut self, i: usize) {
        debug_assert!(i < self.nodes.len());
        self.source = Some(i);
    }

    /// 即时推导结点 `i` 的邻接结点下标.
    pub fn neighbours(&self, i: usize) -> Vec<usize> {
        let (z, h, w) = self.nodes[i].pos;
        let mut adj = Vec::with_capacity(self.connectivity.offsets().len());
        for &(dz, dh, dw) in self.connectivity.offsets() {
            let p = (
                (z as i64 + dz) as usize,
                (h as i64 + dh) as usize,
                (w as i64 + dw) as usize,
            );
            if let Some(&j) = self.index.get(&p) {
                adj.push(j);
            }
        }
        adj
    }

    /// 图中最大 (最深) 的 z 值.
    pub fn max_z(&self) -> usize {
        self.nodes.iter().map(|n| n.pos.0).max().unwrap_or(0)
    }

    /// 把全部结点恢复到算法初始状态.
    pub fn algorithm_reset(&mut self) {
        for n in self.nodes.iter_mut() {
            n.algorithm_reset();
        }
    }

    /// 选择源结点: 存在 MDFE 时取最大 MDFE 结点, 否则取最小
    /// 非零权重结点; 两种情况都要求结点有邻居.
    ///
    /// 并列时取离并列集合质心物理距离最近者, 仍并列取最先
    /// 遍历到者. 对相同输入结果稳定.
    pub fn find_best_source(&mut self, res: &Resolution) -> Option<usize> {
        let has_mdfe = self.nodes.iter().any(|n| n.mdfe > 0.0);
        let mut best_ties: Vec<usize> = Vec::new();

        if has_mdfe {
            let mut max_mdfe = 0.0f32;
            for i in 0..self.nodes.len() {
                let mdfe = self.nodes[i].mdfe;
                if mdfe >= max_mdfe && !self.neighbours(i).is_empty() {
                    if mdfe > max_mdfe {
                        best_ties.clear();
                    }
                    max_mdfe = mdfe;
                    best_ties.push(i);
                }
            }
        } else {
            debug!("no MDFE, fall back to minimum non-zero weight root node");
            let mut min_weight = f32::MAX;
            for i in 0..self.nodes.len() {
                let weight = self.nodes[i].weight;
                if weight != 0.0 && weight <= min_weight && !self.neighbours(i).is_empty() {
                    if weight < min_weight {
                        best_ties.clear();
                    }
                    min_weight = weight;
                    best_ties.push(i);
                }
            }
        }

        let source = match best_ties.len() {
            0 => None,
            1 => Some(best_ties[0]),
            n => {
                // 取离并列集合质心最近者
                let (mut sz, mut sh, mut sw) = (0.0f64, 0.0f64, 0.0f64);
                for &i in best_ties.iter() {
                    let (z, h, w) = self.nodes[i].pos;
                    sz += z as f64;
                    sh += h as f64;
                    sw += w as f64;
                }
                let ave = [sz / n as f64, sh / n as f64, sw / n as f64];
                best_ties.into_iter().min_by_key(|&i| {
                    let (z, h, w) = self.nodes[i].pos;
                    let d = res.distance_f64([z as f64, h as f64, w as f64], ave);
                    (NotNan::new(d).unwrap(), i)
                })
            }
        };
        self.source = source;
        if let Some(s) = source {
            debug!(
                "graph size: {} source node: {:?} mdfe: {}",
                self.len(),
                self.nodes[s].pos,
                self.nodes[s].mdfe
            );
        }
        source
    }
}

/// 把前景体素组织成逐连通分量的邻接图.
///
/// `foreground` 中正值体素成为结点, 结点负载取自 `values` 的对应
/// 位置 (两者必须形状全等). 体数据边界一圈体素不参与建图,
/// 保证每个结点拥有完整的邻域外壳. 结点数不超过 `low_threshold`
/// 的分量被丢弃 (0 表示全部保留).
///
/// 分量的发现顺序与分量内结点顺序均由 (z, y, x) 栅格序决定,
/// 对相同输入完全可复现.
pub fn build_graphs<M, T>(
    foreground: &Volume<M>,
    values: &Volume<T>,
    connectivity: Connectivity,
    low_threshold: usize,
) -> Result<Vec<Graph<T>>>
where
    M: GraphValue,
    T: GraphValue,
{
    foreground.congruent(values)?;
    let (zs, hs, ws) = foreground.shape();
    if zs < 3 || hs < 3 || ws < 3 {
        return Ok(Vec::new());
    }

    let mut assigned = ndarray::Array3::<bool>::from_elem((zs, hs, ws), false);
    let mut graphs = Vec::new();

    for start in iproduct!(1..zs - 1, 1..hs - 1, 1..ws - 1) {
        if assigned[start] || !(foreground[start] > M::zero()) {
            continue;
        }
        // 从 start 按 BFS 分离一个连通分量
        let mut graph = Graph::with_connectivity(connectivity);
        let mut queue = VecDeque::new();
        assigned[start] = true;
        graph.push(GraphNode::new(start, values[start]));
        queue.push_back(start);

        while let Some((z, h, w)) = queue.pop_front() {
            for &(dz, dh, dw) in connectivity.offsets() {
                let p = (
                    (z as i64 + dz) as usize,
                    (h as i64 + dh) as usize,
                    (w as i64 + dw) as usize,
                );
                if p.0 == 0
                    || p.1 == 0
                    || p.2 == 0
                    || p.0 >= zs - 1
                    || p.1 >= hs - 1
                    || p.2 >= ws - 1
                {
                    continue;
                }
                if !assigned[p] && foreground[p] > M::zero() {
                    assigned[p] = true;
                    graph.push(GraphNode::new(p, values[p]));
                    queue.push_back(p);
                }
            }
        }

        if graph.len() > low_threshold {
            graphs.push(graph);
        }
    }
    debug!("built {} component graphs", graphs.len());
    Ok(graphs)
}

/// 从量化 DFE 体数据为各图结点填充 `dfe` 字段.
pub fn assign_dfe<T: GraphValue>(graphs: &mut [Graph<T>], dfe: &Volume<u16>) {
    for graph in graphs.iter_mut() {
        for i in 0..graph.len() {
            let pos = graph.node(i).pos;
            graph.node_mut(i).dfe = dfe[pos];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{build_graphs, Connectivity};
    use crate::{phantom, Resolution, Volume};
    use ndarray::Array3;

    #[test]
    fn test_connectivity_offsets() {
        assert_eq!(Connectivity::N6.offsets().len(), 6);
        assert_eq!(Connectivity::N18.offsets().len(), 18);
        assert_eq!(Connectivity::N26.offsets().len(), 26);
    }

    #[test]
    fn test_build_graphs_single_component() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::solid_cuboid((8, 8, 8), res, (2, 2, 2), (5, 5, 5), 7);
        let graphs = build_graphs(&mask, &mask, Connectivity::N26, 0).unwrap();
        assert_eq!(graphs.len(), 1);
        // 立方体完全位于内部, 结点数等于前景体素数
        assert_eq!(graphs[0].len(), mask.foreground_count());
        assert_eq!(graphs[0].len(), 4 * 4 * 4);
    }

    #[test]
    fn test_build_graphs_two_components_and_threshold() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut mask = phantom::solid_cuboid((12, 12, 12), res, (2, 2, 2), (4, 4, 4), 7);
        // 第二个不相连的小块
        mask[(8, 8, 8)] = 7;
        mask[(8, 8, 9)] = 7;

        let graphs = build_graphs(&mask, &mask, Connectivity::N26, 0).unwrap();
        assert_eq!(graphs.len(), 2);
        // 栅格序: 大块先被发现
        assert_eq!(graphs[0].len(), 27);
        assert_eq!(graphs[1].len(), 2);

        let graphs = build_graphs(&mask, &mask, Connectivity::N26, 2).unwrap();
        assert_eq!(graphs.len(), 1);
    }

    #[test]
    fn test_neighbour_lookup() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::solid_cuboid((9, 9, 9), res, (2, 2, 2), (6, 6, 6), 1);
        let graphs = build_graphs(&mask, &mask, Connectivity::N26, 0).unwrap();
        let g = &graphs[0];
        let center = g.find((4, 4, 4)).unwrap();
        assert_eq!(g.neighbours(center).len(), 26);
        let corner = g.find((2, 2, 2)).unwrap();
        assert_eq!(g.neighbours(corner).len(), 7);
    }

    #[test]
    fn test_generic_float_payload() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mut weights = Volume::<f32>::from_parts(Array3::zeros((5, 5, 5)), res);
        weights[(2, 2, 2)] = 0.5;
        weights[(2, 2, 3)] = 1.5;
        let graphs = build_graphs(&weights, &weights, Connectivity::N26, 0).unwrap();
        assert_eq!(graphs.len(), 1);
        let g = &graphs[0];
        let i = g.find((2, 2, 3)).unwrap();
        assert_eq!(g.node(i).value, 1.5);
    }

    #[test]
    fn test_find_best_source_deterministic() {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::solid_cuboid((9, 9, 9), res, (2, 2, 2), (6, 6, 6), 1);
        let mut a = build_graphs(&mask, &mask, Connectivity::N26, 0).unwrap();
        let mut b = build_graphs(&mask, &mask, Connectivity::N26, 0).unwrap();
        // 均匀权重, 无 MDFE: 走最小非零权重分支
        for g in a.iter_mut().chain(b.iter_mut()) {
            for i in 0..g.len() {
                g.node_mut(i).weight = 1.0;
            }
        }
        let sa = a[0].find_best_source(&res).unwrap();
        let sb = b[0].find_best_source(&res).unwrap();
        assert_eq!(a[0].node(sa).pos, b[0].node(sb).pos);
    }
}
