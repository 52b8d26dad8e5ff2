//! 单源最低代价路径搜索 (Dijkstra).
//!
//! 最小堆按 `(path_cost, 结点下标)` 排序, 过期堆项惰性丢弃;
//! 下标参与比较使得相同输入下的搜索完全确定.
//! 松弛成功时写回 `path_cost` / `predecessor` / `path_len`.

use binary_heap_plus::BinaryHeap;
use log::debug;

use super::cost::PcEdge;
use crate::graph::Graph;
use crate::{CancelToken, Result};

/// 取消检查的弹出批量.
const CANCEL_BATCH: usize = 4096;

/// 边代价口径.
pub(crate) enum EdgeCostMode<'a> {
    /// 仅结点权重.
    Weight,
    /// 结点权重乘以相位对比速度代价.
    WeightTimesPc(PcEdge<'a>),
    /// 仅相位对比速度代价.
    PcOnly(PcEdge<'a>),
}

/// 以 `source` 为源结点搜索全图最低代价路径.
///
/// `z_size` 为体数据 z 层数: 最底层切片上的结点不被展开,
/// 贯穿图像下缘的血管不会把路径引出图像. 给定 `target`
/// 时在弹出目标结点后提前结束 (坏端修补用).
/// 所有边代价都被钳制在 `fixed_cost` 以上, 保证严格为正.
pub(crate) fn lowest_cost_paths(
    graph: &mut Graph<u16>,
    source: usize,
    z_size: usize,
    mode: &EdgeCostMode<'_>,
    fixed_cost: f32,
    cancel: &CancelToken,
    target: Option<usize>,
) -> Result<()> {
    graph.algorithm_reset();
    graph.set_source(source);
    graph.node_mut(source).path_cost = 0.0;
    debug!(
        "shortest path source: {:?} nodes: {}",
        graph.node(source).pos,
        graph.len()
    );

    let mut heap = BinaryHeap::new_by(|a: &(f32, usize), b: &(f32, usize)| {
        b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1))
    });
    heap.push((0.0f32, source));
    let mut pops = 0usize;

    while let Some((cost, u)) = heap.pop() {
        pops += 1;
        if pops % CANCEL_BATCH == 0 {
            cancel.check()?;
        }
        if cost > graph.node(u).path_cost {
            continue; // 过期堆项
        }
        if target == Some(u) {
            break; // 目标已定形, 提前结束
        }
        // 不展开最底层切片
        if graph.node(u).pos.0 + 1 >= z_size {
            continue;
        }

        let u_len = graph.node(u).path_len;
        for v in graph.neighbours(u) {
            let add = match mode {
                EdgeCostMode::Weight => graph.node(v).weight,
                EdgeCostMode::WeightTimesPc(pc) => {
                    graph.node(v).weight * pc.cost(graph.node(u).pos, graph.node(v).pos)
                }
                EdgeCostMode::PcOnly(pc) => pc.cost(graph.node(u).pos, graph.node(v).pos),
            };
            let new_cost = cost + add.max(fixed_cost);
            if new_cost < graph.node(v).path_cost {
                let node = graph.node_mut(v);
                node.path_cost = new_cost;
                node.predecessor = Some(u);
                node.path_len = u_len + 1;
                heap.push((new_cost, v));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{lowest_cost_paths, EdgeCostMode};
    use crate::graph::{build_graphs, Graph};
    use crate::{dfe, phantom, CancelToken, Resolution};

    fn tube_graph() -> (Graph<u16>, usize) {
        let res = Resolution::isotropic(1.0).unwrap();
        let mask = phantom::straight_tube((20, 11, 11), res, (5, 5), 2.0, 300);
        let dfev = dfe::distance_from_edge(&mask).unwrap();
        let mut graphs = build_graphs(&dfev, &mask, Default::default(), 0).unwrap();
        crate::graph::assign_dfe(&mut graphs, &dfev);
        dfe::modify_dfe(&mut graphs, crate::consts::N_MAX);
        super::super::cost::weight_dfe(&mut graphs, 2.0, 0.5, 0.01);
        let g = graphs.swap_remove(0);
        let src = g.find((2, 5, 5)).unwrap();
        (g, src)
    }

    #[test]
    fn test_path_costs_non_negative_and_monotone() {
        let (mut g, src) = tube_graph();
        lowest_cost_paths(
            &mut g,
            src,
            20,
            &EdgeCostMode::Weight,
            0.01,
            &CancelToken::new(),
            None,
        )
        .unwrap();

        for i in 0..g.len() {
            let n = g.node(i);
            if !n.path_cost.is_finite() {
                continue;
            }
            assert!(n.path_cost >= 0.0);
            // 沿前驱链回溯, 代价单调不增, 最终到达源结点
            let mut cur = i;
            let mut cost = n.path_cost;
            let mut steps = 0usize;
            while let Some(p) = g.node(cur).predecessor {
                let pc = g.node(p).path_cost;
                assert!(pc <= cost + 1e-6);
                cost = pc;
                cur = p;
                steps += 1;
                assert!(steps <= g.len(), "前驱链出现环");
            }
            assert_eq!(cur, src);
        }
    }

    #[test]
    fn test_deterministic_paths() {
        let (mut a, src_a) = tube_graph();
        let (mut b, src_b) = tube_graph();
        assert_eq!(a.node(src_a).pos, b.node(src_b).pos);
        for g in [(&mut a, src_a), (&mut b, src_b)] {
            lowest_cost_paths(
                g.0,
                g.1,
                20,
                &EdgeCostMode::Weight,
                0.01,
                &CancelToken::new(),
                None,
            )
            .unwrap();
        }
        for i in 0..a.len() {
            assert_eq!(a.node(i).pos, b.node(i).pos);
            assert_eq!(a.node(i).path_cost, b.node(i).path_cost);
            assert_eq!(
                a.node(i).predecessor.map(|p| a.node(p).pos),
                b.node(i).predecessor.map(|p| b.node(p).pos)
            );
        }
    }

    #[test]
    fn test_bottom_plane_not_expanded() {
        let (mut g, src) = tube_graph();
        // 把 z_size 压到管子中段: 更深的结点不可达
        lowest_cost_paths(
            &mut g,
            src,
            10,
            &EdgeCostMode::Weight,
            0.01,
            &CancelToken::new(),
            None,
        )
        .unwrap();
        for n in g.nodes() {
            if n.pos.0 > 9 {
                assert!(!n.path_cost.is_finite());
            }
        }
    }
}
