//! Distance factor metric (DFM) 迂曲度评分.
//!
//! 对一条中心线, 先按 `border_dfe_mm` 门限切出远离血管壁的最大
//! 连续段 (贴壁段受边缘伪影影响, 不参与评分), 再在每段内逐结点
//! 累计路径长 `L` 与到段起点的弦长 `d`, `dfm = L / d`.
//! 零弦长属数值退化, 相应记录被跳过而非报错.
//! 整条路径的评分为全部合格记录 DFM 的均值: 完全笔直的路径为
//! 1.0, 值越大越迂曲.

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::centerline::{Centerline, CenterlineGraph};
use crate::Resolution;

/// 一条合格段内某结点处的迂曲度记录.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TortuosityRecord {
    /// 段起点到此的累计物理路径长, 毫米.
    pub length_mm: f64,

    /// 段起点到此的直线弦长, 毫米.
    pub chord_mm: f64,

    /// distance factor metric, `length_mm / chord_mm`.
    pub dfm: f64,

    /// 此结点的 DFE, 毫米.
    pub dfe_mm: f64,

    /// 单位弦方向 `[x, y, z]`.
    pub direction: [f64; 3],
}

/// 为一条中心线评分.
///
/// # 返回值
///
/// `(整线评分, 逐结点记录)`. 没有任何合格记录时评分为 0.0
/// (空输入不是错误).
pub fn score(
    line: &Centerline,
    res: &Resolution,
    border_dfe_mm: f64,
) -> (f64, Vec<TortuosityRecord>) {
    let mut records = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut cum_mm = 0.0f64;

    for i in 0..line.nodes.len() {
        let node = &line.nodes[i];
        if node.dfe_mm <= border_dfe_mm {
            run_start = None;
            continue;
        }
        let Some(start) = run_start else {
            run_start = Some(i);
            cum_mm = 0.0;
            continue;
        };

        cum_mm += res.distance_f64(line.nodes[i - 1].point, node.point);
        let chord_mm = res.distance_f64(line.nodes[start].point, node.point);
        if chord_mm == 0.0 {
            continue; // 数值退化: 弦长为零
        }
        let sp = line.nodes[start].point;
        let dir = [
            (node.point[2] - sp[2]) * res.x_mm() / chord_mm,
            (node.point[1] - sp[1]) * res.y_mm() / chord_mm,
            (node.point[0] - sp[0]) * res.z_mm() / chord_mm,
        ];
        records.push(TortuosityRecord {
            length_mm: cum_mm,
            chord_mm,
            dfm: cum_mm / chord_mm,
            dfe_mm: node.dfe_mm,
            direction: dir,
        });
    }

    let aggregate = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.dfm).sum::<f64>() / records.len() as f64
    };
    debug!(
        "tortuosity: {} records, aggregate DFM {aggregate}",
        records.len()
    );
    (aggregate, records)
}

/// 为一张中心线图的全部非空中心线评分.
///
/// 返回与 `centerlines` 中非空线一一对应的 `(评分, 记录)` 列表.
pub fn score_graph(
    cg: &CenterlineGraph,
    border_dfe_mm: f64,
) -> Vec<(f64, Vec<TortuosityRecord>)> {
    cg.centerlines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| score(line, &cg.resolution, border_dfe_mm))
        .collect()
}
