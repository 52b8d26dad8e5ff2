//! 2D 种子提取与跨切片延续判定.
//!
//! 每层切片上以 `mean + 2σ` 的直方图门限取亮区, 8-相邻聚为候选
//! 区域; 相邻切片之间, 候选区域只有同时通过质心偏移 / 强度偏移
//! (z-差约束) 与卡方形状平滑度检验才延续同一血管种子列.
//! 只有延续长度至少 2 层的种子列被接受: 孤立亮斑不产生种子.

use std::collections::VecDeque;

use log::debug;
use ndarray::Array2;

use crate::segment::SegmentConfig;
use crate::{Idx2d, Idx3d, Result, Volume};

/// 一层切片上的一个 2D 候选区域.
#[derive(Debug, Clone)]
struct SeedRegion {
    z: usize,
    size: usize,
    centroid: (f64, f64),
    mean: f64,
    std: f64,
    peak: Idx2d,
    peak_val: u16,
}

/// 种子提取结果.
pub(crate) struct Seeds {
    /// 3D 种子体素.
    pub seeds: Vec<Idx3d>,
    /// 区域生长下阈值, 由种子强度直方图决定.
    pub lower_threshold: u16,
    /// 诊断种子图.
    pub seed_plane: Option<Array2<u16>>,
}

/// 一列跨切片延续的种子区域.
struct SeedColumn {
    last: SeedRegion,
    members: Vec<SeedRegion>,
}

/// 提取 3D 种子.
pub(crate) fn find_seeds(vol: &Volume<u16>, config: &SegmentConfig) -> Result<Seeds> {
    let (zs, _, _) = vol.shape();
    let mut open: Vec<SeedColumn> = Vec::new();
    let mut closed: Vec<SeedColumn> = Vec::new();

    for z in 0..zs {
        config.cancel.check()?;
        let regions = slice_regions(vol, z, config.min_seed_size_2d);

        // 与上一层的 open 列做延续匹配, 一列最多接收一个区域
        let mut next_open: Vec<SeedColumn> = Vec::new();
        let mut taken = vec![false; regions.len()];
        for mut column in open.drain(..) {
            let mut matched = None;
            for (i, r) in regions.iter().enumerate() {
                if !taken[i] && continues(&column.last, r, config) {
                    matched = Some(i);
                    break;
                }
            }
            match matched {
                Some(i) => {
                    taken[i] = true;
                    column.last = regions[i].clone();
                    column.members.push(regions[i].clone());
                    next_open.push(column);
                }
                None => closed.push(column),
            }
        }
        // 未匹配的区域各开一列
        for (i, r) in regions.into_iter().enumerate() {
            if !taken[i] {
                next_open.push(SeedColumn {
                    last: r.clone(),
                    members: vec![r],
                });
            }
        }
        open = next_open;
    }
    closed.extend(open);

    // 只接受延续至少 2 层的种子列
    let mut seeds = Vec::new();
    let mut seed_vals = Vec::new();
    let (hs, ws) = vol.slice_shape();
    let mut plane = config.show_steps.then(|| Array2::<u16>::zeros((hs, ws)));
    for column in closed.iter().filter(|c| c.members.len() >= 2) {
        for r in column.members.iter() {
            seeds.push((r.z, r.peak.0, r.peak.1));
            seed_vals.push(r.peak_val);
            if let Some(p) = plane.as_mut() {
                p[r.peak] = r.peak_val;
            }
        }
    }
    debug!(
        "seed columns: {} accepted seeds: {}",
        closed.len(),
        seeds.len()
    );

    Ok(Seeds {
        lower_threshold: histogram_threshold(&mut seed_vals, config.seed_hist_threshold),
        seeds,
        seed_plane: plane,
    })
}

/// 区域 `r` 是否延续上一层的 `prev`.
fn continues(prev: &SeedRegion, r: &SeedRegion, config: &SegmentConfig) -> bool {
    debug_assert_eq!(prev.z + 1, r.z);
    // 质心偏移, 切片内体素单位
    let dh = r.centroid.0 - prev.centroid.0;
    let dw = r.centroid.1 - prev.centroid.1;
    if (dh * dh + dw * dw).sqrt() > config.z_diff {
        return false;
    }
    // 强度偏移, 以上一层区域的标准差为单位
    if (r.mean - prev.mean).abs() > config.z_diff * prev.std {
        return false;
    }
    // Pearson 卡方形状偏差
    let ds = r.size as f64 - prev.size as f64;
    ds * ds / prev.size as f64 <= config.max_chisq
}

/// 提取一层切片上的候选区域: `mean + 2σ` 门限, 8-相邻聚类,
/// 丢弃小于 `min_size` 的区域. 返回顺序由栅格序决定.
fn slice_regions(vol: &Volume<u16>, z: usize, min_size: usize) -> Vec<SeedRegion> {
    let sli = vol.slice_at(z);
    let (mean, std) = sli.mean_std();
    let threshold = mean + 2.0 * std;
    let (hs, ws) = sli.shape();

    let mut visited = Array2::<bool>::from_elem((hs, ws), false);
    let mut regions = Vec::new();

    for h in 0..hs {
        for w in 0..ws {
            if visited[(h, w)] || (sli[(h, w)] as f64) <= threshold || sli[(h, w)] == 0 {
                continue;
            }
            // flood fill 一个亮区
            let mut queue = VecDeque::new();
            let mut members: Vec<Idx2d> = Vec::new();
            visited[(h, w)] = true;
            queue.push_back((h, w));
            while let Some(p) = queue.pop_front() {
                members.push(p);
                for n in sli.n8_positions(p) {
                    if !visited[n] && (sli[n] as f64) > threshold && sli[n] > 0 {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }
            if members.len() < min_size {
                continue;
            }

            let size = members.len();
            let (mut sh, mut sw, mut sum, mut sq) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
            let (mut peak, mut peak_val) = (members[0], 0u16);
            for &m in members.iter() {
                let v = sli[m];
                sh += m.0 as f64;
                sw += m.1 as f64;
                sum += v as f64;
                sq += (v as f64) * (v as f64);
                if v > peak_val {
                    peak = m;
                    peak_val = v;
                }
            }
            let n = size as f64;
            let rmean = sum / n;
            regions.push(SeedRegion {
                z,
                size,
                centroid: (sh / n, sw / n),
                mean: rmean,
                std: (sq / n - rmean * rmean).max(0.0).sqrt(),
                peak,
                peak_val,
            });
        }
    }
    regions
}

/// 由种子强度直方图确定生长下阈值: 取累计比例不超过
/// `fraction` 的最大强度值, 不存在时为 0 (只排除背景).
fn histogram_threshold(seed_vals: &mut Vec<u16>, fraction: f64) -> u16 {
    if seed_vals.is_empty() {
        return 0;
    }
    seed_vals.sort_unstable();
    let total = seed_vals.len() as f64;
    let mut threshold = 0u16;
    let mut i = 0usize;
    while i < seed_vals.len() {
        let v = seed_vals[i];
        // 跳到同值段末尾
        let mut j = i;
        while j < seed_vals.len() && seed_vals[j] == v {
            j += 1;
        }
        if j as f64 / total <= fraction {
            threshold = v;
        } else {
            break;
        }
        i = j;
    }
    threshold
}
