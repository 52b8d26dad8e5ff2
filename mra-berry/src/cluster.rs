//! 3D 连通分量聚类与按簇大小的剔除.
//!
//! 26-连通 flood fill, 以 (z, y, x) 栅格序访问, 标号按发现顺序
//! 从 1 递增: 相同输入下标号与簇序完全可复现. 一个 mask 的全部簇
//! 构成前景的一个划分 (互不相交且覆盖所有前景体素).

use std::collections::VecDeque;

use itertools::iproduct;
use log::debug;
use ndarray::Array3;

use crate::{Idx3d, Resolution, SegMask};

/// 一个最大 26-连通前景体素集合及其缓存统计量.
#[derive(Debug, Clone)]
pub struct Cluster {
    label: u32,
    positions: Vec<Idx3d>,
    sum: (usize, usize, usize),
}

impl Cluster {
    fn new(label: u32) -> Self {
        Self {
            label,
            positions: Vec::with_capacity(64),
            sum: (0, 0, 0),
        }
    }

    fn push(&mut self, pos: Idx3d) {
        self.sum.0 += pos.0;
        self.sum.1 += pos.1;
        self.sum.2 += pos.2;
        self.positions.push(pos);
    }

    /// 簇标号, 从 1 起按发现顺序递增.
    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    /// 簇体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.positions.len()
    }

    /// 簇内全部体素坐标, 按发现顺序.
    #[inline]
    pub fn positions(&self) -> &[Idx3d] {
        &self.positions
    }

    /// 质心, 浮点索引坐标 `(z, h, w)`.
    pub fn centroid(&self) -> [f64; 3] {
        let n = self.size() as f64;
        [
            self.sum.0 as f64 / n,
            self.sum.1 as f64 / n,
            self.sum.2 as f64 / n,
        ]
    }

    /// 质心物理坐标 `[x, y, z]`, 毫米.
    pub fn centroid_mm(&self, res: &Resolution) -> [f64; 3] {
        let [cz, ch, cw] = self.centroid();
        [cw * res.x_mm(), ch * res.y_mm(), cz * res.z_mm()]
    }

    /// 簇物理体积, 立方毫米.
    #[inline]
    pub fn volume_mm3(&self, res: &Resolution) -> f64 {
        self.size() as f64 * res.voxel_mm3()
    }
}

/// 划分 mask 的全部 26-连通簇.
///
/// 无前景时返回空 `Vec` (不是错误).
pub fn label_clusters(mask: &SegMask) -> Vec<Cluster> {
    let mut labels = Array3::<u32>::zeros(mask.shape());
    label_into(mask, &mut labels)
}

/// 划分簇并填写标号图: 背景为 0, 前景为所属簇标号.
fn label_into(mask: &SegMask, labels: &mut Array3<u32>) -> Vec<Cluster> {
    let (zs, hs, ws) = mask.shape();
    let mut clusters = Vec::new();
    let mut next_label = 1u32;

    for start in iproduct!(0..zs, 0..hs, 0..ws) {
        if mask[start] == 0 || labels[start] != 0 {
            continue;
        }
        let mut cluster = Cluster::new(next_label);
        let mut queue = VecDeque::new();
        labels[start] = next_label;
        cluster.push(start);
        queue.push_back(start);

        while let Some(pos) = queue.pop_front() {
            for p in mask.cube_neighbours(pos) {
                if mask[p] > 0 && labels[p] == 0 {
                    labels[p] = next_label;
                    cluster.push(p);
                    queue.push_back(p);
                }
            }
        }
        clusters.push(cluster);
        next_label += 1;
    }
    debug!("labelled {} clusters", clusters.len());
    clusters
}

/// 将体素个数小于 `min_size` 的簇整体置零.
///
/// # 返回值
///
/// 存活 (未被剔除) 的簇, 保留原标号. 无前景时返回空 `Vec`.
pub fn threshold_clusters(mask: &mut SegMask, min_size: usize) -> Vec<Cluster> {
    let clusters = label_clusters(mask);
    let mut kept = Vec::with_capacity(clusters.len());
    let mut removed = 0usize;
    for cluster in clusters {
        if cluster.size() < min_size {
            for &pos in cluster.positions() {
                mask[pos] = 0;
            }
            removed += 1;
        } else {
            kept.push(cluster);
        }
    }
    debug!("cluster threshold {min_size}: kept {} removed {removed}", kept.len());
    kept
}
