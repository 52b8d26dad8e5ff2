#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 3D MR/CT 血管造影体数据的血管结构提取与迂曲度
//! (tortuosity) 量化的基础算法.
//!
//! 该 crate 目前仅提供 `safe` 接口. 所有阶段均为同步阻塞操作,
//! 由调用方决定是否放入后台任务.
//!
//! # 流水线
//!
//! ```text
//! Volume -> segment -> cluster -> dfe -> graph -> centerline -> tortuosity
//! ```
//!
//! 1. `segment`: 区域生长分割, 从原始强度 (可选相位对比向量场)
//!    生成二值血管 mask.
//! 2. `cluster`: 26-连通聚类与小簇剔除.
//! 3. `dfe`: 各向异性 distance-from-edge 变换 (定点量化存储).
//! 4. `graph`: 把分割体素组织成逐连通分量的邻接图
//!    (整数 / 浮点负载共用一套泛型实现).
//! 5. `centerline`: 基于 Dijkstra 的最低代价路径搜索与迭代 recenter,
//!    代价函数可插拔 (DFE / center of mass / 相位对比速度加权等 6 种).
//! 6. `tortuosity`: distance factor metric (DFM) 评分.
//!
//! # 注意
//!
//! 1. 所有体数据按照 `(z, h, w)` 模式组织与访问, 体素分辨率
//!    (毫米) 由调用方显式传入, 本 crate 不读取任何文件.
//! 2. 空结果 (无种子, 无簇, 无终端结点) 不是错误, 各阶段对空输入
//!    返回空输出; 只有结构性错误 (形状不一致, 分辨率非法) 才会
//!    以 `Err` 终止.
//! 3. 在非期望情况下 (越界索引等), 程序会直接 panic,
//!    而不会导致内存错误. As what Rust promises.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 体数据基础结构.
mod data;

pub use data::{Plane, PlaneMut, Resolution, SegMask, Volume};

pub mod consts;

mod cancel;
mod error;

pub use cancel::CancelToken;
pub use error::{Result, VesselError};

pub mod centerline;
pub mod cluster;
pub mod dfe;
pub mod graph;
pub mod pc;
pub mod phantom;
pub mod segment;
pub mod tortuosity;

pub mod prelude;
