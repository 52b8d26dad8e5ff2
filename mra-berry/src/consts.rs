//! 通用常量. 这些是临床 MRA 数据上标定过的缺省口径,
//! 均可被各 config 结构覆盖.

/// 单通道体素值.
pub mod gray {
    /// 背景体素值.
    pub const BACKGROUND: u16 = 0;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u16) -> bool {
        p == BACKGROUND
    }

    /// 体素是否是前景 (血管)?
    #[inline]
    pub const fn is_foreground(p: u16) -> bool {
        p != BACKGROUND
    }
}

/// 物理距离定点量化倍率. `stored = round(mm * DISTANCE_PRECISION)`.
pub const DISTANCE_PRECISION: f64 = 100.0;

/// 距图像 z 两端该层数以内的切片仅做 2D DFE.
/// 3D DFE 会给贯穿图像边缘的血管体素分配过低的 DFE 值.
pub const LOWER_3D_CUTOFF: usize = 6;

/// MDFE 平台区分母: 同值邻居计数的归一化常数.
pub const N_MAX: u16 = 20;

/// DFE 代价函数 center-of-mass 项权重指数 `A`.
pub const WEIGHT_A: f32 = 2.0;

/// DFE 代价函数 DFE 项权重指数 `B`.
pub const WEIGHT_B: f32 = 0.5;

/// 建图前的 DFE 边缘修剪门限, 毫米.
pub const DFE_THRESHOLD_MM: f64 = 3.0;

/// 固定代价下限. 保证任意变体的边代价严格为正.
pub const FIXED_COST: f32 = 0.01;

/// 低于该结点数的回溯路径不算中心线.
pub const MIN_LINE_LENGTH: usize = 10;

/// recenter 最少迭代轮数.
pub const RECENTER_MIN: usize = 2;

/// recenter 最多迭代轮数.
pub const RECENTER_MAX: usize = 30;

/// recenter 截面邻域窗口半径, 体素.
pub const RECENTER_WINDOW: usize = 2;

/// center-of-mass 位移权重的归一化幂.
pub const MASS_WEIGHT_POWER: f64 = 3.0;

/// 2D 种子区域最小像素数.
pub const MIN_2D_SEED_SIZE: usize = 30;

/// 3D 簇最小体素数, 低于该值的簇被剔除.
pub const MIN_3D_CLUSTER_SIZE: usize = 10_000;

/// 相邻切片种子区域质心 / 强度允许的最大偏移.
pub const VOXEL_Z_DIFF: f64 = 2.0;

/// 相邻切片种子区域形状偏差的卡方上限.
pub const CHI_SQ_SMOOTHNESS: f64 = 1.0;

/// 种子强度直方图累计比例门限.
pub const SEED_HIST_THRESHOLD: f64 = 0.25;

/// 补洞迭代次数.
pub const HOLE_FILL_ITERATIONS: usize = 3;

/// 26 个方向中至少该数量的方向命中前景才补洞.
pub const HOLE_FILL_DIRECTIONS: usize = 24;

/// 补洞射线搜索半径, 体素.
pub const HOLE_FILL_RADIUS: usize = 8;

/// 中值滤波的标准差倍率: 仅替换高于 `median + k * sigma` 的样本.
pub const MEDIAN_STD_DEV_FACTOR: f64 = 1.0;

/// 相位对比原始样本的零速度偏置.
pub const PHASE_CONTRAST_ZERO: i32 = 2048;

/// 坏端修剪: 端部 DFE 低于 `ratio * 线中位 DFE` 时剔除.
pub const LINE_DFE_RATIO: f64 = 0.5;
