//! 运行时错误.

use crate::Idx3d;
use thiserror::Error;

/// 本 crate 的统一 `Result` 别名.
pub type Result<T> = std::result::Result<T, VesselError>;

/// 计算流水线的结构性错误.
///
/// 空结果 (无种子, 无簇, 无终端结点) 一律以 `Ok` + 空集合表达,
/// 不会出现在这里; 数值退化 (零弦长等) 在记录层被跳过.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VesselError {
    /// 配置项相互矛盾或取值非法. 在任何计算开始前被拒绝.
    #[error("配置无效: {0}")]
    Config(String),

    /// 两个应当全等的体数据形状不一致.
    #[error("体数据形状不一致: 期望 {expect:?}, 实际 {got:?}")]
    ShapeMismatch {
        /// 期望形状 `(z, h, w)`.
        expect: Idx3d,
        /// 实际形状 `(z, h, w)`.
        got: Idx3d,
    },

    /// 体素分辨率缺损 (非有限值或非正值).
    #[error("体素分辨率非法: ({0}, {1}, {2}) mm")]
    Resolution(f64, f64, f64),

    /// 单步物理距离在定点量化下溢出. 显式失败, 绝不静默截断.
    #[error("量化距离超出表示范围: {0} mm")]
    TooLarge(f64),

    /// 协作式取消. 在每个外层循环边界检查.
    #[error("运算被取消")]
    Cancelled,
}
