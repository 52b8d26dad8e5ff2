//! 体数据基础结构: 分辨率, 泛型 3D 体数据与 2D 切片视图.

use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView, ArrayViewMut, Axis, Ix3};

use crate::{Idx2d, Idx3d, Result, VesselError};

mod slice;

pub use slice::{Plane, PlaneMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单体素物理分辨率, 毫米. 三个方向一般各不相等 (各向异性),
/// 所有距离与代价运算都必须经过它换算, 不允许按网格步数计算.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Resolution {
    x_mm: f64,
    y_mm: f64,
    z_mm: f64,
}

impl Resolution {
    /// 构建分辨率. 任一分量非有限或非正时返回
    /// [`VesselError::Resolution`] (结构性错误, 终止本次运行).
    pub fn new(x_mm: f64, y_mm: f64, z_mm: f64) -> Result<Self> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(x_mm) && ok(y_mm) && ok(z_mm) {
            Ok(Self { x_mm, y_mm, z_mm })
        } else {
            Err(VesselError::Resolution(x_mm, y_mm, z_mm))
        }
    }

    /// 构建各向同性分辨率.
    #[inline]
    pub fn isotropic(mm: f64) -> Result<Self> {
        Self::new(mm, mm, mm)
    }

    /// width 方向 (自然 2D 图像的水平方向) 分辨率, 毫米.
    #[inline]
    pub fn x_mm(&self) -> f64 {
        self.x_mm
    }

    /// height 方向 (自然 2D 图像的垂直方向) 分辨率, 毫米.
    #[inline]
    pub fn y_mm(&self) -> f64 {
        self.y_mm
    }

    /// 空间方向 (相邻 2D 切片的方向) 分辨率, 毫米.
    #[inline]
    pub fn z_mm(&self) -> f64 {
        self.z_mm
    }

    /// 三个方向分辨率是否各向同性.
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        self.x_mm == self.y_mm && self.x_mm == self.z_mm
    }

    /// 体素实际体积, 立方毫米.
    #[inline]
    pub fn voxel_mm3(&self) -> f64 {
        self.x_mm * self.y_mm * self.z_mm
    }

    /// 水平切片内像素实际面积, 平方毫米.
    #[inline]
    pub fn slice_mm2(&self) -> f64 {
        self.x_mm * self.y_mm
    }

    /// 三个方向中最大的分辨率分量.
    #[inline]
    pub fn max_mm(&self) -> f64 {
        self.x_mm.max(self.y_mm).max(self.z_mm)
    }

    /// 把体素索引换算为物理坐标 `[x, y, z]`, 毫米.
    #[inline]
    pub fn to_mm(&self, (z, h, w): Idx3d) -> [f64; 3] {
        [
            w as f64 * self.x_mm,
            h as f64 * self.y_mm,
            z as f64 * self.z_mm,
        ]
    }

    /// 两个体素索引之间的物理欧氏距离, 毫米.
    pub fn distance(&self, a: Idx3d, b: Idx3d) -> f64 {
        let dx = (a.2 as f64 - b.2 as f64) * self.x_mm;
        let dy = (a.1 as f64 - b.1 as f64) * self.y_mm;
        let dz = (a.0 as f64 - b.0 as f64) * self.z_mm;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// 两个浮点索引坐标 `(z, h, w)` 之间的物理欧氏距离, 毫米.
    pub fn distance_f64(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        let dz = (a[0] - b[0]) * self.z_mm;
        let dy = (a[1] - b[1]) * self.y_mm;
        let dx = (a[2] - b[2]) * self.x_mm;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// 稠密 3D 体数据. 数据按 `(z, h, w)` 组织, 行优先存储,
/// 附带物理分辨率. 一次运行内所有阶段共享只读访问.
#[derive(Debug, Clone)]
pub struct Volume<T> {
    data: Array3<T>,
    res: Resolution,
}

/// 二值/标记分割 mask. 0 为背景, 正值为前景血管强度.
pub type SegMask = Volume<u16>;

impl<T> Volume<T> {
    /// 从裸数组与分辨率直接创建体数据.
    #[inline]
    pub fn from_parts(data: Array3<T>, res: Resolution) -> Self {
        Self { data, res }
    }

    /// 获取数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取水平切片形状 `(h, w)`.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取体素总数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取体素分辨率.
    #[inline]
    pub fn res(&self) -> &Resolution {
        &self.res
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, T, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, T, Ix3> {
        self.data.view_mut()
    }

    /// 取出内部数组所有权.
    #[inline]
    pub fn into_raw(self) -> Array3<T> {
        self.data
    }

    /// 按索引取体素, 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<&T> {
        self.data.get(pos)
    }

    /// 获取 z 空间第 `z_index` 层不可变切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> Plane<'_, T> {
        Plane::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取 z 空间第 `z_index` 层可变切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> PlaneMut<'_, T> {
        PlaneMut::new(self.data.index_axis_mut(Axis(0), z_index))
    }

    /// 获取能按升序迭代水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = Plane<'_, T>> {
        self.data.axis_iter(Axis(0)).map(Plane::new)
    }

    /// 获取能按升序迭代水平可变切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = PlaneMut<'_, T>> {
        self.data.axis_iter_mut(Axis(0)).map(PlaneMut::new)
    }

    /// 校验另一体数据与本体数据形状全等, 否则返回
    /// [`VesselError::ShapeMismatch`].
    pub fn congruent<U>(&self, other: &Volume<U>) -> Result<()> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(VesselError::ShapeMismatch {
                expect: self.shape(),
                got: other.shape(),
            })
        }
    }

    /// 获取 `pos` 前后上下左右六个点的坐标 (6-连通).
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn diamond_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        self.check_collect([
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ])
    }

    /// 获取 `pos` 周围 26 个点的坐标 (26-连通).
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn cube_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        let mut out = Vec::with_capacity(26);
        for dz in -1i64..=1 {
            for dh in -1i64..=1 {
                for dw in -1i64..=1 {
                    if dz == 0 && dh == 0 && dw == 0 {
                        continue;
                    }
                    let p = (
                        (z as i64 + dz) as usize,
                        (h as i64 + dh) as usize,
                        (w as i64 + dw) as usize,
                    );
                    if self.check(&p) {
                        out.push(p);
                    }
                }
            }
        }
        out
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx3d>, const N: usize>(&self, data: [Idx3d; N]) -> B {
        data.into_iter().filter(|p| self.check(p)).collect()
    }
}

impl<T: Clone + num::Zero> Volume<T> {
    /// 创建全零体数据.
    #[inline]
    pub fn zeros(shape: Idx3d, res: Resolution) -> Self {
        Self {
            data: Array3::zeros(shape),
            res,
        }
    }
}

impl SegMask {
    /// 统计前景体素个数.
    #[inline]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|p| **p > 0).count()
    }

    /// `pos` 是否为前景体素. 越界视为背景.
    #[inline]
    pub fn is_foreground(&self, pos: Idx3d) -> bool {
        self.data.get(pos).is_some_and(|p| *p > 0)
    }
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl<T: Send + Sync> Volume<T> {
    /// 借助 `rayon`, 并行地对每个水平可变切片实施 `op` 操作.
    pub fn par_for_each_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(PlaneMut<'_, T>) + Sync + Send,
    {
        self.data
            .view_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|v| {
                op(PlaneMut::new(v));
            });
    }

    /// 借助 `rayon`, 并行地对每个水平可变切片实施 `op` 操作.
    /// 该操作会同时携带 z 方向索引信息.
    pub fn par_for_each_indexed_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(usize, PlaneMut<'_, T>) + Sync + Send,
    {
        self.data
            .view_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, v)| {
                op(i, PlaneMut::new(v));
            });
    }
}
