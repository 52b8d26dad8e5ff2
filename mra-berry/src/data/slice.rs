//! 2D 水平切片视图. 种子提取与逐切片滤波在该层面上工作.

use std::ops::{Index, IndexMut};

use ndarray::{ArrayView, ArrayViewMut, Ix2};

use crate::Idx2d;

/// 3D 体数据的一层水平不可变切片.
#[derive(Clone)]
pub struct Plane<'a, T> {
    data: ArrayView<'a, T, Ix2>,
}

impl<'a, T> Plane<'a, T> {
    #[inline]
    pub(crate) fn new(data: ArrayView<'a, T, Ix2>) -> Self {
        Self { data }
    }

    /// 获取切片形状 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 按索引取像素, 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&T> {
        self.data.get(pos)
    }

    /// 获取底层数组视图.
    #[inline]
    pub fn array_view(&self) -> ArrayView<'_, T, Ix2> {
        self.data.view()
    }

    /// 按行优先序迭代像素.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    /// `pos` 是否位于切片边界上.
    #[inline]
    pub fn is_at_border(&self, (h, w): Idx2d) -> bool {
        let (hs, ws) = self.shape();
        h == 0 || w == 0 || h + 1 == hs || w + 1 == ws
    }

    /// 获取 `pos` 上下左右四个点的坐标 (4-相邻).
    ///
    /// 在切片范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn n4_positions(&self, (h, w): Idx2d) -> Vec<Idx2d> {
        self.check_collect([
            (h.wrapping_sub(1), w),
            (h.saturating_add(1), w),
            (h, w.wrapping_sub(1)),
            (h, w.saturating_add(1)),
        ])
    }

    /// 获取 `pos` 周围八个点的坐标 (8-相邻).
    ///
    /// 在切片范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn n8_positions(&self, (h, w): Idx2d) -> Vec<Idx2d> {
        let (hm1, hp1) = (h.wrapping_sub(1), h.saturating_add(1));
        let (wm1, wp1) = (w.wrapping_sub(1), w.saturating_add(1));
        self.check_collect([
            (hm1, wm1),
            (hm1, w),
            (hm1, wp1),
            (h, wm1),
            (h, wp1),
            (hp1, wm1),
            (hp1, w),
            (hp1, wp1),
        ])
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx2d>, const N: usize>(&self, data: [Idx2d; N]) -> B {
        let (hs, ws) = self.shape();
        data.into_iter()
            .filter(|&(h, w)| h < hs && w < ws)
            .collect()
    }
}

impl<'a, T: Copy + Into<f64>> Plane<'a, T> {
    /// 切片像素均值.
    pub fn mean(&self) -> f64 {
        let mut sum = 0.0;
        for p in self.data.iter() {
            sum += (*p).into();
        }
        sum / self.data.len() as f64
    }

    /// 切片像素均值与标准差.
    pub fn mean_std(&self) -> (f64, f64) {
        let mean = self.mean();
        let mut var = 0.0;
        for p in self.data.iter() {
            let d = (*p).into() - mean;
            var += d * d;
        }
        (mean, (var / self.data.len() as f64).sqrt())
    }
}

impl<'a, T> Index<Idx2d> for Plane<'a, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 3D 体数据的一层水平可变切片.
pub struct PlaneMut<'a, T> {
    data: ArrayViewMut<'a, T, Ix2>,
}

impl<'a, T> PlaneMut<'a, T> {
    #[inline]
    pub(crate) fn new(data: ArrayViewMut<'a, T, Ix2>) -> Self {
        Self { data }
    }

    /// 获取切片形状 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 按索引取像素, 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&T> {
        self.data.get(pos)
    }

    /// 按行优先序迭代可变像素.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }

    /// 获得只读视图.
    #[inline]
    pub fn as_plane(&self) -> Plane<'_, T> {
        Plane::new(self.data.view())
    }
}

impl<'a, T> Index<Idx2d> for PlaneMut<'a, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a, T> IndexMut<Idx2d> for PlaneMut<'a, T> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}
