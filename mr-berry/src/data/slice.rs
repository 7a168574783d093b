//! 3D 体数据的水平 (轴向) 2D 切片视图.

use crate::Idx2d;
use ndarray::iter::{Iter, IterMut};
use ndarray::{ArrayView2, ArrayViewMut2, Ix2};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维 MR 扫描切片.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MrScan`].
    data: ArrayView2<'a, f32>,
}

impl<'a> ScanSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获取切片形状 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let s = self.data.shape();
        (s[0], s[1])
    }

    /// 获取给定位置 (高, 宽) 的强度值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 获取可以迭代切片强度的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, f32, Ix2> {
        self.data.iter()
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<f32> {
        self.data.view()
    }
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 不可变、借用的二维掩膜切片.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MrMask`].
    data: ArrayView2<'a, u8>,
}

/// 可变、借用的二维掩膜切片.
pub struct MaskSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MrMask`].
    data: ArrayViewMut2<'a, u8>,
}

/// 掩膜切片不可变方法集合.
macro_rules! impl_mask_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获取切片形状 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                let s = self.data.shape();
                (s[0], s[1])
            }

            /// 获取切片像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&u8> {
                self.data.get(pos)
            }

            /// 获取可以迭代图像像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, u8, Ix2> {
                self.data.iter()
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u8> {
                self.data.view()
            }

            /// 获取能按行优先序迭代所有二维索引的迭代器.
            pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> {
                let (h, w) = self.shape();
                (0..h).flat_map(move |i| (0..w).map(move |j| (i, j)))
            }

            /// 获取 `pos` 上下左右四个点中不越界的坐标.
            pub fn n4_positions(&self, (h, w): Idx2d) -> Vec<Idx2d> {
                let candidates = [
                    (h.wrapping_sub(1), w),
                    (h.saturating_add(1), w),
                    (h, w.wrapping_sub(1)),
                    (h, w.saturating_add(1)),
                ];
                let (sh, sw) = self.shape();
                candidates
                    .into_iter()
                    .filter(|(a, b)| *a < sh && *b < sw)
                    .collect()
            }

            /// 获取 `pos` 周围八个点中不越界的坐标.
            pub fn n8_positions(&self, (h, w): Idx2d) -> Vec<Idx2d> {
                let (sh, sw) = self.shape();
                let mut ans = Vec::with_capacity(8);
                for dh in -1i64..=1 {
                    for dw in -1i64..=1 {
                        if dh == 0 && dw == 0 {
                            continue;
                        }
                        let a = h.wrapping_add_signed(dh as isize);
                        let b = w.wrapping_add_signed(dw as isize);
                        if a < sh && b < sw {
                            ans.push((a, b));
                        }
                    }
                }
                ans
            }

            /// 切片是否全为背景?
            #[inline]
            pub fn is_background(&self) -> bool {
                use crate::consts::gray::is_background;
                self.iter().all(|p| is_background(*p))
            }

            /// `pos` 的 4-邻域内是否存在值为 `value` 的像素?
            #[inline]
            pub fn is_n4_containing(&self, pos: Idx2d, value: u8) -> bool {
                self.n4_positions(pos).into_iter().any(|p| self[p] == value)
            }
        }

        impl<$life> Index<Idx2d> for $slice {
            type Output = u8;

            #[inline]
            fn index(&self, index: Idx2d) -> &Self::Output {
                &self.data[index]
            }
        }
    };
}

impl_mask_slice_immut!('a, MaskSlice<'a>, ArrayView2<'a, u8>);
impl_mask_slice_immut!('a, MaskSliceMut<'a>, ArrayViewMut2<'a, u8>);

/// 可变方法集合.
impl<'a> MaskSliceMut<'a> {
    /// 获得 **底层** 数据的一份可变 shallow copy.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<u8> {
        self.data.view_mut()
    }

    /// 获取可以迭代并修改图像像素的迭代器.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, u8, Ix2> {
        self.data.iter_mut()
    }

    /// 获取给定位置 (高, 宽) 的像素值, 并可就地修改. 越界时返回 `None`.
    #[inline]
    pub fn get_mut(&mut self, pos: Idx2d) -> Option<&mut u8> {
        self.data.get_mut(pos)
    }

    /// 将 `it` 给出的所有位置填充为 `value`.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn fill_batch<I: IntoIterator<Item = Idx2d>>(&mut self, it: I, value: u8) {
        for pos in it.into_iter() {
            self.data[pos] = value;
        }
    }

    /// 将切片中值为 `old` 的像素全部替换为 `new`.
    ///
    /// 返回总共成功替换的个数.
    pub fn replace(&mut self, old: u8, new: u8) -> usize {
        let mut cnt = 0usize;
        self.data
            .iter_mut()
            .filter(|pix| **pix == old)
            .for_each(|p| {
                cnt += 1;
                *p = new;
            });
        cnt
    }
}

impl IndexMut<Idx2d> for MaskSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use crate::consts::gray::*;
    use ndarray::Array2;

    use super::*;

    #[test]
    fn test_mask_slice_neighbours() {
        let arr = Array2::<u8>::zeros((3, 4));
        let sli = MaskSlice::new(arr.view());

        assert_eq!(sli.n4_positions((0, 0)).len(), 2);
        assert_eq!(sli.n4_positions((1, 1)).len(), 4);
        assert_eq!(sli.n8_positions((0, 0)).len(), 3);
        assert_eq!(sli.n8_positions((1, 1)).len(), 8);
        assert_eq!(sli.n8_positions((2, 3)).len(), 3);
    }

    #[test]
    fn test_mask_slice_mut_fill_and_replace() {
        let mut arr = Array2::<u8>::zeros((3, 3));
        let mut sli = MaskSliceMut::new(arr.view_mut());

        sli.fill_batch([(0, 0), (1, 1), (2, 2)], MASK_BREAST);
        assert_eq!(sli.replace(MASK_BREAST, MASK_PECTORAL), 3);
        assert!(sli.is_n4_containing((0, 1), MASK_PECTORAL));
        assert!(!sli.is_background());
    }
}
