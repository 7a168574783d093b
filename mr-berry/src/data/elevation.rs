//! 前侧皮肤表面的高程图.

use ndarray::Array2;

use crate::Idx2d;

/// 高程图中 "该列没有前景" 的哨兵值.
pub(crate) const NO_ELEVATION: usize = usize::MAX;

/// 皮肤表面高程图.
///
/// 对平面内 `(z, w)` 网格的每一列, 记录该列中最靠前 (`h` 最小) 的前景体素的
/// `h` 索引. 不存在前景的列以哨兵值占位. 每列恰好一个条目,
/// 条目顺序与列顺序一致.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationMap {
    /// 形状为 `(z 切片数, w 列数)`.
    data: Array2<usize>,
}

impl ElevationMap {
    /// 创建全空高程图. `shape` 为 `(z 切片数, w 列数)`.
    pub(crate) fn empty(shape: Idx2d) -> Self {
        Self {
            data: Array2::from_elem(shape, NO_ELEVATION),
        }
    }

    /// 获取形状 `(z 切片数, w 列数)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let s = self.data.shape();
        (s[0], s[1])
    }

    /// 获取 `(z, w)` 列的高程. 该列没有前景时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<usize> {
        match self.data[pos] {
            NO_ELEVATION => None,
            h => Some(h),
        }
    }

    /// 设置 `(z, w)` 列的高程.
    #[inline]
    pub(crate) fn set(&mut self, pos: Idx2d, elevation: usize) {
        self.data[pos] = elevation;
    }

    /// 有前景的列的个数.
    pub fn count_defined(&self) -> usize {
        self.data.iter().filter(|v| **v != NO_ELEVATION).count()
    }

    /// 迭代所有有前景的列: `((z, w), 高程)`.
    pub fn iter_defined(&self) -> impl Iterator<Item = (Idx2d, usize)> + '_ {
        self.data
            .indexed_iter()
            .filter(|(_, v)| **v != NO_ELEVATION)
            .map(|(pos, v)| (pos, *v))
    }

    /// 计算第 `z` 个切片上有前景列的高程中位数. 该切片全空时返回 `None`.
    pub fn slice_median(&self, z: usize) -> Option<usize> {
        let mut hs: Vec<usize> = self
            .data
            .row(z)
            .iter()
            .copied()
            .filter(|v| *v != NO_ELEVATION)
            .collect();
        if hs.is_empty() {
            return None;
        }
        hs.sort_unstable();
        Some(hs[hs.len() / 2])
    }
}
