//! 3D MR 体数据基础结构.
//!
//! 本库只处理内存数据: 体数据由调用方以 [`MrScan::from_parts`] 等构造器搭建,
//! 文件读写完全由外部协作者负责.

use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView, ArrayViewMut, Axis, Ix3};
use nifti::NiftiHeader;

use crate::consts::gray::*;
use crate::{Idx2d, Idx3d, Predicate};

mod compact;
mod elevation;
mod slice;

pub use compact::CompactMask;
pub use elevation::ElevationMap;
pub use slice::{MaskSlice, MaskSliceMut, ScanSlice};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 在内存中直接搭建 header.
///
/// `shape` 和 `pix_dim` 均以 `(z, h, w)` 给出, `origin` 以世界坐标 `(x, y, z)` 给出.
fn build_header((z, h, w): Idx3d, pix_dim: [f32; 3], origin: [f32; 3]) -> BoxedHeader {
    let mut header = Box::<NiftiHeader>::default();

    header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];

    let [pz, ph, pw] = pix_dim;
    let [_, dw, dh, dz, ..] = &mut header.pixdim;
    (*dw, *dh, *dz) = (pw, ph, pz);

    // 采用恒等方向的 qform. 非轴对齐的体数据应在进入本库前重排好.
    header.qform_code = 1;
    (header.quatern_b, header.quatern_c, header.quatern_d) = (0.0, 0.0, 0.0);
    let [ox, oy, oz] = origin;
    (header.quatern_x, header.quatern_y, header.quatern_z) = (ox, oy, oz);

    header.intent_name[..3].copy_from_slice(b"mem");
    header
}

/// 3D MR 体数据 header 的共用属性和部分通用操作.
pub trait VolumeHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (前后方向, 前侧位于 `h == 0`), 宽 (左右方向).
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取 width 方向 (左右方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.header().pixdim[1] as f64
    }

    /// 获取 height 方向 (前后方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.header().pixdim[2] as f64
    }

    /// 获取空间方向 (相邻 2D 切片的方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.header().pixdim[3] as f64
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pix_dim();
        z == h && z == w
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }

    /// 获取世界坐标原点 `(x, y, z)`.
    #[inline]
    fn origin(&self) -> [f64; 3] {
        let h = self.header();
        [h.quatern_x as f64, h.quatern_y as f64, h.quatern_z as f64]
    }

    /// 将体素索引 `(z, h, w)` 转换为世界坐标 `(x, y, z)` (单位: 毫米).
    #[inline]
    fn index_to_world(&self, (z, h, w): Idx3d) -> [f64; 3] {
        let [oz_x, oz_y, oz_z] = self.origin();
        [
            oz_x + w as f64 * self.width_mm(),
            oz_y + h as f64 * self.height_mm(),
            oz_z + z as f64 * self.z_mm(),
        ]
    }

    /// 将世界坐标 `(x, y, z)` 四舍五入转换回体素索引 `(z, h, w)`.
    ///
    /// 坐标落在数据范围外时返回 `None`.
    fn world_to_index(&self, [x, y, z]: [f64; 3]) -> Option<Idx3d> {
        let [ox, oy, oz] = self.origin();
        let iw = ((x - ox) / self.width_mm()).round();
        let ih = ((y - oy) / self.height_mm()).round();
        let iz = ((z - oz) / self.z_mm()).round();
        if iw < 0.0 || ih < 0.0 || iz < 0.0 {
            return None;
        }
        let pos = (iz as usize, ih as usize, iw as usize);
        self.check(&pos).then_some(pos)
    }

    /// 判断两个体是否定义在同一个格点上 (形状, 分辨率与原点均一致).
    fn same_geometry<O: VolumeHeaderAttr>(&self, other: &O) -> bool {
        const EPS: f64 = 1e-4;
        let dim_eq = self
            .pix_dim()
            .iter()
            .zip(other.pix_dim())
            .all(|(a, b)| (a - b).abs() < EPS);
        let origin_eq = self
            .origin()
            .iter()
            .zip(other.origin())
            .all(|(a, b)| (a - b).abs() < EPS);
        self.shape() == other.shape() && dim_eq && origin_eq
    }
}

/// 3D MR 扫描 (结构像, 脂肪抑制像或任意标量中间体), 强度以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct MrScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl VolumeHeaderAttr for MrScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MrScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MrScan {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MrScan {
    /// 从裸数据和几何元信息直接创建扫描实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 `(z, h, w)` 组织且非空, 否则程序 panic.
    /// 2. `pix_dim` 按照 `(z, h, w)` 给出体素分辨率 (单位: 毫米).
    /// 3. `origin` 为世界坐标系原点 `(x, y, z)`.
    pub fn from_parts(data: Array3<f32>, pix_dim: [f32; 3], origin: [f32; 3]) -> Self {
        assert_ne!(data.len(), 0, "扫描数据不能为空");
        let shape = data.dim();
        let header = build_header(shape, pix_dim, origin);
        Self { header, data }
    }

    /// 用 `like` 的几何元信息包装一个新数据体.
    ///
    /// 若两者形状不一致, 则程序 panic.
    pub fn with_geometry_of<O: VolumeHeaderAttr>(like: &O, data: Array3<f32>) -> Self {
        assert_eq!(like.shape(), data.dim(), "数据形状与几何元信息不一致");
        Self {
            header: Box::new(like.header().clone()),
            data,
        }
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 扫描水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }

    /// 消耗自身, 取出底层数据.
    #[inline]
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// 获取全体强度的最小值与最大值. 非有限值被忽略.
    pub fn min_max(&self) -> (f32, f32) {
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for v in self.data.iter().copied().filter(|v| v.is_finite()) {
            if v < lo {
                lo = v;
            }
            if v > hi {
                hi = v;
            }
        }
        (lo, hi)
    }
}

/// 3D 二值/多值掩膜, 体素值以 `u8` 保存, 与其源体共享几何元信息.
#[derive(Debug, Clone, PartialEq)]
pub struct MrMask {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl VolumeHeaderAttr for MrMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MrMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MrMask {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MrMask {
    /// 从裸标签数据和几何元信息直接创建掩膜实体.
    ///
    /// 参数约定与 [`MrScan::from_parts`] 相同.
    pub fn from_parts(data: Array3<u8>, pix_dim: [f32; 3], origin: [f32; 3]) -> Self {
        assert_ne!(data.len(), 0, "掩膜数据不能为空");
        let shape = data.dim();
        let header = build_header(shape, pix_dim, origin);
        Self { header, data }
    }

    /// 在 `like` 的格点上创建全背景掩膜.
    pub fn zeros_like<O: VolumeHeaderAttr>(like: &O) -> Self {
        Self {
            header: Box::new(like.header().clone()),
            data: Array3::zeros(like.shape()),
        }
    }

    /// 用 `like` 的几何元信息包装一个新标签体.
    ///
    /// 若两者形状不一致, 则程序 panic.
    pub fn with_geometry_of<O: VolumeHeaderAttr>(like: &O, data: Array3<u8>) -> Self {
        assert_eq!(like.shape(), data.dim(), "数据形状与几何元信息不一致");
        Self {
            header: Box::new(like.header().clone()),
            data,
        }
    }

    /// 获取 3D 掩膜 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> MaskSlice {
        MaskSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取 3D 掩膜 z 空间的第 `z_index` 层可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> MaskSliceMut {
        MaskSliceMut::new(self.data.index_axis_mut(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 掩膜水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = MaskSlice> {
        self.data.axis_iter(Axis(0)).map(MaskSlice::new)
    }

    /// 获取能按升序迭代 3D 掩膜水平可变切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = MaskSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(MaskSliceMut::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, u8, Ix3> {
        self.data.view_mut()
    }

    /// 获取掩膜中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取掩膜中任意前景体素的个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 将掩膜中值为 `old` 的体素全部替换为 `new`.
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

    /// 收集满足谓词 `pred` 的所有体素对应的下标, 结果按行优先存储.
    pub fn filter_pos(&self, pred: Predicate) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(ref pos, pixel)| pred(*pixel).then_some(*pos))
            .collect()
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    #[inline]
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.filter_pos(is_foreground)
    }

    /// 计算前景体素的质心索引 (以体素为单位的浮点坐标, `(z, h, w)` 顺序).
    ///
    /// 掩膜为全背景时返回 `None`.
    pub fn foreground_centroid(&self) -> Option<[f64; 3]> {
        let mut acc = [0.0f64; 3];
        let mut cnt = 0usize;
        for ((z, h, w), p) in self.data.indexed_iter() {
            if is_foreground(*p) {
                acc[0] += z as f64;
                acc[1] += h as f64;
                acc[2] += w as f64;
                cnt += 1;
            }
        }
        (cnt != 0).then(|| acc.map(|v| v / cnt as f64))
    }

    /// 获取 `pos` 前后上下左右六个点的坐标.
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn diamond_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        let candidates = [
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ];
        candidates
            .into_iter()
            .filter(|p| self.check(p))
            .collect()
    }

    /// 只保留给定标签的最大 6-连通分量, 其余同标签体素涂为背景.
    ///
    /// 返回保留下来的分量大小. 不存在该标签时返回 0.
    pub fn retain_largest_component(&mut self, label: u8) -> usize {
        use std::collections::VecDeque;

        let shape = self.shape();
        let mut comp = Array3::<u32>::zeros(shape);
        let mut next = 1u32;
        let mut best = (0u32, 0usize);

        for pos in self.filter_pos_of(label) {
            if comp[pos] != 0 {
                continue;
            }
            let id = next;
            next += 1;

            let mut size = 0usize;
            let mut frontier = VecDeque::with_capacity(64);
            comp[pos] = id;
            frontier.push_back(pos);
            while let Some(cur) = frontier.pop_front() {
                size += 1;
                for n in self.diamond_neighbours(cur) {
                    if self[n] == label && comp[n] == 0 {
                        comp[n] = id;
                        frontier.push_back(n);
                    }
                }
            }
            if size > best.1 {
                best = (id, size);
            }
        }

        if best.1 == 0 {
            return 0;
        }
        for (pos, p) in self.data.indexed_iter_mut() {
            if *p == label && comp[pos] != best.0 {
                *p = MASK_BACKGROUND;
            }
        }
        best.1
    }

    /// `filter_pos` 的单标签特化.
    #[inline]
    fn filter_pos_of(&self, label: u8) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(ref pos, pixel)| (*pixel == label).then_some(*pos))
            .collect()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl MrMask {
    /// 借助 `rayon`, 并行地对掩膜每个水平可变切片实施 `op` 操作.
    /// 该操作会同时携带 z 方向索引信息.
    pub fn par_for_each_indexed_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(usize, MaskSliceMut) + Sync + Send,
    {
        self.data
            .view_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, v)| {
                op(i, MaskSliceMut::new(v));
            });
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl MrScan {
    /// 借助 `rayon`, 并行地对扫描每个水平不可变切片实施 `op` 操作.
    /// 该操作会同时携带 z 方向索引信息.
    pub fn par_for_each_indexed_slice<F>(&self, op: F)
    where
        F: Fn(usize, ScanSlice) + Sync + Send,
    {
        self.data
            .view()
            .axis_iter(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, v)| {
                op(i, ScanSlice::new(v));
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn small_mask() -> MrMask {
        let mut data = Array3::<u8>::zeros((4, 4, 4));
        data[(1, 1, 1)] = MASK_BREAST;
        data[(1, 1, 2)] = MASK_BREAST;
        data[(3, 3, 3)] = MASK_BREAST;
        MrMask::from_parts(data, [2.0, 1.0, 1.0], [10.0, -5.0, 0.0])
    }

    #[test]
    fn test_header_attr_roundtrip() {
        let mask = small_mask();
        assert_eq!(mask.shape(), (4, 4, 4));
        assert_eq!(mask.pix_dim(), [2.0, 1.0, 1.0]);

        let idx = (3, 2, 1);
        let world = mask.index_to_world(idx);
        assert_eq!(world, [11.0, -3.0, 6.0]);
        assert_eq!(mask.world_to_index(world), Some(idx));

        // 越界坐标
        assert_eq!(mask.world_to_index([100.0, 0.0, 0.0]), None);
    }

    #[test]
    fn test_same_geometry() {
        let mask = small_mask();
        let scan = MrScan::from_parts(Array3::zeros((4, 4, 4)), [2.0, 1.0, 1.0], [10.0, -5.0, 0.0]);
        assert!(mask.same_geometry(&scan));

        let other = MrScan::from_parts(Array3::zeros((4, 4, 4)), [2.0, 1.0, 1.5], [10.0, -5.0, 0.0]);
        assert!(!mask.same_geometry(&other));
    }

    #[test]
    fn test_retain_largest_component() {
        let mut mask = small_mask();
        assert_eq!(mask.count(MASK_BREAST), 3);
        assert_eq!(mask.retain_largest_component(MASK_BREAST), 2);
        assert_eq!(mask.count(MASK_BREAST), 2);
        assert_eq!(mask[(3, 3, 3)], MASK_BACKGROUND);
    }

    #[test]
    fn test_centroid() {
        let mask = small_mask();
        let c = mask.foreground_centroid().unwrap();
        assert!((c[0] - 5.0 / 3.0).abs() < 1e-12);
        assert!((c[2] - 2.0).abs() < 1e-12);
    }
}
