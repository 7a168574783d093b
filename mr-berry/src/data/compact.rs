//! 掩膜的压缩快照.
//!
//! 诊断保留钩子会在流水线运行期间收到大量中间掩膜的借用.
//! 想要留存多份快照的调用方可以用 [`CompactMask`] 把掩膜压缩成小对象,
//! 避免在内存中堆积多个全尺寸体数据.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::Array3;
use nifti::NiftiHeader;
use std::io::{Read, Write};

use super::{MrMask, VolumeHeaderAttr};
use crate::Idx3d;

/// 以 zlib 压缩存储的掩膜快照. 几何元信息原样保留.
#[derive(Debug, Clone)]
pub struct CompactMask {
    header: Box<NiftiHeader>,
    shape: Idx3d,
    bytes: Vec<u8>,
}

impl CompactMask {
    /// 压缩 `mask` 的当前内容.
    ///
    /// 掩膜数据几乎全是大片同值区域, zlib 对它的压缩比非常高.
    pub fn from_mask(mask: &MrMask) -> Self {
        let view = mask.data();
        let standard;
        let slice = match view.as_slice() {
            Some(s) => s,
            None => {
                standard = view.as_standard_layout().to_owned();
                standard.as_slice().unwrap()
            }
        };

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(1024), Compression::fast());
        // 对 Vec 的写入不会失败.
        encoder.write_all(slice).unwrap();
        let bytes = encoder.finish().unwrap();

        Self {
            header: Box::new(mask.header().clone()),
            shape: mask.shape(),
            bytes,
        }
    }

    /// 解压并恢复出完整掩膜.
    pub fn restore(&self) -> MrMask {
        let (z, h, w) = self.shape;
        let mut raw = Vec::with_capacity(z * h * w);
        let mut decoder = ZlibDecoder::new(self.bytes.as_slice());
        decoder.read_to_end(&mut raw).expect("压缩快照已损坏");
        assert_eq!(raw.len(), z * h * w, "压缩快照大小不符");

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data = Array3::from_shape_vec(self.shape, raw).unwrap();
        let mut mask = MrMask::zeros_like(self);
        mask.data_mut().assign(&data.view());
        mask
    }

    /// 压缩后占用的字节数.
    #[inline]
    pub fn compressed_len(&self) -> usize {
        self.bytes.len()
    }
}

impl VolumeHeaderAttr for CompactMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}
