//! 掩膜边界的等值面网格提取.
//!
//! 在 0.5 等值面上用布尔 surface nets 变体抽取三角网格: 每个跨越边界的
//! 体素立方格产生一个顶点, 相邻格的顶点沿符号翻转的格棱连成四边形再
//! 剖成三角形. 体素格向外扩一圈采样, 因此贴到数据边界的掩膜也能得到
//! 封闭曲面. 网格只在调用方请求时构建, 构建后与掩膜生命周期无关.

use once_cell::sync::Lazy;

use crate::consts::gray::is_foreground;
use crate::data::{MrMask, VolumeHeaderAttr};

/// 带符号的格点坐标, `(z, h, w)` 顺序.
type Cell = (i64, i64, i64);

/// 每个轴向格棱周围四个相邻格的偏移, 按绕棱顺序排列.
///
/// 轴 0/1/2 分别对应 z/h/w. 对轴 `d` 上的棱, 四个相邻格在另外两个轴上
/// 各取 0 或 -1 偏移.
static QUAD_OFFSETS: Lazy<[[Cell; 4]; 3]> = Lazy::new(|| {
    let mut table = [[(0i64, 0i64, 0i64); 4]; 3];
    for (axis, entry) in table.iter_mut().enumerate() {
        let others: [usize; 2] = match axis {
            0 => [1, 2],
            1 => [0, 2],
            _ => [0, 1],
        };
        // 绕棱一圈: (0,0) -> (-1,0) -> (-1,-1) -> (0,-1).
        let ring = [(0i64, 0i64), (-1, 0), (-1, -1), (0, -1)];
        for (k, (d1, d2)) in ring.into_iter().enumerate() {
            let mut ofs = [0i64; 3];
            ofs[others[0]] = d1;
            ofs[others[1]] = d2;
            entry[k] = (ofs[0], ofs[1], ofs[2]);
        }
    }
    table
});

/// 三角网格: 世界坐标顶点 + 顶点下标三角形.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriMesh {
    /// 顶点的世界坐标 `(x, y, z)`, 单位: 毫米.
    pub vertices: Vec<[f64; 3]>,

    /// 三角形, 每项是三个顶点下标.
    pub triangles: Vec<[u32; 3]>,
}

impl TriMesh {
    /// 网格是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// 网格是否封闭 (每条无向边恰好被两个三角形共享)?
    pub fn is_closed(&self) -> bool {
        use std::collections::HashMap;

        let mut edges: HashMap<(u32, u32), usize> = HashMap::with_capacity(self.triangles.len() * 3);
        for [a, b, c] in &self.triangles {
            for (p, q) in [(a, b), (b, c), (c, a)] {
                let key = (*p.min(q), *p.max(q));
                *edges.entry(key).or_insert(0) += 1;
            }
        }
        !self.triangles.is_empty() && edges.values().all(|n| *n == 2)
    }
}

/// surface nets 提取器的内部状态.
struct NetsBuilder<'a> {
    mask: &'a MrMask,
    shape: (i64, i64, i64),
    /// 每个活跃格的顶点下标, 键为格坐标.
    cell_vertex: std::collections::HashMap<Cell, u32>,
    mesh: TriMesh,
}

impl<'a> NetsBuilder<'a> {
    fn new(mask: &'a MrMask) -> Self {
        let (nz, nh, nw) = mask.shape();
        Self {
            mask,
            shape: (nz as i64, nh as i64, nw as i64),
            cell_vertex: std::collections::HashMap::with_capacity(1024),
            mesh: TriMesh::default(),
        }
    }

    /// 带符号格点处的占据状态. 数据范围外一律视为外部.
    #[inline]
    fn inside(&self, (z, h, w): Cell) -> bool {
        let (nz, nh, nw) = self.shape;
        if z < 0 || h < 0 || w < 0 || z >= nz || h >= nh || w >= nw {
            return false;
        }
        is_foreground(self.mask[(z as usize, h as usize, w as usize)])
    }

    /// 带符号格点的世界坐标 (允许越界一圈的外插).
    #[inline]
    fn world(&self, (z, h, w): Cell) -> [f64; 3] {
        let [z_mm, h_mm, w_mm] = self.mask.pix_dim();
        let [ox, oy, oz] = self.mask.origin();
        [
            ox + w as f64 * w_mm,
            oy + h as f64 * h_mm,
            oz + z as f64 * z_mm,
        ]
    }

    /// 取得 (或创建) 格 `cell` 的顶点.
    ///
    /// 顶点位置取该格所有符号翻转棱中点的平均, 落在真实边界附近.
    fn vertex_of(&mut self, cell: Cell) -> u32 {
        if let Some(idx) = self.cell_vertex.get(&cell) {
            return *idx;
        }

        let corners: [Cell; 8] = CUBE_CORNERS.map(|(dz, dh, dw)| {
            (cell.0 + dz, cell.1 + dh, cell.2 + dw)
        });
        let occupancy: [bool; 8] = corners.map(|c| self.inside(c));

        let mut acc = [0.0f64; 3];
        let mut n = 0usize;
        for (a, b) in CUBE_EDGES {
            if occupancy[a] != occupancy[b] {
                let (pa, pb) = (self.world(corners[a]), self.world(corners[b]));
                for k in 0..3 {
                    acc[k] += 0.5 * (pa[k] + pb[k]);
                }
                n += 1;
            }
        }
        debug_assert!(n > 0, "非活跃格不应请求顶点");
        let vertex = acc.map(|v| v / n as f64);

        let idx = self.mesh.vertices.len() as u32;
        self.mesh.vertices.push(vertex);
        self.cell_vertex.insert(cell, idx);
        idx
    }

    /// 遍历所有格棱, 为每条符号翻转棱生成一个四边形 (两个三角形).
    fn run(mut self) -> TriMesh {
        let (nz, nh, nw) = self.shape;

        for z in -1..=nz {
            for h in -1..=nh {
                for w in -1..=nw {
                    let a = (z, h, w);
                    let a_inside = self.inside(a);
                    for (axis, unit) in
                        [(0usize, (1i64, 0i64, 0i64)), (1, (0, 1, 0)), (2, (0, 0, 1))]
                    {
                        let b = (a.0 + unit.0, a.1 + unit.1, a.2 + unit.2);
                        if self.inside(b) == a_inside {
                            continue;
                        }

                        let quad: Vec<u32> = QUAD_OFFSETS[axis]
                            .iter()
                            .map(|(dz, dh, dw)| self.vertex_of((a.0 + dz, a.1 + dh, a.2 + dw)))
                            .collect();

                        // 朝向: 让法线指向外部 (从内部端点指向外部端点).
                        let [v0, v1, v2, v3] = [quad[0], quad[1], quad[2], quad[3]];
                        if a_inside {
                            self.mesh.triangles.push([v0, v1, v2]);
                            self.mesh.triangles.push([v0, v2, v3]);
                        } else {
                            self.mesh.triangles.push([v0, v2, v1]);
                            self.mesh.triangles.push([v0, v3, v2]);
                        }
                    }
                }
            }
        }
        self.mesh
    }
}

/// 立方格八个角的偏移.
const CUBE_CORNERS: [Cell; 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (1, 1, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (1, 1, 1),
    (0, 1, 1),
];

/// 立方格十二条棱, 以角下标对表示.
const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// 提取最终掩膜的封闭边界网格.
///
/// 掩膜为空时返回空网格.
pub fn extract_mesh(mask: &MrMask) -> TriMesh {
    NetsBuilder::new(mask).run()
}
