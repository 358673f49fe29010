//! 网格几何接口
//!
//! 骨骼只读取网格顶点坐标来确定关节位置，从不修改网格。
//! 调用方显式传入实现了 [`MeshGeometry`] 的对象。

use std::collections::HashMap;

use glam::Vec3;

/// 关节位置所需的网格查询能力
pub trait MeshGeometry {
    /// 顶点数量
    fn vertex_count(&self) -> usize;

    /// 静止姿态下的顶点坐标
    fn rest_coord(&self, index: usize) -> Option<Vec3>;

    /// 当前（可能已摆姿态）的顶点坐标，默认等同静止坐标
    fn coord(&self, index: usize) -> Option<Vec3> {
        self.rest_coord(index)
    }

    /// 顶点组（face group）包含的顶点索引
    fn group_vertices(&self, group: &str) -> Option<Vec<usize>>;

    /// 一组顶点的质心，越界索引被忽略；没有有效顶点时返回 None
    fn centroid(&self, indices: &[usize], rest: bool) -> Option<Vec3> {
        let mut sum = Vec3::ZERO;
        let mut count = 0usize;
        for &index in indices {
            let coord = if rest { self.rest_coord(index) } else { self.coord(index) };
            if let Some(c) = coord {
                sum += c;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(sum / count as f32)
        }
    }
}

/// 内存中的基础网格：静止坐标、可选的姿态坐标和命名顶点组
#[derive(Clone, Debug, Default)]
pub struct BaseMesh {
    pub rest_coords: Vec<Vec3>,
    /// 姿态坐标，None 表示网格处于静止姿态
    pub posed_coords: Option<Vec<Vec3>>,
    pub groups: HashMap<String, Vec<usize>>,
}

impl BaseMesh {
    pub fn new(rest_coords: Vec<Vec3>) -> Self {
        Self {
            rest_coords,
            posed_coords: None,
            groups: HashMap::new(),
        }
    }

    /// 添加顶点组
    pub fn with_group(mut self, name: impl Into<String>, vertices: Vec<usize>) -> Self {
        self.groups.insert(name.into(), vertices);
        self
    }

    /// 设置姿态坐标（长度应与静止坐标一致）
    pub fn set_posed_coords(&mut self, coords: Vec<Vec3>) {
        self.posed_coords = Some(coords);
    }
}

impl MeshGeometry for BaseMesh {
    fn vertex_count(&self) -> usize {
        self.rest_coords.len()
    }

    fn rest_coord(&self, index: usize) -> Option<Vec3> {
        self.rest_coords.get(index).copied()
    }

    fn coord(&self, index: usize) -> Option<Vec3> {
        match self.posed_coords {
            Some(ref posed) => posed.get(index).copied(),
            None => self.rest_coord(index),
        }
    }

    fn group_vertices(&self, group: &str) -> Option<Vec<usize>> {
        self.groups.get(group).cloned()
    }
}
