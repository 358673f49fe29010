//! 顶点骨骼权重
//!
//! 每根骨骼对应一组 (顶点索引, 权重)。`.mhw` 权重文件是骨骼文件的附属文件，
//! 独立加载。
//!
//! 注意：每个顶点的权重和不做归一化，保证和为 1 是调用方的责任。

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::rig_file::AssetLicense;
use crate::Result;

/// 单根骨骼的顶点权重
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneWeights {
    pub vertices: Vec<usize>,
    pub weights: Vec<f32>,
}

impl BoneWeights {
    pub fn new(vertices: Vec<usize>, weights: Vec<f32>) -> Self {
        Self { vertices, weights }
    }

    /// 从 (顶点, 权重) 对构建，重复顶点的权重相加
    pub fn from_pairs<I: IntoIterator<Item = (usize, f32)>>(pairs: I) -> Self {
        let mut slot: HashMap<usize, usize> = HashMap::new();
        let mut result = Self::default();
        for (vertex, weight) in pairs {
            match slot.get(&vertex) {
                Some(&i) => result.weights[i] += weight,
                None => {
                    slot.insert(vertex, result.vertices.len());
                    result.vertices.push(vertex);
                    result.weights.push(weight);
                }
            }
        }
        result
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len().min(self.weights.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 遍历 (顶点, 权重)
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.vertices.iter().copied().zip(self.weights.iter().copied())
    }
}

/// 骨骼的全部顶点权重（按骨骼名索引）
#[derive(Clone, Debug, Default)]
pub struct VertexBoneWeights {
    pub name: String,
    pub version: i64,
    pub description: String,
    pub license: AssetLicense,
    data: BTreeMap<String, BoneWeights>,
    vertex_count: Option<usize>,
}

impl VertexBoneWeights {
    /// 创建权重表
    ///
    /// 给出 `vertex_count` 与 `root_bone` 时，没有任何权重的顶点
    /// 以权重 1.0 绑定到根骨骼。
    pub fn new(
        data: BTreeMap<String, BoneWeights>,
        vertex_count: Option<usize>,
        root_bone: Option<&str>,
    ) -> Self {
        let mut result = Self {
            name: String::new(),
            version: 1,
            description: String::new(),
            license: AssetLicense::default(),
            data,
            vertex_count,
        };
        if let (Some(count), Some(root)) = (vertex_count, root_bone) {
            result.assign_unweighted_to(root, count);
        }
        result
    }

    /// 以同样的元数据创建新的权重表（用于重映射）
    pub fn create(
        &self,
        data: BTreeMap<String, BoneWeights>,
        vertex_count: Option<usize>,
        root_bone: Option<&str>,
    ) -> Self {
        let mut result = Self::new(data, vertex_count, root_bone);
        result.name = self.name.clone();
        result.version = self.version;
        result.description = self.description.clone();
        result.license = self.license.clone();
        result
    }

    fn assign_unweighted_to(&mut self, root: &str, vertex_count: usize) {
        let unweighted = self.unweighted_vertices_up_to(vertex_count);
        if unweighted.is_empty() {
            return;
        }
        log::debug!("[Weights] {} 个无权重顶点绑定到根骨骼 {}", unweighted.len(), root);
        let entry = self.data.entry(root.to_string()).or_default();
        for vertex in unweighted {
            entry.vertices.push(vertex);
            entry.weights.push(1.0);
        }
    }

    #[inline]
    pub fn get(&self, bone: &str) -> Option<&BoneWeights> {
        self.data.get(bone)
    }

    #[inline]
    pub fn contains_bone(&self, bone: &str) -> bool {
        self.data.contains_key(bone)
    }

    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoneWeights)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 顶点数量：显式给出的值，否则为最大顶点索引 + 1
    pub fn vertex_count(&self) -> usize {
        self.vertex_count.unwrap_or_else(|| {
            self.data
                .values()
                .flat_map(|bw| bw.vertices.iter().copied())
                .max()
                .map_or(0, |m| m + 1)
        })
    }

    /// 创建时显式给出的顶点数量
    #[inline]
    pub fn declared_vertex_count(&self) -> Option<usize> {
        self.vertex_count
    }

    /// 每个顶点的权重和（不做归一化）
    pub fn weight_sums(&self) -> Vec<f32> {
        let mut sums = vec![0.0f32; self.vertex_count()];
        for bw in self.data.values() {
            for (vertex, weight) in bw.iter() {
                if let Some(s) = sums.get_mut(vertex) {
                    *s += weight;
                }
            }
        }
        sums
    }

    /// 没有任何骨骼影响的顶点
    pub fn unweighted_vertices(&self) -> Vec<usize> {
        self.unweighted_vertices_up_to(self.vertex_count())
    }

    fn unweighted_vertices_up_to(&self, count: usize) -> Vec<usize> {
        let mut seen = vec![false; count];
        for bw in self.data.values() {
            for (vertex, weight) in bw.iter() {
                if weight != 0.0 {
                    if let Some(s) = seen.get_mut(vertex) {
                        *s = true;
                    }
                }
            }
        }
        seen.iter()
            .enumerate()
            .filter(|&(_, &s)| !s)
            .map(|(i, _)| i)
            .collect()
    }

    // ========================================
    // 文件读写 (.mhw)
    // ========================================

    /// 从 `.mhw` 文件加载
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        vertex_count: Option<usize>,
        root_bone: Option<&str>,
    ) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text, vertex_count, root_bone)
    }

    /// 从 JSON 字符串加载
    pub fn from_json_str(
        text: &str,
        vertex_count: Option<usize>,
        root_bone: Option<&str>,
    ) -> Result<Self> {
        let file: WeightsFile = serde_json::from_str(text)?;
        let data = file
            .weights
            .into_iter()
            .map(|(bone, pairs)| (bone, BoneWeights::from_pairs(pairs)))
            .collect();
        let mut result = Self::new(data, vertex_count, root_bone);
        result.name = file.name;
        result.version = file.version;
        result.description = file.description;
        result.license = file.license;
        Ok(result)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json_string(&self) -> Result<String> {
        let file = WeightsFile {
            name: self.name.clone(),
            version: self.version,
            description: self.description.clone(),
            license: self.license.clone(),
            weights: self
                .data
                .iter()
                .map(|(bone, bw)| (bone.clone(), bw.iter().collect()))
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// 写入 `.mhw` 文件
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_json_string()?)?;
        Ok(())
    }
}

/// `.mhw` 文件结构
#[derive(Serialize, Deserialize)]
struct WeightsFile {
    #[serde(default)]
    name: String,
    #[serde(default = "default_version")]
    version: i64,
    #[serde(default)]
    description: String,
    #[serde(flatten)]
    license: AssetLicense,
    #[serde(default)]
    weights: BTreeMap<String, Vec<(usize, f32)>>,
}

fn default_version() -> i64 {
    1
}
