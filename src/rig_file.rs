//! 骨骼文件 (.mhskel)
//!
//! JSON 格式，骨骼定义是以骨骼名为键的对象，通过 parent 引用父骨骼。
//! 文件中的骨骼顺序不要求父骨骼在前，加载时先做拓扑排序。
//! 顶点权重保存在独立的 `.mhw` 文件中（`weights_file`，相对骨骼文件所在目录）。
//!
//! 骨骼文件通常是手工编辑的，加载尽量宽容：
//! 无效的单根骨骼只输出警告并跳过，只有完全没有可用骨骼时才返回错误。

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::get_config;
use crate::mesh::MeshGeometry;
use crate::skeleton::{PlaneMapStrategy, Roll, Skeleton};
use crate::weights::VertexBoneWeights;
use crate::{Result, RigError};

// ============================================================================
// 文件结构
// ============================================================================

/// 资源授权信息（骨骼文件与权重文件共用，字段平铺在顶层）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLicense {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

/// 骨骼文件
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RigFile {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version", deserialize_with = "integer")]
    pub version: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_plane_map_strategy", deserialize_with = "integer")]
    pub plane_map_strategy: i64,
    #[serde(flatten)]
    pub license: AssetLicense,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_file: Option<String>,
    /// 保持文件中的顺序（决定根骨骼顺序）
    #[serde(default, with = "ordered_map")]
    pub bones: Vec<(String, BoneDef)>,
    /// 关节名 → 顶点索引列表；不是非空整数列表的条目在加载时被忽略
    #[serde(default)]
    pub joints: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub planes: BTreeMap<String, Vec<String>>,
}

/// 单根骨骼定义
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneDef {
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub tail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "RotationPlane::is_unset")]
    pub rotation_plane: RotationPlane,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<NameList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_reference: Option<NameList>,
}

/// rotation_plane 字段：角度、平面名或平面名列表
///
/// 其他类型（包括 null）读作 `Invalid`，加载时按默认朝向处理。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RotationPlane {
    Angle(f64),
    Plane(String),
    Planes(Vec<Option<String>>),
    Invalid(serde_json::Value),
}

impl Default for RotationPlane {
    fn default() -> Self {
        RotationPlane::Angle(0.0)
    }
}

impl RotationPlane {
    fn is_unset(&self) -> bool {
        match self {
            RotationPlane::Angle(a) => *a == 0.0,
            RotationPlane::Plane(name) => name.is_empty(),
            RotationPlane::Planes(list) => list.is_empty(),
            RotationPlane::Invalid(_) => true,
        }
    }

    fn to_roll(&self, bone: &str) -> Roll {
        match self {
            RotationPlane::Angle(a) => Roll::Angle(*a as f32),
            RotationPlane::Plane(name) if name.is_empty() => Roll::default(),
            RotationPlane::Plane(name) => Roll::Plane(name.clone()),
            RotationPlane::Planes(list) => {
                let names: Vec<String> = list.iter().flatten().cloned().collect();
                if names.is_empty() {
                    log::warn!(
                        "[RigFile] 骨骼 {} 的 rotation_plane 无效，请在 .mhskel 中填写平面关节",
                        bone
                    );
                    Roll::default()
                } else {
                    if names.len() != list.len() {
                        log::warn!("[RigFile] 骨骼 {} 的 rotation_plane 含有空平面名", bone);
                    }
                    Roll::Planes(names)
                }
            }
            RotationPlane::Invalid(value) => {
                log::warn!(
                    "[RigFile] 骨骼 {} 的 rotation_plane 类型无效 ({})，使用默认朝向",
                    bone,
                    value
                );
                Roll::default()
            }
        }
    }
}

impl From<&Roll> for RotationPlane {
    fn from(roll: &Roll) -> Self {
        match roll {
            Roll::Angle(a) => RotationPlane::Angle(f64::from(*a)),
            Roll::Plane(name) => RotationPlane::Plane(name.clone()),
            Roll::Planes(names) => RotationPlane::Planes(names.iter().cloned().map(Some).collect()),
        }
    }
}

/// 单个名称或名称列表
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl NameList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            NameList::One(name) => vec![name],
            NameList::Many(names) => names,
        }
    }
}

fn default_name() -> String {
    "Skeleton".to_string()
}

fn default_version() -> i64 {
    1
}

fn default_plane_map_strategy() -> i64 {
    i64::from(get_config().default_plane_map_strategy)
}

/// 整数字段，兼容写成字符串或浮点数的值
fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Loose::deserialize(deserializer)? {
        Loose::Int(v) => Ok(v),
        Loose::Float(v) => Ok(v as i64),
        Loose::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// 保持 JSON 对象键顺序的 (键, 值) 列表
///
/// 每个值单独解析，无法解析的条目输出警告并跳过，不影响其他条目。
mod ordered_map {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }

    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of bone definitions")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
                match V::deserialize(value) {
                    Ok(value) => entries.push((key, value)),
                    Err(e) => log::warn!("[RigFile] 骨骼 {} 的定义无效，已跳过: {}", key, e),
                }
            }
            Ok(entries)
        }
    }
}

// ============================================================================
// 加载
// ============================================================================

/// 从骨骼文件加载骨骼
pub fn load<P: AsRef<Path>>(path: P, mesh: &dyn MeshGeometry) -> Result<Skeleton> {
    Skeleton::from_file(path, mesh)
}

/// 骨骼文件的元数据（不构建骨骼）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RigMetadata {
    pub name: String,
    pub description: String,
    /// 小写标签
    pub tags: BTreeSet<String>,
}

/// 只读取骨骼文件的名称、描述与标签
pub fn peek_metadata<P: AsRef<Path>>(path: P) -> Result<RigMetadata> {
    #[derive(Deserialize)]
    struct Header {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    let text = fs::read_to_string(path.as_ref())?;
    let header: Header = serde_json::from_str(&text)?;
    Ok(RigMetadata {
        name: header.name,
        description: header.description,
        tags: header.tags.iter().map(|t| t.to_lowercase()).collect(),
    })
}

/// 有效的关节顶点索引：非空的非负整数列表
fn joint_indices(joint: &str, value: &serde_json::Value) -> Option<Vec<usize>> {
    let list = value.as_array()?;
    if list.is_empty() {
        return None;
    }
    let indices: Option<Vec<usize>> = list
        .iter()
        .map(|v| v.as_u64().map(|i| i as usize))
        .collect();
    if indices.is_none() {
        log::warn!("[RigFile] 关节 {} 的顶点索引无效，已忽略", joint);
    }
    indices
}

/// 拓扑排序：父骨骼总是先于子骨骼
///
/// 反复扫描尚未放置的骨骼，直到不再变化。父骨骼缺失或成环的骨骼被丢弃。
fn topological_order<'a>(file: &str, bones: &'a [(String, BoneDef)]) -> Vec<(&'a str, &'a BoneDef)> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(bones.len());
    for (name, def) in bones {
        if !seen.insert(name.as_str()) {
            log::warn!("[RigFile] {} 中骨骼 {} 重复定义，忽略后一个", file, name);
            continue;
        }
        if def.head.is_empty() || def.tail.is_empty() {
            log::warn!("[RigFile] {} 中骨骼 {} 缺少 head/tail 关节", file, name);
            continue;
        }
        candidates.push((name.as_str(), def));
    }

    let mut placed: Vec<(&str, &BoneDef)> = Vec::with_capacity(candidates.len());
    let mut placed_names: HashSet<&str> = HashSet::new();
    loop {
        let before = placed.len();
        for &(name, def) in &candidates {
            if placed_names.contains(name) {
                continue;
            }
            let ready = match def.parent.as_deref() {
                None | Some("") => true,
                Some(parent) => placed_names.contains(parent),
            };
            if ready {
                placed_names.insert(name);
                placed.push((name, def));
            }
        }
        if placed.len() == before || placed.len() == candidates.len() {
            break;
        }
    }

    if placed.len() != candidates.len() {
        let missing: Vec<&str> = candidates
            .iter()
            .map(|&(name, _)| name)
            .filter(|name| !placed_names.contains(name))
            .collect();
        log::warn!(
            "[RigFile] {} 中部分骨骼的父骨骼无效，未加入骨骼: {}",
            file,
            missing.join(", ")
        );
    }
    placed
}

/// 查找权重文件：先相对骨骼文件目录，再按原路径
fn resolve_weights_file(rig_path: &Path, weights_file: &str) -> Option<PathBuf> {
    let relative = rig_path
        .parent()
        .map(|dir| dir.join(weights_file))
        .filter(|p| p.is_file());
    relative.or_else(|| {
        let direct = PathBuf::from(weights_file);
        direct.is_file().then_some(direct)
    })
}

impl Skeleton {
    /// 从骨骼文件加载，附带的权重文件一并加载
    pub fn from_file<P: AsRef<Path>>(path: P, mesh: &dyn MeshGeometry) -> Result<Skeleton> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let rig: RigFile = serde_json::from_str(&text)?;
        let mut skeleton = Skeleton::from_rig(&rig, &path.display().to_string(), mesh)?;

        if let Some(weights_file) = rig.weights_file.as_deref().filter(|f| !f.is_empty()) {
            match resolve_weights_file(path, weights_file) {
                Some(weights_path) => {
                    let root = skeleton.roots().next().map(|b| b.name.clone());
                    let weights = VertexBoneWeights::from_file(
                        &weights_path,
                        Some(mesh.vertex_count()),
                        root.as_deref(),
                    )?;
                    skeleton.set_vertex_weights(weights, true);
                }
                None => log::warn!(
                    "[RigFile] 找不到 {} 引用的权重文件 {}",
                    path.display(),
                    weights_file
                ),
            }
        }
        Ok(skeleton)
    }

    /// 从 JSON 字符串构建（不加载权重文件）
    pub fn from_json_str(text: &str, mesh: &dyn MeshGeometry) -> Result<Skeleton> {
        let rig: RigFile = serde_json::from_str(text)?;
        Skeleton::from_rig(&rig, "<json>", mesh)
    }

    /// 从骨骼文件结构构建并计算静止矩阵
    ///
    /// `source` 只用于日志。
    pub fn from_rig(rig: &RigFile, source: &str, mesh: &dyn MeshGeometry) -> Result<Skeleton> {
        let mut skeleton = Skeleton::new(rig.name.clone());
        skeleton.version = rig.version;
        skeleton.description = rig.description.clone();
        skeleton.plane_map_strategy = PlaneMapStrategy::from_value(rig.plane_map_strategy);
        skeleton.license = rig.license.clone();
        skeleton.tags = rig.tags.clone();

        for (joint, value) in &rig.joints {
            if let Some(indices) = joint_indices(joint, value) {
                skeleton.set_joint_vertices(joint.clone(), indices);
            }
        }
        skeleton.planes = rig.planes.clone();

        let order = topological_order(source, &rig.bones);
        if order.is_empty() {
            return Err(RigError::NoBones(rig.name.clone()));
        }
        for (name, def) in order {
            let parent = def.parent.as_deref().filter(|p| !p.is_empty());
            skeleton.add_bone(
                name,
                parent,
                &def.head,
                &def.tail,
                def.rotation_plane.to_roll(name),
                def.reference.clone().map(NameList::into_vec).unwrap_or_default(),
                def.weights_reference.clone().map(NameList::into_vec),
            )?;
        }

        skeleton.update_joints(mesh, None)?;
        Ok(skeleton)
    }

    // ========================================
    // 保存
    // ========================================

    /// 转换为骨骼文件结构（骨骼按广度优先顺序）
    pub fn to_rig(&self, weights_file: Option<String>) -> RigFile {
        let bones = self
            .get_bones()
            .map(|bone| {
                let weight_refs = bone.weight_reference_bones();
                let def = BoneDef {
                    head: bone.head_joint.clone(),
                    tail: bone.tail_joint.clone(),
                    parent: self.parent_of(bone).map(|p| p.name.clone()),
                    rotation_plane: RotationPlane::from(&bone.roll),
                    reference: (!bone.reference_bones.is_empty())
                        .then(|| NameList::Many(bone.reference_bones.clone())),
                    weights_reference: (weight_refs != bone.reference_bones.as_slice())
                        .then(|| NameList::Many(weight_refs.to_vec())),
                };
                (bone.name.clone(), def)
            })
            .collect();

        RigFile {
            name: self.name.clone(),
            version: self.version,
            description: self.description.clone(),
            plane_map_strategy: i64::from(self.plane_map_strategy.value()),
            license: self.license.clone(),
            tags: self.tags.clone(),
            weights_file,
            bones,
            joints: self
                .joint_pos_idxs
                .iter()
                .map(|(joint, indices)| (joint.clone(), serde_json::Value::from(indices.clone())))
                .collect(),
            planes: self.planes.clone(),
        }
    }

    /// 保存骨骼文件，并在同一目录写入 `<文件名>_weights.mhw`
    ///
    /// 本骨骼没有权重时从 ref_weights 重映射。
    pub fn to_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        ref_weights: Option<&VertexBoneWeights>,
    ) -> Result<()> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map_or_else(|| self.name.clone(), str::to_string);
        let weights_file = format!("{}_weights.mhw", stem);

        let rig = self.to_rig(Some(weights_file.clone()));
        fs::write(path, serde_json::to_string_pretty(&rig)?)?;

        match self.get_vertex_weights(ref_weights, false) {
            Some(weights) => {
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                weights.to_file(dir.join(&weights_file))?;
            }
            None => log::warn!(
                "[RigFile] 骨骼 {} 没有顶点权重，未写入 {}",
                self.name,
                weights_file
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::BaseMesh;
    use glam::Vec3;

    const EPS: f32 = 1e-4;

    const RIG: &str = r#"{
        "name": "game_engine",
        "version": 110,
        "description": "test rig",
        "plane_map_strategy": 2,
        "author": "someone",
        "license": "CC0",
        "tags": ["Game", "Simple"],
        "weights_file": "game_engine_weights.mhw",
        "joints": {
            "spine": [1],
            "neck": [2],
            "front": [3],
            "empty": [],
            "broken": "x"
        },
        "planes": {
            "chest_plane": ["spine", "front", "neck"]
        },
        "bones": {
            "head": {"head": "neck", "tail": "top", "parent": "chest"},
            "chest": {
                "head": "spine", "tail": "neck", "parent": "root",
                "rotation_plane": "chest_plane",
                "reference": ["spine03", "spine02"]
            },
            "root": {
                "head": "hips", "tail": "spine",
                "reference": "pelvis",
                "weights_reference": ["pelvis", "spine01"]
            },
            "orphan": {"head": "hips", "tail": "spine", "parent": "nobody"},
            "loop_a": {"head": "hips", "tail": "spine", "parent": "loop_b"},
            "loop_b": {"head": "hips", "tail": "spine", "parent": "loop_a"},
            "placeholder": {
                "head": "hips", "tail": "top", "parent": "root",
                "rotation_plane": [null, null, null]
            }
        }
    }"#;

    const WEIGHTS: &str = r#"{
        "name": "game_engine",
        "version": 110,
        "weights": {
            "root": [[0, 1.0]],
            "chest": [[1, 1.0], [2, 0.5]],
            "head": [[2, 0.5], [4, 1.0]]
        }
    }"#;

    fn mesh() -> BaseMesh {
        BaseMesh::new(vec![
            Vec3::new(0.0, 0.0, 0.0), // hips
            Vec3::new(0.0, 1.0, 0.0), // spine
            Vec3::new(0.0, 2.0, 0.0), // neck
            Vec3::new(0.0, 1.0, 1.0), // front
            Vec3::new(0.0, 3.0, 0.0), // top
        ])
        .with_group("joint-hips", vec![0])
        .with_group("joint-top", vec![4])
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rig_engine_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_topological_load() {
        crate::init_test_logger();
        let mesh = mesh();
        let skel = Skeleton::from_json_str(RIG, &mesh).unwrap();

        assert_eq!(skel.bone_names(), vec!["root", "placeholder", "chest", "head"]);
        assert!(!skel.contains_bone("orphan"));
        assert!(!skel.contains_bone("loop_a"));

        assert_eq!(skel.name, "game_engine");
        assert_eq!(skel.version, 110);
        assert_eq!(skel.plane_map_strategy, PlaneMapStrategy::LastReference);
        assert_eq!(skel.license.author.as_deref(), Some("someone"));
        assert_eq!(skel.license.license.as_deref(), Some("CC0"));
        assert_eq!(skel.tags, vec!["Game".to_string(), "Simple".to_string()]);

        let keys: Vec<&str> = skel.joint_pos_idxs().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["front", "neck", "spine"]);
    }

    #[test]
    fn test_bone_definitions() {
        let mesh = mesh();
        let skel = Skeleton::from_json_str(RIG, &mesh).unwrap();

        let chest = skel.get_bone("chest").unwrap();
        assert_eq!(chest.roll, Roll::Plane("chest_plane".into()));
        assert_eq!(chest.reference_bones, vec!["spine03".to_string(), "spine02".to_string()]);
        assert!((chest.rest_global().x_axis.truncate() - Vec3::X).length() < EPS);

        let root = skel.get_bone("root").unwrap();
        assert_eq!(root.reference_bones, vec!["pelvis".to_string()]);
        assert_eq!(
            root.weight_reference_bones(),
            &["pelvis".to_string(), "spine01".to_string()]
        );

        let placeholder = skel.get_bone("placeholder").unwrap();
        assert_eq!(placeholder.roll, Roll::default());
        assert!((placeholder.rest_tail() - Vec3::new(0.0, 3.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_loose_numbers_and_no_bones() {
        let mesh = mesh();
        let text = r#"{"name": "x", "version": "7", "bones": {"a": {"head": "hips", "tail": "top"}}}"#;
        let skel = Skeleton::from_json_str(text, &mesh).unwrap();
        assert_eq!(skel.version, 7);
        assert_eq!(skel.plane_map_strategy, PlaneMapStrategy::Average);

        let empty = r#"{"name": "empty", "bones": {"a": {"head": "hips", "tail": "top", "parent": "a"}}}"#;
        assert!(matches!(
            Skeleton::from_json_str(empty, &mesh),
            Err(RigError::NoBones(name)) if name == "empty"
        ));
        assert!(matches!(
            Skeleton::from_json_str("{", &mesh),
            Err(RigError::Json(_))
        ));
    }

    #[test]
    fn test_roundtrip_file() {
        crate::init_test_logger();
        let dir = temp_dir("roundtrip");
        let rig_path = dir.join("game_engine.mhskel");
        fs::write(&rig_path, RIG).unwrap();
        fs::write(dir.join("game_engine_weights.mhw"), WEIGHTS).unwrap();

        let mesh = mesh();
        let mut skel = load(&rig_path, &mesh).unwrap();
        assert!(skel.has_custom_vertex_weights());
        let weights = skel.vertex_weights().unwrap();
        // 顶点 3 没有权重，归根骨骼
        assert_eq!(weights.get("root").unwrap().vertices, vec![0, 3]);

        let saved_path = dir.join("saved.mhskel");
        skel.to_file(&saved_path, None).unwrap();
        assert!(dir.join("saved_weights.mhw").is_file());

        let again = load(&saved_path, &mesh).unwrap();
        assert_eq!(again.bone_names(), skel.bone_names());
        for (a, b) in skel.get_bones().zip(again.get_bones()) {
            assert_eq!(a.head_joint, b.head_joint);
            assert_eq!(a.tail_joint, b.tail_joint);
            assert_eq!(a.roll, b.roll);
            assert_eq!(a.reference_bones, b.reference_bones);
            assert_eq!(a.weight_reference_bones(), b.weight_reference_bones());
            assert_eq!(
                skel.parent_of(a).map(|p| p.name.clone()),
                again.parent_of(b).map(|p| p.name.clone())
            );
            assert!(a.rest_global().abs_diff_eq(b.rest_global(), EPS));
        }
        assert_eq!(again.joint_pos_idxs(), skel.joint_pos_idxs());
        assert_eq!(again.planes(), skel.planes());
        assert_eq!(again.license, skel.license);
        assert_eq!(
            again.vertex_weights().unwrap().get("chest"),
            skel.vertex_weights().unwrap().get("chest")
        );

        // 保存的骨骼按广度优先顺序排列
        let saved: RigFile = serde_json::from_str(&fs::read_to_string(&saved_path).unwrap()).unwrap();
        let order: Vec<&str> = saved.bones.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["root", "placeholder", "chest", "head"]);
        assert_eq!(saved.weights_file.as_deref(), Some("saved_weights.mhw"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_weights_file_is_not_fatal() {
        crate::init_test_logger();
        let dir = temp_dir("missing_weights");
        let rig_path = dir.join("lonely.mhskel");
        fs::write(&rig_path, RIG).unwrap();

        let skel = load(&rig_path, &mesh()).unwrap();
        assert!(!skel.has_custom_vertex_weights());
        assert!(skel.vertex_weights().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_peek_metadata() {
        let dir = temp_dir("peek");
        let rig_path = dir.join("meta.mhskel");
        fs::write(&rig_path, RIG).unwrap();

        let meta = peek_metadata(&rig_path).unwrap();
        assert_eq!(meta.name, "game_engine");
        assert_eq!(meta.description, "test rig");
        let tags: Vec<&str> = meta.tags.iter().map(|t| t.as_str()).collect();
        assert_eq!(tags, vec!["game", "simple"]);

        fs::write(&rig_path, "{}").unwrap();
        assert_eq!(peek_metadata(&rig_path).unwrap().name, "Skeleton");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_bone_fields_are_local() {
        crate::init_test_logger();
        let text = r#"{
            "name": "hand_edited",
            "bones": {
                "good": {"head": "hips", "tail": "top"},
                "null_roll": {"head": "hips", "tail": "top", "parent": "good", "rotation_plane": null},
                "odd_roll": {"head": "hips", "tail": "top", "parent": "good", "rotation_plane": {"x": 1}},
                "broken": {"head": 5, "tail": "top", "parent": "good"},
                "under_broken": {"head": "hips", "tail": "top", "parent": "broken"}
            }
        }"#;
        let skel = Skeleton::from_json_str(text, &mesh()).unwrap();
        assert_eq!(skel.bone_names(), vec!["good", "null_roll", "odd_roll"]);
        assert_eq!(skel.get_bone("null_roll").unwrap().roll, Roll::default());
        assert_eq!(skel.get_bone("odd_roll").unwrap().roll, Roll::default());

        // 无效的 rotation_plane 不会被写回文件
        let rig = skel.to_rig(None);
        let json = serde_json::to_value(&rig).unwrap();
        assert!(json["bones"]["null_roll"].get("rotation_plane").is_none());
    }

    #[test]
    fn test_rotation_plane_forms() {
        let parse = |text: &str| serde_json::from_str::<BoneDef>(text).unwrap();
        let angle = parse(r#"{"head": "a", "tail": "b", "rotation_plane": 0}"#);
        assert_eq!(angle.rotation_plane.to_roll("x"), Roll::Angle(0.0));
        let planes = parse(r#"{"head": "a", "tail": "b", "rotation_plane": ["p1", null, "p2"]}"#);
        assert_eq!(
            planes.rotation_plane.to_roll("x"),
            Roll::Planes(vec!["p1".into(), "p2".into()])
        );
        assert_eq!(
            RotationPlane::from(&Roll::Plane("p".into())),
            RotationPlane::Plane("p".into())
        );
    }
}
