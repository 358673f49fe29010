//! 骨骼容器
//!
//! Skeleton 以 arena 方式持有全部骨骼（`Vec<Bone>` + 名称索引），
//! 父子关系用索引表示，广度优先顺序在每次结构变化时立即重建。
//!
//! 姿态数组（get_pose / set_pose）始终按广度优先顺序排列。

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use glam::{Mat3, Mat4, Vec3};

use super::bone::{axis_vector, set_rotation_part, Bone, Roll};
use super::remap::copy_normal;
use super::transform::{is_near_zero, plane_normal, LocalBoneAxis, MeshOrientation};
use crate::config::get_config;
use crate::mesh::MeshGeometry;
use crate::rig_file::AssetLicense;
use crate::weights::VertexBoneWeights;
use crate::{Result, RigError};

// ============================================================================
// 平面映射策略
// ============================================================================

/// 从参考骨骼继承朝向平面的策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaneMapStrategy {
    /// 只使用第一个参考骨骼的平面
    FirstReference = 1,
    /// 只使用最后一个参考骨骼的平面
    LastReference = 2,
    /// 对所有参考骨骼的平面法线取平均
    #[default]
    Average = 3,
}

impl PlaneMapStrategy {
    /// 从文件中的整数值解析，非法值回退到平均策略
    pub fn from_value(value: i64) -> Self {
        match value {
            1 => PlaneMapStrategy::FirstReference,
            2 => PlaneMapStrategy::LastReference,
            3 => PlaneMapStrategy::Average,
            other => {
                log::warn!("[Skeleton] 未知的平面映射策略 {}，使用 3", other);
                PlaneMapStrategy::Average
            }
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self as u8
    }
}

// ============================================================================
// 骨骼容器
// ============================================================================

/// 骨骼（骨骼森林）
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub name: String,
    pub version: i64,
    pub description: String,
    pub license: AssetLicense,
    pub tags: Vec<String>,
    pub plane_map_strategy: PlaneMapStrategy,

    /// 统一缩放系数
    pub(crate) scale: f32,

    /// 骨骼 arena
    pub(crate) bones: Vec<Bone>,
    pub(crate) lookup: HashMap<String, usize>,
    pub(crate) roots: Vec<usize>,
    /// 广度优先顺序缓存（arena 索引）
    pub(crate) order: Vec<usize>,

    /// 关节名 → 网格顶点索引（质心即关节位置）
    pub(crate) joint_pos_idxs: BTreeMap<String, Vec<usize>>,
    /// 平面名 → 三个关节名
    pub(crate) planes: BTreeMap<String, Vec<String>>,
    /// 最近一次 update_joints 解析出的关节位置（未乘缩放）
    pub(crate) joint_positions: HashMap<String, Vec3>,

    pub(crate) vertex_weights: Option<VertexBoneWeights>,
    pub(crate) has_custom_weights: bool,
}

impl Skeleton {
    /// 创建空骨骼
    pub fn new(name: impl Into<String>) -> Self {
        let strategy = i64::from(get_config().default_plane_map_strategy);
        Self {
            name: name.into(),
            version: 1,
            description: String::new(),
            license: AssetLicense::default(),
            tags: Vec::new(),
            plane_map_strategy: PlaneMapStrategy::from_value(strategy),
            scale: 1.0,
            bones: Vec::new(),
            lookup: HashMap::new(),
            roots: Vec::new(),
            order: Vec::new(),
            joint_pos_idxs: BTreeMap::new(),
            planes: BTreeMap::new(),
            joint_positions: HashMap::new(),
            vertex_weights: None,
            has_custom_weights: false,
        }
    }

    // ========================================
    // 结构
    // ========================================

    /// 添加骨骼
    ///
    /// 父骨骼必须已经存在；名称重复或父骨骼未知时返回错误。
    #[allow(clippy::too_many_arguments)]
    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<&str>,
        head_joint: &str,
        tail_joint: &str,
        roll: Roll,
        reference_bones: Vec<String>,
        weight_reference_bones: Option<Vec<String>>,
    ) -> Result<&mut Bone> {
        if self.lookup.contains_key(name) {
            return Err(RigError::DuplicateBone {
                skeleton: self.name.clone(),
                bone: name.to_string(),
            });
        }
        let parent_id = match parent {
            Some(parent_name) => Some(*self.lookup.get(parent_name).ok_or_else(|| {
                RigError::UnknownParent {
                    bone: name.to_string(),
                    parent: parent_name.to_string(),
                }
            })?),
            None => None,
        };

        let id = self.bones.len();
        let level = parent_id.map_or(0, |p| self.bones[p].level + 1);
        self.bones.push(Bone::new(
            name.to_string(),
            id,
            parent_id,
            level,
            head_joint.to_string(),
            tail_joint.to_string(),
            roll,
            reference_bones,
            weight_reference_bones,
        ));
        self.lookup.insert(name.to_string(), id);
        match parent_id {
            Some(p) => self.bones[p].children.push(id),
            None => self.roots.push(id),
        }
        self.rebuild_order();
        Ok(&mut self.bones[id])
    }

    /// 重建广度优先顺序并分配 index
    fn rebuild_order(&mut self) {
        let mut order = Vec::with_capacity(self.bones.len());
        let mut queue: VecDeque<usize> = self.roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.bones[id].children.iter().copied());
        }
        for (index, &id) in order.iter().enumerate() {
            self.bones[id].index = index;
        }
        self.order = order;
    }

    // ========================================
    // 查询
    // ========================================

    /// 按广度优先顺序遍历骨骼
    pub fn get_bones(&self) -> impl Iterator<Item = &Bone> + '_ {
        self.order.iter().map(move |&id| &self.bones[id])
    }

    /// 骨骼名（广度优先顺序）
    pub fn bone_names(&self) -> Vec<&str> {
        self.get_bones().map(|b| b.name.as_str()).collect()
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn get_bone(&self, name: &str) -> Option<&Bone> {
        self.lookup.get(name).map(|&id| &self.bones[id])
    }

    pub fn get_bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        match self.lookup.get(name) {
            Some(&id) => Some(&mut self.bones[id]),
            None => None,
        }
    }

    #[inline]
    pub fn contains_bone(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// 广度优先序号对应的骨骼
    pub fn bone_by_index(&self, index: usize) -> Option<&Bone> {
        self.order.get(index).map(|&id| &self.bones[id])
    }

    /// 根骨骼（添加顺序）
    pub fn roots(&self) -> impl Iterator<Item = &Bone> + '_ {
        self.roots.iter().map(move |&id| &self.bones[id])
    }

    pub fn parent_of(&self, bone: &Bone) -> Option<&Bone> {
        bone.parent.map(|p| &self.bones[p])
    }

    pub fn children_of<'a>(&'a self, bone: &'a Bone) -> impl Iterator<Item = &'a Bone> + 'a {
        bone.children.iter().map(move |&c| &self.bones[c])
    }

    /// 按名称查找骨骼；找不到时返回第一个把该名称列为参考骨骼的骨骼
    pub fn get_bone_by_reference(&self, reference_name: &str) -> Option<&Bone> {
        if let Some(bone) = self.get_bone(reference_name) {
            return Some(bone);
        }
        self.get_bones()
            .find(|b| b.reference_bones.iter().any(|r| r == reference_name))
    }

    /// 骨骼名 → 广度优先序号
    pub fn bone_to_index_mapping(&self) -> HashMap<String, usize> {
        self.get_bones()
            .map(|b| (b.name.clone(), b.index))
            .collect()
    }

    /// 从第一个根骨骼开始的深度优先骨骼名（BVH 关节顺序）
    pub fn joint_names(&self) -> Vec<&str> {
        let mut result = Vec::new();
        if let Some(&root) = self.roots.first() {
            self.collect_joint_names(root, &mut result);
        }
        result
    }

    fn collect_joint_names<'a>(&'a self, id: usize, result: &mut Vec<&'a str>) {
        result.push(self.bones[id].name.as_str());
        for &child in &self.bones[id].children {
            self.collect_joint_names(child, result);
        }
    }

    /// 骨骼名规范化：小写，空格和 '-' 替换为 '_'
    ///
    /// 规范化后与其他骨骼（包括尚未处理的骨骼）名称冲突的骨骼保持原名。
    pub fn canonalize_bone_names(&mut self) {
        let mut taken: HashSet<String> = self.bones.iter().map(|b| b.name.clone()).collect();
        for bone in &mut self.bones {
            let canonical = bone.name.to_lowercase().replace([' ', '-'], "_");
            if canonical == bone.name {
                continue;
            }
            if taken.contains(&canonical) {
                log::warn!(
                    "[Skeleton] 骨骼 {} 规范化后的名称 {} 已存在，保持原名",
                    bone.name,
                    canonical
                );
                continue;
            }
            taken.remove(&bone.name);
            taken.insert(canonical.clone());
            bone.name = canonical;
        }
        self.lookup = self
            .bones
            .iter()
            .map(|b| (b.name.clone(), b.id))
            .collect();
    }

    // ========================================
    // 关节与平面
    // ========================================

    pub fn joint_pos_idxs(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.joint_pos_idxs
    }

    pub fn planes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.planes
    }

    /// 设置关节对应的网格顶点
    pub fn set_joint_vertices(&mut self, joint: impl Into<String>, vertices: Vec<usize>) {
        self.joint_pos_idxs.insert(joint.into(), vertices);
    }

    /// 添加朝向平面（三个关节，逆时针绕序）
    pub fn add_plane(&mut self, name: impl Into<String>, joints: [&str; 3]) {
        self.planes
            .insert(name.into(), joints.iter().map(|j| j.to_string()).collect());
    }

    /// 关节在网格上的位置（未乘缩放）
    ///
    /// 优先使用映射的顶点索引，其次查找 `joint-<name>` 顶点组，都失败时返回原点。
    pub fn joint_position(
        &self,
        joint: &str,
        mesh: &dyn MeshGeometry,
        rest: bool,
    ) -> Result<Vec3> {
        if joint.is_empty() {
            return Err(RigError::EmptyJointName(self.name.clone()));
        }
        if let Some(indices) = self.joint_pos_idxs.get(joint) {
            if let Some(position) = mesh.centroid(indices, rest) {
                return Ok(position);
            }
            log::warn!("[Skeleton] 关节 {} 的顶点索引全部越界，尝试顶点组", joint);
        }

        let group = if joint.starts_with("joint-") {
            joint.to_string()
        } else {
            format!("joint-{}", joint)
        };
        match mesh
            .group_vertices(&group)
            .and_then(|indices| mesh.centroid(&indices, rest))
        {
            Some(position) => Ok(position),
            None => {
                log::warn!("[Skeleton] 找不到关节 {} 的位置", group);
                Ok(Vec3::ZERO)
            }
        }
    }

    /// 根据网格重新解析关节位置并重建静止矩阵
    ///
    /// 给出参考骨骼时，关节拟合到网格的当前（姿态）坐标，骨骼法线从参考骨骼复制；
    /// 否则使用静止坐标并由平面计算法线。
    pub fn update_joints(
        &mut self,
        mesh: &dyn MeshGeometry,
        reference: Option<&Skeleton>,
    ) -> Result<()> {
        let rest = reference.is_none();
        let mut positions = HashMap::new();
        for &id in &self.order {
            let bone = &self.bones[id];
            for joint in [&bone.head_joint, &bone.tail_joint] {
                if !positions.contains_key(joint) {
                    positions.insert(joint.clone(), self.joint_position(joint, mesh, rest)?);
                }
            }
        }
        self.joint_positions = positions;
        self.cache_plane_joints(mesh);
        self.apply_joint_positions();
        self.build(reference);
        Ok(())
    }

    /// 解析平面关节（静止坐标），已缓存的关节不重复计算
    pub(crate) fn cache_plane_joints(&mut self, mesh: &dyn MeshGeometry) {
        let mut missing = Vec::new();
        for (plane, joints) in &self.planes {
            for joint in joints {
                if joint.is_empty() {
                    log::warn!("[Skeleton] 平面 {} 含有空关节名", plane);
                } else if !self.joint_positions.contains_key(joint) && !missing.contains(joint) {
                    missing.push(joint.clone());
                }
            }
        }
        for joint in missing {
            if let Ok(position) = self.joint_position(&joint, mesh, true) {
                self.joint_positions.insert(joint, position);
            }
        }
    }

    /// 把缓存的关节位置（乘缩放）写入每根骨骼
    pub(crate) fn apply_joint_positions(&mut self) {
        let scale = self.scale;
        for bone in &mut self.bones {
            let head = self.joint_positions.get(&bone.head_joint).copied();
            let tail = self.joint_positions.get(&bone.tail_joint).copied();
            bone.head_pos = head.unwrap_or(Vec3::ZERO) * scale;
            bone.tail_pos = tail.unwrap_or(Vec3::ZERO) * scale;
        }
    }

    /// 单个平面的法线，平面未定义或关节未解析时返回全局向上方向
    pub fn normal_for_plane(&self, plane: &str) -> Vec3 {
        let joints = match self.planes.get(plane) {
            Some(joints) if joints.len() == 3 => joints,
            Some(joints) => {
                log::warn!("[Skeleton] 平面 {} 需要 3 个关节，实际 {}", plane, joints.len());
                return Vec3::Y;
            }
            None => {
                log::warn!("[Skeleton] 骨骼 {} 没有定义平面 {}", self.name, plane);
                return Vec3::Y;
            }
        };
        let position = |joint: &String| {
            self.joint_positions
                .get(joint)
                .map(|p| *p * self.scale)
        };
        match (position(&joints[0]), position(&joints[1]), position(&joints[2])) {
            (Some(p1), Some(p2), Some(p3)) => plane_normal(p1, p2, p3),
            _ => {
                log::warn!("[Skeleton] 平面 {} 的关节位置尚未解析 {:?}", plane, joints);
                Vec3::Y
            }
        }
    }

    /// 骨骼的朝向法线（由 roll 定义的平面计算）
    pub(crate) fn bone_normal(&self, bone: &Bone) -> Vec3 {
        match bone.roll {
            Roll::Plane(ref plane) => {
                let normal = self.normal_for_plane(plane);
                if is_near_zero(normal) {
                    Vec3::Y
                } else {
                    normal
                }
            }
            Roll::Planes(ref planes) => {
                let mut sum = Vec3::ZERO;
                let mut count = 0;
                for plane in planes {
                    let normal = self.normal_for_plane(plane);
                    if !is_near_zero(normal) {
                        sum += normal;
                        count += 1;
                    }
                }
                if count > 0 && !is_near_zero(sum) {
                    sum / count as f32
                } else {
                    Vec3::Y
                }
            }
            Roll::Angle(_) => Vec3::Y,
        }
    }

    // ========================================
    // 矩阵
    // ========================================

    #[inline]
    fn parent_rest(&self, id: usize) -> Option<Mat4> {
        self.bones[id].parent.map(|p| self.bones[p].mat_rest_global)
    }

    #[inline]
    fn parent_pose(&self, id: usize) -> Option<Mat4> {
        self.bones[id].parent.map(|p| self.bones[p].mat_pose_global)
    }

    /// 重算全部静止矩阵（广度优先）
    ///
    /// 给出参考骨骼时从参考骨骼复制法线，否则由朝向平面计算。
    pub fn build(&mut self, reference: Option<&Skeleton>) {
        let debug_log = get_config().debug_log;
        for i in 0..self.order.len() {
            let id = self.order[i];
            let normal = match reference {
                Some(reference) => copy_normal(&self.bones[id], &self.name, reference),
                None => self.bone_normal(&self.bones[id]),
            };
            let parent_rest = self.parent_rest(id);
            let parent_pose = self.parent_pose(id);
            let bone = &mut self.bones[id];
            bone.build(normal, parent_rest, parent_pose);
            if debug_log {
                log::debug!(
                    "[Skeleton] {} head={:?} tail={:?} normal={:?}",
                    bone.name,
                    bone.head_pos,
                    bone.tail_pos,
                    normal
                );
            }
        }
    }

    /// 修改 mat_pose 后刷新全部姿态矩阵（广度优先）
    pub fn update(&mut self) {
        for i in 0..self.order.len() {
            let id = self.order[i];
            let parent_pose = self.parent_pose(id);
            self.bones[id].update(parent_pose);
        }
    }

    /// 从指定骨骼开始递归刷新子树的姿态矩阵
    pub(crate) fn update_subtree(&mut self, id: usize) {
        let parent_pose = self.parent_pose(id);
        self.bones[id].update(parent_pose);
        for i in 0..self.bones[id].children.len() {
            let child = self.bones[id].children[i];
            self.update_subtree(child);
        }
    }

    // ========================================
    // 姿态
    // ========================================

    /// 当前姿态，每根骨骼一个矩阵（广度优先）
    ///
    /// 旋转以全局坐标轴表示（相对静止姿态），平移同样转到全局坐标轴。
    /// 与 set_pose 互逆：`set_pose(&get_pose())` 不改变任何骨骼的全局姿态。
    pub fn get_pose(&self) -> Vec<Mat4> {
        self.get_bones()
            .map(|bone| {
                let rest = Mat3::from_mat4(bone.mat_rest_global);
                let local = Mat3::from_mat4(bone.mat_pose);
                let mut pose = Mat4::from_mat3(rest * local * rest.transpose());
                pose.w_axis = (rest * bone.mat_pose.w_axis.truncate()).extend(1.0);
                pose
            })
            .collect()
    }

    /// 骨骼局部姿态矩阵（mat_pose 原值，广度优先）
    pub fn local_poses(&self) -> Vec<Mat4> {
        self.get_bones().map(|b| b.mat_pose).collect()
    }

    /// 设置姿态（全局坐标轴表示，广度优先），之后刷新全部姿态矩阵
    pub fn set_pose(&mut self, poses: &[Mat4]) -> Result<()> {
        self.check_pose_length(poses.len())?;
        for (i, pose) in poses.iter().enumerate() {
            let bone = &mut self.bones[self.order[i]];
            let rest = bone.mat_rest_global;
            let inv_rest = rest.inverse();
            let rotation = Mat4::from_mat3(Mat3::from_mat4(*pose));
            let mut local = inv_rest * rotation * rest;
            // 平移通常只出现在根骨骼上
            local.w_axis = (Mat3::from_mat4(inv_rest) * pose.w_axis.truncate()).extend(1.0);
            bone.mat_pose = local;
        }
        self.update();
        Ok(())
    }

    /// 设置只有旋转的姿态（不含平移）
    pub fn set_pose_rotations(&mut self, rotations: &[Mat3]) -> Result<()> {
        self.check_pose_length(rotations.len())?;
        for (i, rotation) in rotations.iter().enumerate() {
            let bone = &mut self.bones[self.order[i]];
            let rest = bone.mat_rest_global;
            let mut local = rest.inverse() * Mat4::from_mat3(*rotation) * rest;
            local.w_axis = Vec3::ZERO.extend(1.0);
            bone.mat_pose = local;
        }
        self.update();
        Ok(())
    }

    fn check_pose_length(&self, actual: usize) -> Result<()> {
        if actual != self.order.len() {
            return Err(RigError::PoseLength {
                expected: self.order.len(),
                actual,
            });
        }
        Ok(())
    }

    pub fn is_in_rest_pose(&self) -> bool {
        self.bones.iter().all(|b| b.is_in_rest_pose())
    }

    pub fn set_to_rest_pose(&mut self) {
        for bone in &mut self.bones {
            bone.reset_pose();
        }
        self.update();
    }

    /// 旋转骨骼，axis 为 0/1/2（x/y/z），角度单位为度
    ///
    /// world 为 true 时在世界空间旋转，否则在骨骼局部空间旋转。
    /// 只修改该骨骼的 mat_pose，之后需要调用 update。
    pub fn rotate_bone(&mut self, name: &str, degrees: f32, axis: usize, world: bool) -> bool {
        let Some(&id) = self.lookup.get(name) else {
            log::warn!("[Skeleton] 旋转失败，骨骼 {} 不存在", name);
            return false;
        };
        if world {
            let parent_pose = self.parent_pose(id);
            let bone = &mut self.bones[id];
            let rot = Mat3::from_axis_angle(axis_vector(axis), degrees.to_radians());
            let global = rot * Mat3::from_mat4(bone.mat_pose_global);
            set_rotation_part(&mut bone.mat_pose_global, global);
            bone.mat_pose = bone.pose_from_global(parent_pose);
        } else {
            self.bones[id].rotate_local(degrees, axis);
        }
        true
    }

    /// 由全局姿态矩阵反推的姿态矩阵
    pub fn pose_from_global(&self, name: &str) -> Option<Mat4> {
        let &id = self.lookup.get(name)?;
        Some(self.bones[id].pose_from_global(self.parent_pose(id)))
    }

    // ========================================
    // 派生骨骼
    // ========================================

    /// 缩放后的副本
    ///
    /// 复制关节表、平面与权重，骨骼法线按名称从本骨骼复制，
    /// 姿态平移按缩放比例调整。不需要网格。
    pub fn scaled(&self, scale: f32) -> Skeleton {
        let mut result = Skeleton::new(self.name.clone());
        result.version = self.version;
        result.description = self.description.clone();
        result.license = self.license.clone();
        result.tags = self.tags.clone();
        result.plane_map_strategy = self.plane_map_strategy;
        result.joint_pos_idxs = self.joint_pos_idxs.clone();
        result.planes = self.planes.clone();
        result.joint_positions = self.joint_positions.clone();
        result.vertex_weights = self.vertex_weights.clone();
        result.has_custom_weights = self.has_custom_weights;
        result.scale = scale;

        let factor = if self.scale.abs() > f32::EPSILON {
            scale / self.scale
        } else {
            scale
        };
        for bone in self.get_bones() {
            let parent = bone.parent.map(|p| self.bones[p].name.as_str());
            match result.add_bone(
                &bone.name,
                parent,
                &bone.head_joint,
                &bone.tail_joint,
                bone.roll.clone(),
                bone.reference_bones.clone(),
                bone.weight_reference_override.clone(),
            ) {
                Ok(copy) => {
                    copy.mat_pose = bone.mat_pose;
                    copy.mat_pose.w_axis = (bone.mat_pose.w_axis.truncate() * factor).extend(1.0);
                }
                Err(e) => log::warn!("[Skeleton] 复制骨骼 {} 失败: {}", bone.name, e),
            }
        }

        result.apply_joint_positions();
        result.build(Some(self));
        result
    }

    /// 以当前姿态作为静止姿态的副本
    ///
    /// 重新调用 update_joints 会撤销这个静止姿态。
    pub fn create_from_pose(&self) -> Skeleton {
        let mut result = self.clone();
        for i in 0..result.order.len() {
            let id = result.order[i];
            let pose = self.bones[id].mat_pose;
            let parent_rest = result.parent_rest(id);
            let parent_pose = result.parent_pose(id);
            result.bones[id].rotate_rest(pose, parent_rest, parent_pose);
            result.bones[id].reset_pose();
            let parent_pose = result.parent_pose(id);
            result.bones[id].update(parent_pose);
        }
        result
    }

    // ========================================
    // 导出辅助
    // ========================================

    /// 相对父骨骼的静止矩阵（目标引擎约定）
    pub fn relative_matrix(
        &self,
        name: &str,
        orientation: MeshOrientation,
        local_axis: LocalBoneAxis,
        offset: Vec3,
    ) -> Option<Mat4> {
        let bone = self.get_bone(name)?;
        let rest = bone.get_rest_matrix(orientation, local_axis, offset);
        Some(match self.parent_of(bone) {
            Some(parent) => parent.get_rest_matrix(orientation, local_axis, offset).inverse() * rest,
            None => rest,
        })
    }

    /// 静止姿态下 head 相对父骨骼 head 的偏移（根骨骼为 head 本身）
    pub fn bone_rest_offset(&self, name: &str) -> Option<Vec3> {
        let bone = self.get_bone(name)?;
        Some(match self.parent_of(bone) {
            Some(parent) => bone.head_pos - parent.head_pos,
            None => bone.head_pos,
        })
    }

    pub fn bone_rest_direction(&self, name: &str) -> Option<Vec3> {
        self.bone_rest_offset(name).map(|v| v.normalize_or_zero())
    }

    // ========================================
    // 顶点权重
    // ========================================

    /// 是否带有骨骼文件自带的权重
    #[inline]
    pub fn has_custom_vertex_weights(&self) -> bool {
        self.has_custom_weights
    }

    pub fn vertex_weights(&self) -> Option<&VertexBoneWeights> {
        self.vertex_weights.as_ref()
    }

    /// 设置顶点权重，custom 表示权重随骨骼文件提供
    pub fn set_vertex_weights(&mut self, weights: VertexBoneWeights, custom: bool) {
        self.vertex_weights = Some(weights);
        self.has_custom_weights = custom;
    }

    /// 线性混合蒙皮，返回新的顶点坐标
    pub fn skin_mesh(&self, coords: &[Vec3], weights: &VertexBoneWeights) -> Vec<Vec3> {
        crate::skinning::skin_mesh(self, coords, weights)
    }

    // ========================================
    // 调试
    // ========================================

    /// 输出骨骼结构（debug 级别）
    pub fn display(&self) {
        log::debug!("<Skeleton {}", self.name);
        for bone in self.get_bones() {
            let parent = self.parent_of(bone).map_or("-", |p| p.name.as_str());
            log::debug!(
                "  <Bone {} parent={} level={} head={:?} tail={:?} roll={:?}>",
                bone.name,
                parent,
                bone.level,
                bone.head_pos,
                bone.tail_pos,
                bone.roll
            );
        }
        log::debug!(">");
    }
}
