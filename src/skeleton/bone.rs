//! 骨骼节点
//!
//! Bone 是骨骼系统的核心单元，表示 head 关节到 tail 关节之间的一段刚体。
//! 父子关系使用所属 Skeleton 内部的索引（arena），不持有引用。
//!
//! 矩阵约定：
//! - 静态：`mat_rest_global`（世界空间绑定矩阵）、`mat_rest_relative`（相对父骨骼）
//! - 姿态：`mat_pose`（相对父骨骼和自身静止朝向，单位阵 = 静止姿态）、
//!   `mat_pose_global`（世界空间）、`mat_pose_verts`（作用于顶点的变换）

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

use super::transform::{bone_matrix, transform_bone_matrix, LocalBoneAxis, MeshOrientation};
use crate::config::get_config;

// ============================================================================
// 滚转定义
// ============================================================================

/// 骨骼滚转（局部朝向）来源
#[derive(Clone, Debug, PartialEq)]
pub enum Roll {
    /// 固定角度（默认 0，使用全局向上方向作为法线）
    Angle(f32),
    /// 单个朝向平面
    Plane(String),
    /// 多个朝向平面，法线取平均
    Planes(Vec<String>),
}

impl Default for Roll {
    fn default() -> Self {
        Roll::Angle(0.0)
    }
}

impl Roll {
    /// 是否为单个平面名
    #[inline]
    pub fn is_plane(&self) -> bool {
        matches!(self, Roll::Plane(_))
    }

    /// 是否为默认值（0 角度或空平面列表）
    pub fn is_unset(&self) -> bool {
        match self {
            Roll::Angle(a) => *a == 0.0,
            Roll::Plane(name) => name.is_empty(),
            Roll::Planes(names) => names.is_empty(),
        }
    }

    /// 引用的所有平面名
    pub fn plane_names(&self) -> Vec<&str> {
        match self {
            Roll::Angle(_) => Vec::new(),
            Roll::Plane(name) => vec![name.as_str()],
            Roll::Planes(names) => names.iter().map(|s| s.as_str()).collect(),
        }
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    // ========================================
    // 静态数据（add_bone 后不变）
    // ========================================
    /// 骨骼名称（在所属骨骼内唯一）
    pub name: String,

    /// arena 索引
    pub(crate) id: usize,

    /// 父骨骼 arena 索引（None 表示根骨骼）
    pub(crate) parent: Option<usize>,

    /// 子骨骼 arena 索引
    pub(crate) children: Vec<usize>,

    /// 广度优先序号（重建顺序缓存时分配）
    pub(crate) index: usize,

    /// 层级深度（根为 0）
    pub(crate) level: usize,

    /// head / tail 关节名
    pub head_joint: String,
    pub tail_joint: String,

    /// 滚转定义
    pub roll: Roll,

    /// 参考骨骼（另一骨骼中用于继承朝向的骨骼名）
    pub reference_bones: Vec<String>,

    /// 权重参考骨骼，None 时沿用 reference_bones
    pub(crate) weight_reference_override: Option<Vec<String>>,

    // ========================================
    // 关节位置（每次 update_joints 后更新，已乘缩放）
    // ========================================
    pub(crate) head_pos: Vec3,
    pub(crate) tail_pos: Vec3,
    pub(crate) length: f32,

    // ========================================
    // 矩阵
    // ========================================
    pub(crate) mat_rest_global: Mat4,
    pub(crate) mat_rest_relative: Mat4,

    /// 姿态矩阵（修改后需要按广度优先顺序调用 Skeleton::update）
    pub mat_pose: Mat4,

    pub(crate) mat_pose_global: Mat4,
    pub(crate) mat_pose_verts: Mat4,
}

impl Bone {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        id: usize,
        parent: Option<usize>,
        level: usize,
        head_joint: String,
        tail_joint: String,
        roll: Roll,
        reference_bones: Vec<String>,
        weight_reference_bones: Option<Vec<String>>,
    ) -> Self {
        Self {
            name,
            id,
            parent,
            children: Vec::new(),
            index: 0,
            level,
            head_joint,
            tail_joint,
            roll,
            reference_bones: dedup_names(reference_bones),
            weight_reference_override: weight_reference_bones.map(dedup_names),
            head_pos: Vec3::ZERO,
            tail_pos: Vec3::ZERO,
            length: 0.0,
            mat_rest_global: Mat4::IDENTITY,
            mat_rest_relative: Mat4::IDENTITY,
            mat_pose: Mat4::IDENTITY,
            mat_pose_global: Mat4::IDENTITY,
            mat_pose_verts: Mat4::IDENTITY,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    /// 广度优先序号
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// 层级深度
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// 权重参考骨骼（未单独设置时等于 reference_bones）
    pub fn weight_reference_bones(&self) -> &[String] {
        match self.weight_reference_override {
            Some(ref refs) => refs,
            None => &self.reference_bones,
        }
    }

    /// 是否单独设置了权重参考骨骼
    #[inline]
    pub fn has_explicit_weight_references(&self) -> bool {
        self.weight_reference_override.is_some()
    }

    /// 设置权重参考骨骼
    pub fn set_weight_reference_bones(&mut self, refs: Vec<String>) {
        self.weight_reference_override = Some(dedup_names(refs));
    }

    #[inline]
    pub fn rest_global(&self) -> Mat4 {
        self.mat_rest_global
    }

    #[inline]
    pub fn rest_relative(&self) -> Mat4 {
        self.mat_rest_relative
    }

    #[inline]
    pub fn pose_global(&self) -> Mat4 {
        self.mat_pose_global
    }

    /// 蒙皮矩阵 = mat_pose_global * inverse(mat_rest_global)
    #[inline]
    pub fn pose_verts(&self) -> Mat4 {
        self.mat_pose_verts
    }

    /// 静止姿态 head 位置（世界空间）
    #[inline]
    pub fn rest_head(&self) -> Vec3 {
        self.head_pos
    }

    /// 静止姿态 tail 位置（世界空间）
    #[inline]
    pub fn rest_tail(&self) -> Vec3 {
        self.tail_pos
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    /// 当前姿态下的 head 位置（世界空间）
    #[inline]
    pub fn head(&self) -> Vec3 {
        self.mat_pose_global.w_axis.truncate()
    }

    /// 当前姿态下的 tail 位置（世界空间）
    #[inline]
    pub fn tail(&self) -> Vec3 {
        self.mat_pose_global.transform_point3(Vec3::new(0.0, self.length, 0.0))
    }

    /// 静止朝向四元数
    pub fn rest_orientation(&self) -> Quat {
        Quat::from_mat3(&Mat3::from_mat4(self.mat_rest_global)).normalize()
    }

    /// 静止姿态下绕 Y 轴的滚转角
    pub fn roll_angle(&self) -> f32 {
        let r = self.mat_rest_global;
        // r[0,2] - r[2,0]：列主序下为 z_axis.x - x_axis.z
        let qy = r.z_axis.x - r.x_axis.z;
        let qw = r.x_axis.x + r.y_axis.y + r.z_axis.z + 1.0;
        if qw < 1e-4 {
            std::f32::consts::PI
        } else {
            2.0 * qy.atan2(qw)
        }
    }

    // ========================================
    // 矩阵计算
    // ========================================

    /// 计算静止矩阵并刷新姿态矩阵
    ///
    /// 父骨骼的静止/姿态矩阵必须已经是最新的（广度优先顺序）。
    pub(crate) fn build(
        &mut self,
        normal: Vec3,
        parent_rest_global: Option<Mat4>,
        parent_pose_global: Option<Mat4>,
    ) {
        self.mat_rest_global = bone_matrix(self.head_pos, self.tail_pos, normal);
        self.length = (self.tail_pos - self.head_pos).length();
        self.mat_rest_relative = match parent_rest_global {
            Some(parent) => parent.inverse() * self.mat_rest_global,
            None => self.mat_rest_global,
        };
        self.update(parent_pose_global);
    }

    /// 根据父骨骼的全局姿态矩阵刷新本骨骼的姿态矩阵（不重算静止矩阵）
    pub(crate) fn update(&mut self, parent_pose_global: Option<Mat4>) {
        let local = self.mat_rest_relative * self.mat_pose;
        self.mat_pose_global = match parent_pose_global {
            Some(parent) => parent * local,
            None => local,
        };
        self.update_pose_verts();
    }

    pub(crate) fn update_pose_verts(&mut self) {
        let det = self.mat_rest_global.determinant();
        if det.abs() <= f32::EPSILON {
            log::debug!(
                "[Skeleton] 骨骼 {} 的静止矩阵不可逆 (head={:?}, tail={:?})",
                self.name,
                self.head_pos,
                self.tail_pos
            );
            return;
        }
        self.mat_pose_verts = self.mat_pose_global * self.mat_rest_global.inverse();
    }

    /// 由全局姿态矩阵反推姿态矩阵（相对父骨骼和静止朝向）
    pub(crate) fn pose_from_global(&self, parent_pose_global: Option<Mat4>) -> Mat4 {
        let inv_rest_relative = self.mat_rest_relative.inverse();
        match parent_pose_global {
            Some(parent) => inv_rest_relative * (parent.inverse() * self.mat_pose_global),
            None => inv_rest_relative * self.mat_pose_global,
        }
    }

    /// 把旋转叠加到静止朝向上，作为新的静止姿态
    pub(crate) fn rotate_rest(
        &mut self,
        rot: Mat4,
        parent_rest_global: Option<Mat4>,
        parent_pose_global: Option<Mat4>,
    ) {
        self.mat_rest_relative *= rot;
        self.mat_rest_global = match parent_rest_global {
            Some(parent) => parent * self.mat_rest_relative,
            None => self.mat_rest_relative,
        };
        self.update(parent_pose_global);
    }

    // ========================================
    // 姿态操作（修改 mat_pose，之后需要 Skeleton::update）
    // ========================================

    /// 重置为静止姿态（单位姿态矩阵）
    #[inline]
    pub fn reset_pose(&mut self) {
        self.mat_pose = Mat4::IDENTITY;
    }

    /// 姿态矩阵是否为单位阵
    pub fn is_in_rest_pose(&self) -> bool {
        self.mat_pose
            .abs_diff_eq(Mat4::IDENTITY, get_config().rest_pose_epsilon)
    }

    /// 以欧拉角设置局部旋转（静态 z-y-x 顺序，弧度），保留平移
    pub fn set_rotation(&mut self, angles: Vec3) {
        let rot = Mat3::from_quat(Quat::from_euler(EulerRot::XYZ, angles.z, angles.y, angles.x));
        set_rotation_part(&mut self.mat_pose, rot);
    }

    /// 局部旋转：(四元数, 静态 x-y-z 欧拉角，单位度)
    pub fn rotation(&self) -> (Quat, Vec3) {
        let quat = self.pose_quaternion();
        let (az, ay, ax) = quat.to_euler(EulerRot::ZYX);
        (quat, Vec3::new(ax, ay, az) * (180.0 / std::f32::consts::PI))
    }

    /// 姿态旋转四元数
    pub fn pose_quaternion(&self) -> Quat {
        Quat::from_mat3(&Mat3::from_mat4(self.mat_pose)).normalize()
    }

    /// 以四元数设置姿态（平移清零）
    pub fn set_pose_quaternion(&mut self, quat: Quat) {
        self.mat_pose = Mat4::from_quat(quat.normalize());
    }

    /// 在局部空间中绕 x/y/z 轴（0/1/2）旋转指定角度（度）
    pub fn rotate_local(&mut self, degrees: f32, axis: usize) {
        let rot = Mat3::from_axis_angle(axis_vector(axis), degrees.to_radians());
        let current = Mat3::from_mat4(self.mat_pose);
        set_rotation_part(&mut self.mat_pose, rot * current);
    }

    // ========================================
    // 导出用矩阵
    // ========================================

    /// 以目标引擎约定表示的全局静止矩阵
    pub fn get_rest_matrix(
        &self,
        orientation: MeshOrientation,
        local_axis: LocalBoneAxis,
        offset: Vec3,
    ) -> Mat4 {
        transform_bone_matrix(self.mat_rest_global, orientation, local_axis, offset)
    }

    /// 绑定矩阵，返回 (bind, bind_inverse)
    ///
    /// bind_inverse 是平移后静止矩阵的转置（行主序导出约定），bind 为其逆。
    pub fn get_bind_matrix(&self, offset: Vec3) -> (Mat4, Mat4) {
        let mut rest = self.mat_rest_global;
        rest.w_axis += offset.extend(0.0);
        let bind_inverse = rest.transpose();
        (bind_inverse.inverse(), bind_inverse)
    }
}

/// 0/1/2 → X/Y/Z 轴
pub(crate) fn axis_vector(axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    }
}

/// 替换 4x4 矩阵的旋转部分，保留平移
pub(crate) fn set_rotation_part(m: &mut Mat4, rot: Mat3) {
    m.x_axis = rot.x_axis.extend(0.0);
    m.y_axis = rot.y_axis.extend(0.0);
    m.z_axis = rot.z_axis.extend(0.0);
}

/// 去重并保持首次出现顺序
fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !result.contains(&name) {
            result.push(name);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(head: Vec3, tail: Vec3) -> Bone {
        let mut b = Bone::new(
            "b".into(),
            0,
            None,
            0,
            "h".into(),
            "t".into(),
            Roll::default(),
            vec!["x".into(), "y".into(), "x".into()],
            None,
        );
        b.head_pos = head;
        b.tail_pos = tail;
        b.build(Vec3::Y, None, None);
        b
    }

    #[test]
    fn test_weight_reference_defaults_to_reference() {
        let mut b = bone(Vec3::ZERO, Vec3::Y);
        assert_eq!(b.reference_bones, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(b.weight_reference_bones(), b.reference_bones.as_slice());
        b.set_weight_reference_bones(vec!["z".into()]);
        assert_eq!(b.weight_reference_bones(), &["z".to_string()]);
    }

    #[test]
    fn test_root_rest_relative_equals_global() {
        let b = bone(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(b.rest_relative(), b.rest_global());
        assert!((b.length() - 2.0).abs() < 1e-6);
        assert!((b.tail() - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-5);
        assert!(b.pose_verts().abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_pose_quaternion_roundtrip() {
        let mut b = bone(Vec3::ZERO, Vec3::Y);
        let q = Quat::from_rotation_z(0.4);
        b.set_pose_quaternion(q);
        assert!(b.pose_quaternion().abs_diff_eq(q, 1e-5));
        assert!(!b.is_in_rest_pose());
        b.reset_pose();
        assert!(b.is_in_rest_pose());
    }

    #[test]
    fn test_set_rotation_and_euler() {
        let mut b = bone(Vec3::ZERO, Vec3::Y);
        b.mat_pose.w_axis = Vec3::new(1.0, 2.0, 3.0).extend(1.0);
        b.set_rotation(Vec3::new(0.3, 0.0, 0.0));
        // 单轴：静态 z-y-x 的第一个角绕 Z 轴
        let (_, euler) = b.rotation();
        assert!((euler.z - 0.3f32.to_degrees()).abs() < 1e-3);
        assert_eq!(b.mat_pose.w_axis, Vec3::new(1.0, 2.0, 3.0).extend(1.0));
    }

    #[test]
    fn test_rotate_local() {
        let mut b = bone(Vec3::ZERO, Vec3::Y);
        b.rotate_local(90.0, 0);
        let y = b.mat_pose.transform_vector3(Vec3::Y);
        assert!((y - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_bind_matrix_inverse_pair() {
        let b = bone(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        let (bind, bind_inverse) = b.get_bind_matrix(Vec3::new(0.5, 0.0, 0.0));
        assert!((bind * bind_inverse).abs_diff_eq(Mat4::IDENTITY, 1e-5));
        // 转置后平移位于最后一行
        assert!((bind_inverse.row(3).truncate() - Vec3::new(0.5, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_roll_angle_identity_rest() {
        let b = bone(Vec3::ZERO, Vec3::Y);
        // Y 沿骨骼、法线为全局向上方向时退化轴由 bone_matrix 选取，角度必须有限
        assert!(b.roll_angle().is_finite());
    }
}
