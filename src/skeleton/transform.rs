//! 骨骼朝向与坐标约定变换
//!
//! 骨骼局部坐标系：原点在 head，Y 轴沿骨骼（head → tail），
//! X 轴近似给定的法线（滚转平面），Z = X × Y（右手系）。

use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

use crate::config::get_config;
use crate::RigError;

/// Y-up → Z-up（Blender 约定）
const ZY_ROTATION: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.0, -1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);

/// Z-up → Y-up
const YZ_ROTATION: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 1.0),
);

/// Y-up 向量转换到 Z-up 坐标系
#[inline]
pub fn to_z_up(v: Vec3) -> Vec3 {
    ZY_ROTATION.transform_vector3(v)
}

/// Z-up 矩阵转换回 Y-up 坐标系
#[inline]
pub fn from_z_up(m: Mat4) -> Mat4 {
    YZ_ROTATION * m
}

/// 生成骨骼的全局静止矩阵
///
/// Y 轴 = normalize(tail - head)，Z = normalize(normal × Y)，
/// X = normalize(Y × Z)，平移 = head。
/// 输入法线通常不与骨骼方向垂直，所以要重新正交化。
///
/// 退化输入（零长度骨骼、法线与骨骼平行）不会产生 NaN：
/// 零长度骨骼使用全局 Y 方向，平行法线换成任意垂直轴。
pub fn bone_matrix(head: Vec3, tail: Vec3, normal: Vec3) -> Mat4 {
    let config = get_config();

    let direction = tail - head;
    let y_axis = if direction.length() <= config.min_bone_length {
        log::warn!("[Skeleton] 零长度骨骼 (head={:?})，使用全局 Y 方向", head);
        Vec3::Y
    } else {
        direction.normalize()
    };

    let normal = normal.normalize_or_zero();
    let mut z_axis = normal.cross(y_axis);
    if z_axis.length() <= config.zero_epsilon {
        // 法线缺失或与骨骼方向平行
        z_axis = y_axis.any_orthonormal_vector();
    }
    let z_axis = z_axis.normalize();
    let x_axis = y_axis.cross(z_axis).normalize();

    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        head.extend(1.0),
    )
}

/// 三个关节定义的三角形平面法线（逆时针绕序，右手系）
///
/// 三点退化时返回零向量，由调用方回退到默认法线。
pub fn plane_normal(p1: Vec3, p2: Vec3, p3: Vec3) -> Vec3 {
    let pvec = (p2 - p1).normalize_or_zero();
    let yvec = (p3 - p2).normalize_or_zero();
    yvec.cross(pvec).normalize_or_zero()
}

/// 向量是否近似为零
#[inline]
pub fn is_near_zero(v: Vec3) -> bool {
    v.abs().max_element() <= get_config().zero_epsilon
}

/// 由 head/tail 与滚转角生成朝向矩阵（Z-up 计算，结果转换回 Y-up）
///
/// 返回 (骨骼长度, 全局矩阵)。
pub fn matrix_from_roll(head: Vec3, tail: Vec3, roll: f32) -> (f32, Mat4) {
    let vector = to_z_up(tail - head);
    let length = vector.length();
    let vector = if length == 0.0 { Vec3::Z } else { vector / length };
    let yproj = vector.dot(Vec3::Y);

    let (axis, angle) = if yproj > 1.0 - 1e-6 {
        (Vec3::Y, 0.0)
    } else if yproj < -1.0 + 1e-6 {
        // 反向：绕垂直于 Y 的轴转半圈
        (Vec3::X, PI)
    } else {
        (Vec3::Y.cross(vector).normalize(), yproj.acos())
    };

    let mut mat = Mat4::from_axis_angle(axis, angle);
    if roll != 0.0 {
        mat = mat * Mat4::from_axis_angle(Vec3::Y, roll);
    }
    let mut mat = from_z_up(mat);
    mat.w_axis = head.extend(1.0);
    (length, mat)
}

/// 计算使骨骼局部 X 轴对齐给定法线所需的滚转角
pub fn roll_to(head: Vec3, tail: Vec3, normal: Vec3) -> f32 {
    let p1 = to_z_up(head);
    let p2 = to_z_up(tail);
    let xvec = normal;

    let pvec = (p2 - p1).normalize_or_zero();
    let xy = xvec.dot(pvec);
    let yvec = (pvec - xy * xvec).normalize_or_zero();
    let zvec = xvec.cross(yvec).normalize_or_zero();
    // 行向量 (x, y, z)
    let mat = Mat3::from_cols(xvec, yvec, zvec).transpose();

    if !is_orthogonal(mat) {
        log::warn!("[Skeleton] 计算得到的矩阵不正交: {:?}", mat);
    }
    let quat = Quat::from_mat3(&mat);
    if quat.w.abs() < 1e-4 {
        return 0.0;
    }
    let mut roll = PI - 2.0 * (quat.y / quat.w).atan();
    if roll < -PI {
        roll += 2.0 * PI;
    } else if roll > PI {
        roll -= 2.0 * PI;
    }
    roll
}

/// 3x3 矩阵是否正交（M · Mᵀ ≈ I）
pub fn is_orthogonal(mat: Mat3) -> bool {
    (mat * mat.transpose()).abs_diff_eq(Mat3::IDENTITY, 1e-5)
}

// ============================================================================
// 导出坐标约定
// ============================================================================

/// 模型朝向：哪个轴向上、模型面向哪个方向
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeshOrientation {
    #[default]
    YUpFaceZ,
    YUpFaceX,
    ZUpFaceNegY,
    ZUpFaceX,
}

impl MeshOrientation {
    fn rotation(self) -> Mat4 {
        match self {
            MeshOrientation::YUpFaceZ => Mat4::IDENTITY,
            MeshOrientation::YUpFaceX => Mat4::from_rotation_y(FRAC_PI_2),
            MeshOrientation::ZUpFaceNegY => Mat4::from_rotation_x(FRAC_PI_2),
            MeshOrientation::ZUpFaceX => {
                Mat4::from_rotation_z(FRAC_PI_2) * Mat4::from_rotation_x(FRAC_PI_2)
            }
        }
    }
}

impl FromStr for MeshOrientation {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "yUpFaceZ" => Ok(MeshOrientation::YUpFaceZ),
            "1" | "yUpFaceX" => Ok(MeshOrientation::YUpFaceX),
            "2" | "zUpFaceNegY" => Ok(MeshOrientation::ZUpFaceNegY),
            "3" | "zUpFaceX" => Ok(MeshOrientation::ZUpFaceX),
            _ => Err(RigError::InvalidMeshOrientation(s.to_string())),
        }
    }
}

impl fmt::Display for MeshOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeshOrientation::YUpFaceZ => "yUpFaceZ",
            MeshOrientation::YUpFaceX => "yUpFaceX",
            MeshOrientation::ZUpFaceNegY => "zUpFaceNegY",
            MeshOrientation::ZUpFaceX => "zUpFaceX",
        };
        f.write_str(name)
    }
}

/// 骨骼局部轴约定：哪个轴沿骨骼方向
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocalBoneAxis {
    /// Y 沿骨骼，X 为弯曲轴
    #[default]
    Y,
    /// X 沿骨骼，Y 为弯曲轴
    X,
    /// 与模型全局坐标系相同，只保留平移
    Global,
}

impl FromStr for LocalBoneAxis {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "y" => Ok(LocalBoneAxis::Y),
            "x" => Ok(LocalBoneAxis::X),
            "g" => Ok(LocalBoneAxis::Global),
            _ => Err(RigError::InvalidLocalBoneAxis(s.to_string())),
        }
    }
}

/// 将骨骼矩阵变换到目标引擎的坐标约定
pub fn transform_bone_matrix(
    mat: Mat4,
    orientation: MeshOrientation,
    local_axis: LocalBoneAxis,
    offset: Vec3,
) -> Mat4 {
    let mut mat = mat;
    mat.w_axis += offset.extend(0.0);
    let rot = orientation.rotation();

    match local_axis {
        LocalBoneAxis::Y => rot * mat,
        LocalBoneAxis::X => {
            let rot_xy = Mat4::from_rotation_x(-FRAC_PI_2) * Mat4::from_rotation_y(FRAC_PI_2);
            rot * (mat * rot_xy)
        }
        LocalBoneAxis::Global => {
            let mut tmat = Mat4::IDENTITY;
            tmat.w_axis = rot * mat.w_axis;
            tmat
        }
    }
}
