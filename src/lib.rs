//! 骨骼绑定引擎
//!
//! 由关节位置构建骨骼层次，计算静止/姿态矩阵，
//! 在不同结构的骨骼之间重映射朝向与顶点权重，并执行线性混合蒙皮。
//!
//! 数据流（每次 build）：
//! 网格几何 → 关节位置 → 骨骼静止矩阵 → 骨骼朝向法线 → 权重重映射 → 姿态矩阵 → 蒙皮顶点

pub mod config;
pub mod mesh;
pub mod rig_file;
pub mod skeleton;
pub mod skinning;
pub mod weights;

pub use mesh::{BaseMesh, MeshGeometry};
pub use rig_file::{load, peek_metadata, RigMetadata};
pub use skeleton::{Bone, LocalBoneAxis, MeshOrientation, PlaneMapStrategy, Roll, Skeleton};
pub use weights::{BoneWeights, VertexBoneWeights};

use thiserror::Error;

/// 引擎错误类型
#[derive(Debug, Error)]
pub enum RigError {
    #[error("skeleton {skeleton} already contains a bone named {bone}")]
    DuplicateBone { skeleton: String, bone: String },

    #[error("bone {bone} references unknown parent bone {parent}")]
    UnknownParent { bone: String, parent: String },

    #[error("rig {0} contains no resolvable bones")]
    NoBones(String),

    #[error("cannot resolve joint position: empty joint name ({0})")]
    EmptyJointName(String),

    #[error("pose has {actual} matrices, skeleton has {expected} bones")]
    PoseLength { expected: usize, actual: usize },

    #[error("invalid mesh orientation: {0}")]
    InvalidMeshOrientation(String),

    #[error("invalid local bone axis: {0}")]
    InvalidLocalBoneAxis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 引擎结果类型
pub type Result<T> = std::result::Result<T, RigError>;

#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
