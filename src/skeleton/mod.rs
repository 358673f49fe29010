//! 骨骼系统
//!
//! 核心设计思想：
//! - Bone: 单个骨骼节点，保存静止/姿态矩阵
//! - Skeleton: 骨骼容器（arena），管理层次结构与广度优先顺序
//! - remap: 从参考骨骼继承朝向平面与顶点权重
//! - ik: 单骨骼的旋转约束（拉伸、极向目标）

pub mod transform;

mod bone;
mod bone_set;
mod ik;
mod remap;

pub use bone::{Bone, Roll};
pub use bone_set::{PlaneMapStrategy, Skeleton};
pub use transform::{LocalBoneAxis, MeshOrientation};
