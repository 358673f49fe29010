//! 线性混合蒙皮
//!
//! 每个顶点的结果 = Σ 权重 × (骨骼 mat_pose_verts × 静止坐标)。
//! 权重不做归一化：权重和不为 1 的顶点会被相应缩放，保证权重和为 1 是调用方的责任。

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use crate::skeleton::Skeleton;
use crate::weights::VertexBoneWeights;

/// 单个顶点的骨骼影响（矩阵索引, 权重）
type Influences = Vec<(usize, f32)>;

/// 把按骨骼组织的权重转成按顶点组织的影响列表
///
/// 骨骼中不存在的骨骼名和越界的顶点索引被跳过并输出警告。
fn vertex_influences(
    skeleton: &Skeleton,
    vertex_count: usize,
    weights: &VertexBoneWeights,
) -> (Vec<Mat4>, Vec<Influences>) {
    let mut matrices = Vec::with_capacity(weights.len());
    let mut influences: Vec<Influences> = vec![Vec::new(); vertex_count];
    let mut out_of_range = 0usize;

    for (bone_name, bone_weights) in weights.iter() {
        let Some(bone) = skeleton.get_bone(bone_name) else {
            log::warn!("[Skinning] 骨骼 {} 不存在，跳过其蒙皮权重", bone_name);
            continue;
        };
        let matrix_index = matrices.len();
        matrices.push(bone.pose_verts());
        for (vertex, weight) in bone_weights.iter() {
            match influences.get_mut(vertex) {
                Some(list) => list.push((matrix_index, weight)),
                None => out_of_range += 1,
            }
        }
    }

    if out_of_range > 0 {
        log::warn!(
            "[Skinning] {} 个权重的顶点索引超出网格顶点数 {}，已跳过",
            out_of_range,
            vertex_count
        );
    }
    (matrices, influences)
}

/// 对顶点坐标做线性混合蒙皮，返回新的坐标（输入不变）
///
/// 没有任何骨骼影响的顶点结果为原点。
pub fn skin_mesh(skeleton: &Skeleton, coords: &[Vec3], weights: &VertexBoneWeights) -> Vec<Vec3> {
    let (matrices, influences) = vertex_influences(skeleton, coords.len(), weights);

    coords
        .par_iter()
        .zip(influences.par_iter())
        .map(|(coord, list)| {
            list.iter().fold(Vec3::ZERO, |acc, &(m, w)| {
                acc + matrices[m].transform_point3(*coord) * w
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Roll;
    use crate::weights::BoneWeights;
    use crate::BaseMesh;
    use std::collections::BTreeMap;

    const EPS: f32 = 1e-4;

    fn two_bone_rig() -> (BaseMesh, Skeleton) {
        let mesh = BaseMesh::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ]);
        let mut skel = Skeleton::new("skin");
        skel.set_joint_vertices("a", vec![0]);
        skel.set_joint_vertices("b", vec![1]);
        skel.set_joint_vertices("c", vec![2]);
        skel.add_bone("lower", None, "a", "b", Roll::default(), vec![], None)
            .unwrap();
        skel.add_bone("upper", Some("lower"), "b", "c", Roll::default(), vec![], None)
            .unwrap();
        skel.update_joints(&mesh, None).unwrap();
        (mesh, skel)
    }

    fn weights(entries: &[(&str, Vec<usize>, Vec<f32>)]) -> VertexBoneWeights {
        let data: BTreeMap<String, BoneWeights> = entries
            .iter()
            .map(|(name, v, w)| (name.to_string(), BoneWeights::new(v.clone(), w.clone())))
            .collect();
        VertexBoneWeights::new(data, None, None)
    }

    #[test]
    fn test_rest_pose_is_identity() {
        let (mesh, skel) = two_bone_rig();
        let w = weights(&[("lower", vec![0, 1], vec![1.0, 0.5]), ("upper", vec![1, 2], vec![0.5, 1.0])]);
        let skinned = skel.skin_mesh(&mesh.rest_coords, &w);
        for (a, b) in skinned.iter().zip(&mesh.rest_coords) {
            assert!((*a - *b).length() < EPS);
        }
    }

    #[test]
    fn test_posed_translation() {
        let (mesh, mut skel) = two_bone_rig();
        let mut pose = vec![Mat4::IDENTITY; 2];
        pose[0] = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        skel.set_pose(&pose).unwrap();

        let w = weights(&[("lower", vec![0], vec![1.0]), ("upper", vec![2], vec![1.0])]);
        let skinned = skin_mesh(&skel, &mesh.rest_coords, &w);
        // 根骨骼平移，子骨骼跟随
        assert!((skinned[0] - Vec3::new(1.0, 0.0, 0.0)).length() < EPS);
        assert!((skinned[2] - Vec3::new(1.0, 2.0, 0.0)).length() < EPS);
        // 没有权重的顶点留在原点
        assert_eq!(skinned[1], Vec3::ZERO);
    }

    #[test]
    fn test_weights_not_normalized() {
        let (mesh, skel) = two_bone_rig();
        // 顶点 2 的权重和为 1.5，结果被放大
        let w = weights(&[("lower", vec![2], vec![0.75]), ("upper", vec![2], vec![0.75])]);
        let skinned = skel.skin_mesh(&mesh.rest_coords, &w);
        assert!((skinned[2] - Vec3::new(0.0, 3.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_unknown_bone_and_out_of_range_skipped() {
        crate::init_test_logger();
        let (mesh, skel) = two_bone_rig();
        let w = weights(&[("ghost", vec![0], vec![1.0]), ("lower", vec![0, 99], vec![1.0, 1.0])]);
        let skinned = skel.skin_mesh(&mesh.rest_coords, &w);
        assert_eq!(skinned.len(), 3);
        assert!((skinned[0] - Vec3::ZERO).length() < EPS);
    }
}
