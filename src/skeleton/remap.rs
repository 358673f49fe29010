//! 跨骨骼继承
//!
//! 自定义骨骼通过 reference_bones 指向参考骨骼（默认骨骼）中的骨骼，
//! 从参考骨骼继承朝向法线、朝向平面和顶点权重。
//!
//! 所有函数都尽力而为：无法解析的参考只输出警告并跳过，不会中断整个骨骼。

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;

use super::bone::{Bone, Roll};
use super::bone_set::{PlaneMapStrategy, Skeleton};
use super::transform::is_near_zero;
use crate::config::get_config;
use crate::mesh::MeshGeometry;
use crate::weights::{BoneWeights, VertexBoneWeights};

/// 骨骼全局静止矩阵的 X 轴（朝向法线）
#[inline]
fn rest_normal(bone: &Bone) -> Vec3 {
    bone.mat_rest_global.x_axis.truncate()
}

/// 从参考骨骼复制朝向法线
///
/// 两个骨骼同名时直接按骨骼名复制；否则使用目标骨骼的参考骨骼，
/// 多个参考骨骼的法线取平均。没有参考骨骼时按同名骨骼复制。
pub(crate) fn copy_normal(target: &Bone, target_skeleton: &str, reference: &Skeleton) -> Vec3 {
    let direct_copy = reference.name == target_skeleton;

    if !direct_copy && !target.reference_bones.is_empty() {
        if let [single] = target.reference_bones.as_slice() {
            return match reference.get_bone(single) {
                Some(rbone) => rest_normal(rbone),
                None => {
                    log::warn!(
                        "[Remap] 骨骼 {} 的参考骨骼 {} 不存在，使用默认朝向",
                        target.name,
                        single
                    );
                    Vec3::Y
                }
            };
        }

        let mut sum = Vec3::ZERO;
        let mut count = 0;
        for name in &target.reference_bones {
            match reference.get_bone(name) {
                Some(rbone) => {
                    let normal = rest_normal(rbone);
                    if !is_near_zero(normal) {
                        sum += normal;
                        count += 1;
                    }
                }
                None => log::warn!(
                    "[Remap] 骨骼 {} 的参考骨骼 {} 不存在，跳过",
                    target.name,
                    name
                ),
            }
        }
        if count > 0 && !is_near_zero(sum) {
            sum / count as f32
        } else {
            Vec3::Y
        }
    } else {
        match reference.get_bone(&target.name) {
            Some(rbone) => rest_normal(rbone),
            None => {
                log::warn!(
                    "[Remap] 骨骼 {} 没有参考骨骼，也无法按名称匹配，使用默认朝向",
                    target.name
                );
                Vec3::Y
            }
        }
    }
}

impl Skeleton {
    // ========================================
    // 朝向平面重映射
    // ========================================

    /// 从参考骨骼继承朝向平面
    ///
    /// 只处理 roll 不是单个平面名的骨骼。参考骨骼的平面连同它引用的关节
    /// 一起复制到本骨骼；与本骨骼已有关节重名的关节会被重命名（`joint_N`）。
    /// 完成后重建全部静止矩阵。
    pub fn add_reference_planes(&mut self, reference: &Skeleton, mesh: &dyn MeshGeometry) {
        let mut transferred: HashMap<String, String> = HashMap::new();
        let strategy = self.plane_map_strategy;

        for i in 0..self.order.len() {
            let id = self.order[i];
            if self.bones[id].roll.is_plane() {
                continue;
            }
            let ref_names = if self.bones[id].reference_bones.is_empty() {
                vec![self.bones[id].name.clone()]
            } else {
                self.bones[id].reference_bones.clone()
            };

            let picked = match strategy {
                PlaneMapStrategy::FirstReference => ref_names.first(),
                PlaneMapStrategy::LastReference => ref_names.last(),
                PlaneMapStrategy::Average => None,
            };

            let new_roll = match picked {
                Some(ref_name) => match reference.get_bone(ref_name) {
                    Some(rbone) => {
                        for plane in rbone.roll.plane_names() {
                            self.add_plane_from_reference(reference, plane, &mut transferred);
                        }
                        rbone.roll.clone()
                    }
                    None => {
                        log::warn!(
                            "[Remap] 骨骼 {} 的参考骨骼 {} 不存在，无法映射朝向平面",
                            self.bones[id].name,
                            ref_name
                        );
                        continue;
                    }
                },
                None => {
                    let mut planes = Vec::new();
                    for ref_name in &ref_names {
                        let Some(rbone) = reference.get_bone(ref_name) else {
                            continue;
                        };
                        for plane in rbone.roll.plane_names() {
                            self.add_plane_from_reference(reference, plane, &mut transferred);
                            planes.push(plane.to_string());
                        }
                    }
                    if planes.is_empty() {
                        log::warn!(
                            "[Remap] 骨骼 {} 的参考骨骼 {:?} 都没有可用的朝向平面",
                            self.bones[id].name,
                            ref_names
                        );
                    }
                    Roll::Planes(planes)
                }
            };
            self.bones[id].roll = new_roll;
        }

        self.cache_plane_joints(mesh);
        self.build(None);
    }

    /// 把参考骨骼的一个平面及其关节复制到本骨骼
    fn add_plane_from_reference(
        &mut self,
        reference: &Skeleton,
        plane: &str,
        transferred: &mut HashMap<String, String>,
    ) {
        let Some(ref_joints) = reference.planes.get(plane) else {
            log::warn!("[Remap] 参考骨骼 {} 没有定义平面 {}", reference.name, plane);
            return;
        };

        let mut joints = Vec::with_capacity(ref_joints.len());
        for joint in ref_joints {
            let new_joint = match transferred.get(joint) {
                Some(name) => name.clone(),
                None => {
                    let name = match reference.joint_pos_idxs.get(joint) {
                        Some(indices) => {
                            let name = if self.joint_pos_idxs.contains_key(joint) {
                                // 不覆盖本骨骼中位置可能不同的同名关节
                                let mut n = 1;
                                while self.joint_pos_idxs.contains_key(&format!("{}_{}", joint, n)) {
                                    n += 1;
                                }
                                format!("{}_{}", joint, n)
                            } else {
                                joint.clone()
                            };
                            self.joint_pos_idxs.insert(name.clone(), indices.clone());
                            // 之前可能按顶点组解析过，丢弃旧位置以便重新解析
                            self.joint_positions.remove(&name);
                            name
                        }
                        None => {
                            log::warn!(
                                "[Remap] 参考骨骼的关节 {} 没有顶点映射，按顶点组解析",
                                joint
                            );
                            joint.clone()
                        }
                    };
                    transferred.insert(joint.clone(), name.clone());
                    name
                }
            };
            joints.push(new_joint);
        }
        self.planes.insert(plane.to_string(), joints);
    }

    // ========================================
    // 顶点权重
    // ========================================

    /// 获取顶点权重
    ///
    /// 没有参考权重时返回本骨骼自带的权重。给出参考权重且本骨骼没有权重
    /// （或 force_remap）时，通过 weight_reference_bones 从参考权重重映射；
    /// 第一次重映射的结果会缓存为本骨骼的权重。
    pub fn get_vertex_weights(
        &mut self,
        reference: Option<&VertexBoneWeights>,
        force_remap: bool,
    ) -> Option<VertexBoneWeights> {
        let Some(reference) = reference else {
            return self.vertex_weights.clone();
        };
        if !force_remap {
            if let Some(ref weights) = self.vertex_weights {
                return Some(weights.clone());
            }
        }

        let warn_unweighted = get_config().warn_unweighted_bones;
        let mut data = BTreeMap::new();
        for bone in self.get_bones() {
            let mut pairs: Vec<(usize, f32)> = Vec::new();
            let refs = bone.weight_reference_bones();
            if !refs.is_empty() {
                let mut added = 0;
                for ref_name in refs {
                    match reference.get(ref_name) {
                        Some(weights) => {
                            pairs.extend(weights.iter());
                            added += 1;
                        }
                        // 参考骨骼本身没有权重，通常无害
                        None => log::debug!(
                            "[Remap] 骨骼 {} 的权重参考骨骼 {} 没有权重",
                            bone.name,
                            ref_name
                        ),
                    }
                }
                if added == 0 && warn_unweighted {
                    log::warn!(
                        "[Remap] 骨骼 {} 的权重参考骨骼都没有权重，该骨骼没有权重",
                        bone.name
                    );
                }
            } else if let Some(weights) = reference.get(&bone.name) {
                pairs.extend(weights.iter());
            } else if warn_unweighted {
                log::warn!(
                    "[Remap] 骨骼 {} 没有权重参考骨骼，也无法按名称匹配，该骨骼没有权重",
                    bone.name
                );
            }

            if !pairs.is_empty() {
                data.insert(bone.name.clone(), BoneWeights::from_pairs(pairs));
            }
        }

        let root = self.roots().next().map(|b| b.name.clone());
        let result = reference.create(data, reference.declared_vertex_count(), root.as_deref());
        if self.vertex_weights.is_none() {
            self.vertex_weights = Some(result.clone());
        }
        Some(result)
    }

    // ========================================
    // 自动权重参考
    // ========================================

    /// 自动补全权重参考骨骼
    ///
    /// 如果某根骨骼引用的参考骨骼下面有一条直到末端骨骼、且没有被本骨骼
    /// 任何骨骼引用的子骨骼链，则把这些子骨骼加入该骨骼的权重参考骨骼。
    /// 只影响没有显式设置权重参考骨骼的骨骼。
    pub fn auto_build_weight_references(&mut self, reference: &Skeleton) {
        let mut included = vec![false; self.bones.len()];
        for bone in &mut self.bones {
            if bone.weight_reference_override.is_none() {
                included[bone.id] = true;
                bone.weight_reference_override = Some(bone.reference_bones.clone());
            }
        }

        let mut reverse = self.reverse_weight_references();

        // 从子骨骼向父骨骼遍历
        for &rid in reference.order.iter().rev() {
            let rbone = &reference.bones[rid];
            let Some(referrers) = reverse.get(&rbone.name).cloned() else {
                continue;
            };
            if !has_unreferenced_tail(reference, rid, &reverse, true) {
                continue;
            }

            let extra = unreferenced_children(reference, rid, &reverse);
            for name in &referrers {
                let Some(&id) = self.lookup.get(name) else {
                    continue;
                };
                if !included[id] {
                    continue;
                }
                if let Some(ref mut refs) = self.bones[id].weight_reference_override {
                    for extra_name in &extra {
                        if !refs.contains(extra_name) {
                            refs.push(extra_name.clone());
                        }
                    }
                }
            }
            // 防止同一条子骨骼链再被其他骨骼认领
            reverse = self.reverse_weight_references();
        }
    }

    /// 参考骨骼名 → 引用它作为权重参考的骨骼名
    fn reverse_weight_references(&self) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for bone in self.get_bones() {
            for ref_name in bone.weight_reference_bones() {
                result
                    .entry(ref_name.clone())
                    .or_default()
                    .push(bone.name.clone());
            }
        }
        result
    }
}

/// 是否存在一条直到末端骨骼、都没有被引用的子骨骼链
fn has_unreferenced_tail(
    skeleton: &Skeleton,
    id: usize,
    reverse: &HashMap<String, Vec<String>>,
    first: bool,
) -> bool {
    let bone = &skeleton.bones[id];
    if !first && reverse.contains_key(&bone.name) {
        return false;
    }
    if bone.has_children() {
        bone.children
            .iter()
            .any(|&child| has_unreferenced_tail(skeleton, child, reverse, false))
    } else {
        true
    }
}

/// 所有满足 has_unreferenced_tail 的后代骨骼名（先序）
fn unreferenced_children(
    skeleton: &Skeleton,
    id: usize,
    reverse: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut descendants = Vec::new();
    collect_descendants(skeleton, id, &mut descendants);
    descendants
        .into_iter()
        .filter(|&d| has_unreferenced_tail(skeleton, d, reverse, false))
        .map(|d| skeleton.bones[d].name.clone())
        .collect()
}

fn collect_descendants(skeleton: &Skeleton, id: usize, result: &mut Vec<usize>) {
    for &child in &skeleton.bones[id].children {
        result.push(child);
        collect_descendants(skeleton, child, result);
    }
}
