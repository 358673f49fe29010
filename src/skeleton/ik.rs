//! 单骨骼旋转约束
//!
//! 不是迭代 IK 求解器，只提供约束求解中用到的两个基本操作：
//! - stretch_to: 让骨骼指向目标点（可选拉伸）
//! - pole_target_correct: 极向目标修正，绕骨骼轴旋转使骨骼朝向极向目标
//!
//! 两者都直接修改骨骼的全局姿态矩阵，然后反推 mat_pose 并刷新子骨骼。

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

use super::bone::set_rotation_part;
use super::bone_set::Skeleton;
use super::transform::matrix_from_roll;

/// 列向量归一化后的旋转部分（去掉拉伸）
fn rotation_only(m: Mat4) -> Mat3 {
    let r = Mat3::from_mat4(m);
    Mat3::from_cols(
        r.x_axis.normalize_or_zero(),
        r.y_axis.normalize_or_zero(),
        r.z_axis.normalize_or_zero(),
    )
}

impl Skeleton {
    /// 让骨骼从当前 head 指向 goal
    ///
    /// do_stretch 为 true 时沿 Y 轴拉伸，使 tail 落在 goal 上，否则保持骨骼长度。
    /// 绕骨骼轴的滚转保持为静止姿态的滚转角。骨骼不存在时返回 false。
    pub fn stretch_to(&mut self, name: &str, goal: Vec3, do_stretch: bool) -> bool {
        let Some(&id) = self.lookup.get(name) else {
            log::warn!("[IK] 骨骼 {} 不存在", name);
            return false;
        };
        let parent_pose = self.bones[id]
            .parent
            .map(|p| self.bones[p].mat_pose_global);

        let bone = &mut self.bones[id];
        let (length, mut global) = matrix_from_roll(bone.head(), goal, 0.0);
        if do_stretch && bone.length > f32::EPSILON {
            global.y_axis *= length / bone.length;
        }
        bone.mat_pose_global = global;

        // 修正滚转：去掉姿态中绕 Y 轴的分量，换成静止滚转角
        let pose = bone.pose_from_global(parent_pose);
        let (_, ay, _) = Quat::from_mat3(&rotation_only(pose)).to_euler(EulerRot::XYZ);
        let rot = Mat3::from_rotation_y(-ay + bone.roll_angle());
        let corrected = Mat3::from_mat4(bone.mat_pose_global) * rot;
        set_rotation_part(&mut bone.mat_pose_global, corrected);

        bone.mat_pose = bone.pose_from_global(parent_pose);
        bone.update_pose_verts();
        self.update_children(id);
        true
    }

    /// 极向目标修正
    ///
    /// head → goal 为骨骼方向，把 head → pole 投影到垂直于骨骼方向的平面，
    /// 绕骨骼 Y 轴旋转使局部 Z 轴与该方向成 angle（弧度）。
    pub fn pole_target_correct(
        &mut self,
        name: &str,
        head: Vec3,
        goal: Vec3,
        pole: Vec3,
        angle: f32,
    ) -> bool {
        let Some(&id) = self.lookup.get(name) else {
            log::warn!("[IK] 骨骼 {} 不存在", name);
            return false;
        };

        let y_vec = goal - head;
        let y_len2 = y_vec.dot(y_vec);
        if y_len2 <= f32::EPSILON {
            return false;
        }
        let x_vec = pole - head;
        let x_vec = x_vec - (x_vec.dot(y_vec) / y_len2) * y_vec;
        let x_len = x_vec.length();
        if x_len <= 1e-6 {
            return false;
        }
        let x_vec = x_vec / x_len;

        let parent_pose = self.bones[id]
            .parent
            .map(|p| self.bones[p].mat_pose_global);
        let bone = &mut self.bones[id];
        let z_vec = bone.mat_pose_global.z_axis.truncate().normalize_or_zero();
        let angle0 = x_vec.dot(z_vec).clamp(-1.0, 1.0).asin();
        let rot = Mat3::from_rotation_y(angle - angle0);
        let corrected = Mat3::from_mat4(bone.mat_pose_global) * rot;
        set_rotation_part(&mut bone.mat_pose_global, corrected);

        bone.mat_pose = bone.pose_from_global(parent_pose);
        bone.update_pose_verts();
        self.update_children(id);
        true
    }

    /// 刷新指定骨骼所有子骨骼的姿态矩阵
    fn update_children(&mut self, id: usize) {
        for i in 0..self.bones[id].children.len() {
            let child = self.bones[id].children[i];
            self.update_subtree(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::skeleton::bone_set::tests::{fixture_mesh, fixture_skeleton};
    use glam::Vec3;

    const EPS: f32 = 1e-3;

    #[test]
    fn test_stretch_to_points_at_goal() {
        let mesh = fixture_mesh();
        let mut skel = fixture_skeleton(&mesh);
        let goal = Vec3::new(1.0, 1.0, 0.0);
        assert!(skel.stretch_to("chest", goal, false));

        let chest = skel.get_bone("chest").unwrap();
        let dir = (chest.tail() - chest.head()).normalize();
        assert!((dir - Vec3::X).length() < EPS);
        // 不拉伸时长度不变
        assert!(((chest.tail() - chest.head()).length() - 1.0).abs() < EPS);

        // 子骨骼跟随
        let head = skel.get_bone("head").unwrap();
        assert!((head.head() - chest.tail()).length() < EPS);
    }

    #[test]
    fn test_stretch_to_with_stretch() {
        let mesh = fixture_mesh();
        let mut skel = fixture_skeleton(&mesh);
        let goal = Vec3::new(0.0, 1.0, 3.0);
        assert!(skel.stretch_to("chest", goal, true));
        let chest = skel.get_bone("chest").unwrap();
        assert!((chest.tail() - goal).length() < EPS);
        assert!(!skel.stretch_to("missing", goal, true));
    }

    #[test]
    fn test_pole_target_correct_aligns_z() {
        let mesh = fixture_mesh();
        let mut skel = fixture_skeleton(&mesh);
        let head = Vec3::new(0.0, 1.0, 0.0);
        let goal = Vec3::new(0.0, 2.0, 0.0);
        let pole = Vec3::new(0.0, 1.5, 1.0);
        assert!(skel.pole_target_correct("chest", head, goal, pole, 0.0));

        // angle = 0：局部 Z 轴与极向方向垂直，X 轴指向极向目标
        let chest = skel.get_bone("chest").unwrap();
        let z = chest.pose_global().z_axis.truncate();
        assert!(z.dot(Vec3::Z).abs() < EPS);
        assert!((chest.pose_global().x_axis.truncate() - Vec3::Z).length() < EPS);
        // 骨骼方向不变
        assert!((chest.pose_global().y_axis.truncate() - Vec3::Y).length() < EPS);

        // 退化：极向目标在骨骼轴上
        assert!(!skel.pole_target_correct("chest", head, goal, Vec3::new(0.0, 3.0, 0.0), 0.0));
    }
}
