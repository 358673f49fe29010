//! 骨骼引擎配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 这里只放数值容差与日志开关，不保存任何网格/角色状态。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 骨骼配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct RigConfig {
    // ========== 数值容差 ==========
    /// 近零判定阈值（法线、平均值），默认 1e-5
    pub zero_epsilon: f32,
    /// 退化骨骼长度阈值（head == tail），默认 1e-6
    pub min_bone_length: f32,
    /// 静止姿态判定阈值（pose 矩阵与单位阵的差），默认 1e-5
    pub rest_pose_epsilon: f32,

    // ========== 重映射 ==========
    /// 骨骼文件未指定时使用的平面映射策略（1/2/3），默认 3
    pub default_plane_map_strategy: u8,

    // ========== 调试 ==========
    /// 骨骼得不到任何权重时是否输出警告，默认 true
    /// 部分结构骨骼（pentograph）本来就没有蒙皮权重
    pub warn_unweighted_bones: bool,
    /// 是否在 build 时逐骨骼输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            // ====== 数值容差 ======
            zero_epsilon: 1e-5,
            min_bone_length: 1e-6,
            rest_pose_epsilon: 1e-5,

            // ====== 重映射 ======
            // 3 = 对所有参考骨骼的平面法线取平均
            default_plane_map_strategy: 3,

            // ====== 调试 ======
            warn_unweighted_bones: true,
            debug_log: false,
        }
    }
}

/// 全局配置实例
static RIG_CONFIG: Lazy<RwLock<RigConfig>> = Lazy::new(|| RwLock::new(RigConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> RigConfig {
    RIG_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: RigConfig) {
    *RIG_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *RIG_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = RigConfig::default();
}
