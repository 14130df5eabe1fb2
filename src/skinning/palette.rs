//! 蒙皮调色板
//!
//! `joint = nodeWorld * inverseBind`，每帧在世界变换传播之后构建。

use glam::Mat4;

use super::SkinningMode;
use crate::config::ValidationReport;
use crate::math::DualQuaternion;
use crate::skeleton::{NodeSet, Skin};
use crate::Result;

/// 加载期检查关节索引；越界关节在调色板中取单位矩阵
pub fn validate_skin(skin_index: usize, skin: &Skin, nodes: &NodeSet, report: &mut ValidationReport) -> Result<()> {
    for (slot, &joint) in skin.joints.iter().enumerate() {
        if joint >= nodes.len() {
            report.report(format!(
                "蒙皮 {} 的第 {} 个关节引用了不存在的节点 {}",
                skin_index, slot, joint
            ))?;
        }
    }
    Ok(())
}

/// 单个蒙皮的调色板
#[derive(Clone, Debug, Default)]
pub struct SkinPalette {
    mode: SkinningMode,
    matrices: Vec<Mat4>,
    dual_quats: Vec<DualQuaternion>,
    /// 本帧被替换为单位矩阵的关节数
    invalid_joints: usize,
}

impl SkinPalette {
    pub fn new(mode: SkinningMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> SkinningMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SkinningMode) {
        self.mode = mode;
    }

    /// 由当前世界矩阵构建调色板
    ///
    /// 矩阵调色板总会填充（CPU 参考蒙皮使用）；
    /// 对偶四元数只在对应模式下生成。
    pub fn build(&mut self, skin: &Skin, nodes: &NodeSet) {
        self.matrices.clear();
        self.invalid_joints = 0;
        for (&joint, ibm) in skin.joints.iter().zip(&skin.inverse_bind_matrices) {
            let m = match nodes.get(joint) {
                Some(node) => node.world_matrix * *ibm,
                None => Mat4::IDENTITY,
            };
            if m.is_finite() {
                self.matrices.push(m);
            } else {
                self.invalid_joints += 1;
                self.matrices.push(Mat4::IDENTITY);
            }
        }
        if self.invalid_joints > 0 {
            log::debug!("调色板: {} 个关节矩阵非有限，已替换为单位矩阵", self.invalid_joints);
        }

        self.dual_quats.clear();
        if self.mode == SkinningMode::DualQuaternion {
            self.dual_quats
                .extend(self.matrices.iter().map(DualQuaternion::from_mat4));
        }
    }

    pub fn joint_count(&self) -> usize {
        self.matrices.len()
    }

    pub fn invalid_joints(&self) -> usize {
        self.invalid_joints
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub fn dual_quaternions(&self) -> &[DualQuaternion] {
        &self.dual_quats
    }

    /// 按当前模式上传的字节
    pub fn as_bytes(&self) -> &[u8] {
        match self.mode {
            SkinningMode::Linear => bytemuck::cast_slice(&self.matrices),
            SkinningMode::DualQuaternion => bytemuck::cast_slice(&self.dual_quats),
        }
    }
}
