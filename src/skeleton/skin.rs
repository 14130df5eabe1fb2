//! 蒙皮：关节节点列表 + 逆绑定矩阵

use glam::Mat4;

use super::{NodeFlags, NodeSet};
use crate::{Result, VrmError};

/// 蒙皮
#[derive(Clone, Debug)]
pub struct Skin {
    pub name: Option<String>,
    /// 关节节点索引
    pub joints: Vec<usize>,
    /// 逆绑定矩阵，与 joints 一一对应
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl Skin {
    /// 构建蒙皮
    ///
    /// 未提供逆绑定矩阵时按 glTF 约定全部取单位矩阵。
    pub fn new(
        index: usize,
        name: Option<String>,
        joints: Vec<usize>,
        inverse_bind_matrices: Vec<Mat4>,
    ) -> Result<Self> {
        let inverse_bind_matrices = if inverse_bind_matrices.is_empty() {
            vec![Mat4::IDENTITY; joints.len()]
        } else {
            inverse_bind_matrices
        };
        if inverse_bind_matrices.len() != joints.len() {
            return Err(VrmError::SkinMismatch {
                skin: index,
                joints: joints.len(),
                inverse_binds: inverse_bind_matrices.len(),
            });
        }
        Ok(Self {
            name,
            joints,
            inverse_bind_matrices,
        })
    }

    #[inline]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn mark_nodes(&self, nodes: &mut NodeSet) {
        for &joint in &self.joints {
            if let Some(node) = nodes.get_mut(joint) {
                node.flags.insert(NodeFlags::SKIN_JOINT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_inverse_binds() {
        let skin = Skin::new(0, None, vec![0, 1, 2], Vec::new()).unwrap();
        assert_eq!(skin.inverse_bind_matrices.len(), 3);
        assert_eq!(skin.inverse_bind_matrices[1], Mat4::IDENTITY);
    }

    #[test]
    fn test_count_mismatch() {
        let result = Skin::new(3, None, vec![0, 1], vec![Mat4::IDENTITY]);
        assert!(matches!(result, Err(VrmError::SkinMismatch { skin: 3, .. })));
    }
}
