//! 节点竞技场
//!
//! 所有节点由 NodeSet 持有，父子关系为索引。
//! 世界变换按父先子后的顺序自顶向下传播。

use glam::{Mat4, Quat, Vec3};

use super::{NodeTransform, SceneNode};
use crate::config::ValidationReport;
use crate::model::NodeDescriptor;
use crate::{Result, VrmError};

/// 节点集合
#[derive(Clone, Debug, Default)]
pub struct NodeSet {
    nodes: Vec<SceneNode>,
    /// 根节点
    roots: Vec<usize>,
    /// 父先子后的遍历顺序
    order: Vec<usize>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由加载器输出构建层次
    ///
    /// 一个节点被多个父节点引用时，首次引用生效，其余按校验级别处理。
    pub fn build(descriptors: &[NodeDescriptor], report: &mut ValidationReport) -> Result<Self> {
        let mut set = Self::new();
        for desc in descriptors {
            let rest = NodeTransform::new(desc.translation, desc.rotation, desc.scale).normalized();
            set.add_node(desc.name.clone(), rest);
        }

        for (parent, desc) in descriptors.iter().enumerate() {
            for &child in &desc.children {
                if !set.set_parent(child, parent)? {
                    report.report(format!(
                        "节点 {} 已有父节点 {:?}，拒绝重新挂到 {}",
                        child,
                        set.nodes[child].parent,
                        parent
                    ))?;
                }
            }
        }

        set.finalize();
        log::info!("节点层次构建完成: {} 节点, {} 根", set.len(), set.roots.len());
        Ok(set)
    }

    /// 追加节点，返回索引
    pub fn add_node(&mut self, name: Option<String>, rest: NodeTransform) -> usize {
        let index = self.nodes.len();
        self.nodes.push(SceneNode::new(index, name, rest));
        index
    }

    /// 设置父节点
    ///
    /// 首次写入生效：已有父节点时返回 `Ok(false)` 且不修改。
    /// 会形成环的父子关系返回错误。
    pub fn set_parent(&mut self, child: usize, parent: usize) -> Result<bool> {
        let count = self.nodes.len();
        if child >= count {
            return Err(VrmError::NodeIndexOutOfRange { index: child, count });
        }
        if parent >= count {
            return Err(VrmError::NodeIndexOutOfRange { index: parent, count });
        }
        if self.nodes[child].parent.is_some() {
            return Ok(false);
        }

        // parent 的祖先链中不能出现 child
        let mut cursor = Some(parent);
        while let Some(idx) = cursor {
            if idx == child {
                return Err(VrmError::HierarchyCycle(child));
            }
            cursor = self.nodes[idx].parent;
        }

        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        Ok(true)
    }

    /// 计算根节点与遍历顺序，并做一次完整传播
    pub fn finalize(&mut self) {
        self.roots = self
            .nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.index)
            .collect();

        self.order.clear();
        self.order.reserve(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            self.order.push(idx);
            for &child in self.nodes[idx].children.iter().rev() {
                stack.push(child);
            }
        }

        self.update_world_transforms();
    }

    // ========================================================================
    // 访问
    // ========================================================================

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&SceneNode> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SceneNode> {
        self.nodes.get_mut(index)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// 父先子后的遍历顺序
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .find(|n| n.name.as_deref() == Some(name))
            .map(|n| n.index)
    }

    pub fn world_matrix(&self, index: usize) -> Mat4 {
        self.nodes
            .get(index)
            .map(|n| n.world_matrix)
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn world_position(&self, index: usize) -> Vec3 {
        self.world_matrix(index).w_axis.truncate()
    }

    pub fn world_rotation(&self, index: usize) -> Quat {
        self.nodes
            .get(index)
            .map(|n| n.world_rotation())
            .unwrap_or(Quat::IDENTITY)
    }

    /// 父节点世界旋转（根节点为单位旋转）
    pub fn parent_world_rotation(&self, index: usize) -> Quat {
        match self.nodes.get(index).and_then(|n| n.parent) {
            Some(parent) => self.world_rotation(parent),
            None => Quat::IDENTITY,
        }
    }

    /// 父节点世界矩阵（根节点为单位矩阵）
    pub fn parent_world_matrix(&self, index: usize) -> Mat4 {
        match self.nodes.get(index).and_then(|n| n.parent) {
            Some(parent) => self.world_matrix(parent),
            None => Mat4::IDENTITY,
        }
    }

    /// 所有节点的世界矩阵
    pub fn world_matrices(&self) -> Vec<Mat4> {
        self.nodes.iter().map(|n| n.world_matrix).collect()
    }

    /// 从 root 开始的深度优先前序遍历（父先子后，包含 root）
    pub fn descendants_depth_first(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if root >= self.nodes.len() {
            return out;
        }
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            for &child in self.nodes[idx].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    // ========================================================================
    // 变换
    // ========================================================================

    /// 所有节点恢复静止姿态
    pub fn reset_to_rest(&mut self) {
        for node in &mut self.nodes {
            node.reset_to_rest();
        }
    }

    /// 自顶向下更新所有世界矩阵
    pub fn update_world_transforms(&mut self) {
        for i in 0..self.order.len() {
            let idx = self.order[i];
            self.update_single(idx);
        }
    }

    /// 更新 idx 及其所有后代的世界矩阵
    pub fn update_subtree(&mut self, idx: usize) {
        if idx >= self.nodes.len() {
            return;
        }
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            self.update_single(current);
            stack.extend(self.nodes[current].children.iter().copied());
        }
    }

    fn update_single(&mut self, idx: usize) {
        self.nodes[idx].compute_local_matrix();
        let parent_world = match self.nodes[idx].parent {
            Some(parent) => self.nodes[parent].world_matrix,
            None => Mat4::IDENTITY,
        };
        let world = parent_world * self.nodes[idx].local_matrix;
        // NaN 不进入世界矩阵
        self.nodes[idx].world_matrix = if world.is_finite() { world } else { parent_world };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationLevel;

    fn desc(name: &str, translation: Vec3, children: Vec<usize>) -> NodeDescriptor {
        NodeDescriptor {
            name: Some(name.to_string()),
            translation,
            children,
            ..Default::default()
        }
    }

    #[test]
    fn test_world_propagation() {
        let descs = vec![
            desc("root", Vec3::new(0.0, 1.0, 0.0), vec![1]),
            desc("child", Vec3::new(0.0, 0.5, 0.0), vec![2]),
            desc("leaf", Vec3::new(0.0, 0.25, 0.0), vec![]),
        ];
        let mut report = ValidationReport::new(ValidationLevel::Warn);
        let mut set = NodeSet::build(&descs, &mut report).unwrap();
        assert!((set.world_position(2) - Vec3::new(0.0, 1.75, 0.0)).length() < 1e-6);

        // 旋转父节点后子节点跟随
        set.get_mut(0).unwrap().set_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        set.update_world_transforms();
        let leaf = set.world_position(2);
        assert!((leaf - Vec3::new(-0.75, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_first_parent_wins() {
        let descs = vec![
            desc("a", Vec3::ZERO, vec![2]),
            desc("b", Vec3::ZERO, vec![2]),
            desc("c", Vec3::ZERO, vec![]),
        ];
        let mut report = ValidationReport::new(ValidationLevel::Warn);
        let set = NodeSet::build(&descs, &mut report).unwrap();
        assert_eq!(set.get(2).unwrap().parent, Some(0));
        assert!(set.get(1).unwrap().children.is_empty());
        assert_eq!(report.issues().len(), 1);
    }

    #[test]
    fn test_reparent_fails_in_strict_mode() {
        let descs = vec![
            desc("a", Vec3::ZERO, vec![2]),
            desc("b", Vec3::ZERO, vec![2]),
            desc("c", Vec3::ZERO, vec![]),
        ];
        let mut report = ValidationReport::new(ValidationLevel::Fail);
        assert!(NodeSet::build(&descs, &mut report).is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let descs = vec![desc("a", Vec3::ZERO, vec![1]), desc("b", Vec3::ZERO, vec![0])];
        let mut report = ValidationReport::new(ValidationLevel::Off);
        assert!(matches!(
            NodeSet::build(&descs, &mut report),
            Err(VrmError::HierarchyCycle(_))
        ));
    }

    #[test]
    fn test_order_parent_before_child() {
        let descs = vec![
            desc("leaf", Vec3::ZERO, vec![]),
            desc("root", Vec3::ZERO, vec![2]),
            desc("mid", Vec3::ZERO, vec![0]),
        ];
        let mut report = ValidationReport::new(ValidationLevel::Warn);
        let set = NodeSet::build(&descs, &mut report).unwrap();
        let pos = |i: usize| set.order().iter().position(|&x| x == i).unwrap();
        assert!(pos(1) < pos(2));
        assert!(pos(2) < pos(0));
        assert_eq!(set.descendants_depth_first(1), vec![1, 2, 0]);
    }
}
