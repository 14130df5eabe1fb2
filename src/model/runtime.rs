//! VRM 运行时模型

use std::sync::Arc;

use glam::{Mat4, Vec3};

use super::{ModelDescriptor, VrmVersion};
use crate::animation::{
    AnimationClip, AnimationCompositor, AnimationContext, AnimationLayer, ClipLayer, LayerKind, PoseSnapshot,
    RestPose, SpeechState,
};
use crate::config::{self, RuntimeConfig, ValidationReport};
use crate::constraint::{synthesize_twist_constraints, ConstraintSolver};
use crate::morph::ExpressionManager;
use crate::physics::{build_chains, SpringBoneGpuBuffers, SpringBoneSimulator};
use crate::retarget::RotationRetargeter;
use crate::skeleton::{HumanoidBone, HumanoidBoneMap, NodeSet, Skin};
use crate::skinning::{validate_skin, SkinPalette};
use crate::Result;

/// VRM 运行时模型
///
/// 单帧更新顺序：
/// 1. 动画层合成（IK 读取上一帧的姿态快照）
/// 2. 合成结果写回节点局部变换，叠加根运动
/// 3. 世界变换传播
/// 4. 节点约束，再传播
/// 5. 弹簧骨骼子步（内部按子树重新传播）
/// 6. 蒙皮调色板与 Morph 权重
pub struct VrmRuntime {
    version: VrmVersion,
    config: RuntimeConfig,

    // 子系统
    nodes: NodeSet,
    humanoid: HumanoidBoneMap,
    rest: RestPose,
    compositor: AnimationCompositor,
    constraints: ConstraintSolver,
    physics: Option<SpringBoneSimulator>,
    physics_enabled: bool,
    expressions: ExpressionManager,

    // 蒙皮
    skins: Vec<Skin>,
    palettes: Vec<SkinPalette>,

    // 每帧状态
    pose: PoseSnapshot,
    time: f32,
    /// 累计根运动（叠加到层次根节点的平移上）
    root_offset: Vec3,
    /// 加载期记录的校验问题
    load_issues: Vec<String>,
}

impl VrmRuntime {
    /// 由加载器输出构建运行时
    ///
    /// 结构错误（缺少必需骨骼、索引越界、蒙皮数量不符、弹簧声明引用缺失）
    /// 直接返回错误；其余不一致按校验级别处理。
    pub fn from_descriptor(desc: &ModelDescriptor) -> Result<Self> {
        let config = config::get_config();
        let mut report = ValidationReport::new(config.validation_level);

        let mut nodes = NodeSet::build(&desc.nodes, &mut report)?;
        let humanoid = HumanoidBoneMap::new(desc.humanoid.clone(), nodes.len())?;
        humanoid.mark_nodes(&mut nodes);

        // ========== 蒙皮 ==========
        let mut skins = Vec::with_capacity(desc.skins.len());
        for (i, skin_desc) in desc.skins.iter().enumerate() {
            let skin = Skin::new(
                i,
                skin_desc.name.clone(),
                skin_desc.joints.clone(),
                skin_desc.inverse_bind_matrices.clone(),
            )?;
            validate_skin(i, &skin, &nodes, &mut report)?;
            skin.mark_nodes(&mut nodes);
            skins.push(skin);
        }
        let palettes = vec![SkinPalette::new(config.skinning_mode); skins.len()];

        // ========== 约束 ==========
        let mut constraints = desc.constraints.clone();
        if config.enable_constraint_synthesis {
            let synthesized = synthesize_twist_constraints(&humanoid, &constraints, config.synthesized_twist_weight);
            if !synthesized.is_empty() {
                log::debug!("合成 {} 条扭转约束", synthesized.len());
            }
            constraints.extend(synthesized);
        }
        let constraints = ConstraintSolver::new(constraints, &mut nodes)?;

        // ========== 弹簧骨骼 ==========
        nodes.update_world_transforms();
        let physics = if desc.spring.is_empty() {
            None
        } else {
            let chains = build_chains(&desc.spring, &mut nodes, &mut report)?;
            Some(SpringBoneSimulator::new(chains, desc.spring.colliders.clone(), &nodes))
        };

        // ========== 表情 ==========
        let morph_counts = desc.meshes.iter().map(|m| m.morph_target_count).collect();
        let mut expressions = ExpressionManager::new(morph_counts, config.max_active_morphs);
        for def in &desc.expressions {
            expressions.add_expression(def.clone(), &mut report)?;
        }

        let rest = RestPose::capture(&nodes, &humanoid);
        let pose = PoseSnapshot::capture(&nodes, &humanoid);

        log::info!(
            "VRM 模型构建完成: {:?}, {} 节点, {} 人形骨骼, {} 蒙皮, {} 约束, {} 表情, {} 弹簧链",
            desc.version,
            nodes.len(),
            humanoid.len(),
            skins.len(),
            constraints.len(),
            expressions.expression_count(),
            physics.as_ref().map(|p| p.chain_count()).unwrap_or(0)
        );

        let mut runtime = Self {
            version: desc.version,
            config,
            compositor: AnimationCompositor::new(rest.clone()),
            nodes,
            humanoid,
            rest,
            constraints,
            physics,
            physics_enabled: true,
            expressions,
            skins,
            palettes,
            pose,
            time: 0.0,
            root_offset: Vec3::ZERO,
            load_issues: report.take_issues(),
        };
        runtime.build_palettes();
        Ok(runtime)
    }

    // ========== 动画 ==========

    /// 以基础优先级播放片段；同 id 的层被替换
    pub fn play_clip(&mut self, id: &str, clip: Arc<AnimationClip>) {
        let layer = ClipLayer::bind(
            clip,
            self.rest.clone(),
            &self.nodes,
            self.version,
            RotationRetargeter::new(self.config.retarget_safety_threshold_deg),
        );
        self.compositor.add_layer(AnimationLayer::clip(id, layer));
    }

    pub fn compositor(&self) -> &AnimationCompositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut AnimationCompositor {
        &mut self.compositor
    }

    pub fn rest_pose(&self) -> &RestPose {
        &self.rest
    }

    /// 最近一次更新后的人形骨骼世界姿态
    pub fn pose(&self) -> &PoseSnapshot {
        &self.pose
    }

    // ========== 每帧更新 ==========

    /// 推进一帧
    ///
    /// 不返回错误：逐帧路径只做跳过、钳制或绕过。
    pub fn update(&mut self, delta_time: f32, speech: SpeechState) {
        let dt = if delta_time.is_finite() { delta_time.max(0.0) } else { 0.0 };
        self.time += dt;

        // 表情覆盖眨眼时暂停自动眨眼（依据上一帧的表情权重）
        let blink_blocked = self.expressions.blink_blocked();
        for layer in self.compositor.layers_mut() {
            if let LayerKind::Expression(expression) = &mut layer.kind {
                expression.set_blink_suspended(blink_blocked);
            }
        }

        let ctx = AnimationContext {
            time: self.time,
            delta_time: dt,
            speech,
            pose: Some(&self.pose),
        };
        self.compositor.update(&ctx);

        self.apply_pose();
        self.nodes.update_world_transforms();

        if !self.constraints.is_empty() {
            self.constraints.solve(&mut self.nodes);
            self.nodes.update_world_transforms();
        }

        if self.physics_enabled {
            if let Some(physics) = self.physics.as_mut() {
                physics.update(&mut self.nodes, dt);
            }
        }

        self.pose = PoseSnapshot::capture(&self.nodes, &self.humanoid);
        self.build_palettes();
        self.expressions.apply_weights(&self.compositor.output().morph_weights);
        self.expressions.update();
    }

    /// 合成结果写回节点；未被任何层触及的通道保持静止姿态
    fn apply_pose(&mut self) {
        self.nodes.reset_to_rest();
        let output = self.compositor.output();

        for (&bone, out) in &output.bones {
            let Some(node) = self.humanoid.get(bone).and_then(|idx| self.nodes.get_mut(idx)) else {
                continue;
            };
            if let Some(r) = out.rotation {
                node.set_rotation(r);
            }
            if let Some(t) = out.translation {
                node.set_translation(t);
            }
            if let Some(s) = out.scale {
                node.set_scale(s);
            }
        }
        for (&idx, out) in &output.nodes {
            let Some(node) = self.nodes.get_mut(idx) else {
                continue;
            };
            if let Some(r) = out.rotation {
                node.set_rotation(r);
            }
            if let Some(t) = out.translation {
                node.set_translation(t);
            }
            if let Some(s) = out.scale {
                node.set_scale(s);
            }
        }

        let delta = output.root_motion_delta;
        if delta.is_finite() {
            self.root_offset += delta;
        }
        if self.root_offset != Vec3::ZERO {
            let roots = self.nodes.roots().to_vec();
            for root in roots {
                if let Some(node) = self.nodes.get_mut(root) {
                    let t = node.transform.translation + self.root_offset;
                    node.set_translation(t);
                }
            }
        }
    }

    fn build_palettes(&mut self) {
        for (skin, palette) in self.skins.iter().zip(self.palettes.iter_mut()) {
            palette.build(skin, &self.nodes);
        }
    }

    // ========== 根运动 / 放置 ==========

    pub fn root_offset(&self) -> Vec3 {
        self.root_offset
    }

    /// 直接放置模型；超过瞬移距离时弹簧骨骼在下一帧自动重置
    pub fn set_root_offset(&mut self, offset: Vec3) {
        if offset.is_finite() {
            self.root_offset = offset;
        }
    }

    // ========== 物理 ==========

    pub fn physics(&self) -> Option<&SpringBoneSimulator> {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> Option<&mut SpringBoneSimulator> {
        self.physics.as_mut()
    }

    pub fn set_physics_enabled(&mut self, enabled: bool) {
        if enabled && !self.physics_enabled {
            // 关闭期间姿态可能已大幅改变
            if let Some(physics) = self.physics.as_mut() {
                physics.reset(&self.nodes);
            }
        }
        self.physics_enabled = enabled;
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn reset_physics(&mut self) {
        if let Some(physics) = self.physics.as_mut() {
            physics.reset(&self.nodes);
        }
    }

    /// 写出弹簧骨骼 GPU 缓冲区；没有弹簧骨骼时清空
    pub fn write_spring_buffers(&self, out: &mut SpringBoneGpuBuffers) {
        match self.physics.as_ref() {
            Some(physics) => physics.write_gpu_buffers(&self.nodes, out),
            None => out.clear(),
        }
    }

    // ========== 渲染输出 ==========

    pub fn version(&self) -> VrmVersion {
        self.version
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn humanoid(&self) -> &HumanoidBoneMap {
        &self.humanoid
    }

    pub fn node_for_bone(&self, bone: HumanoidBone) -> Option<usize> {
        self.humanoid.get(bone)
    }

    pub fn world_matrices(&self) -> Vec<Mat4> {
        self.nodes.world_matrices()
    }

    pub fn skin_count(&self) -> usize {
        self.skins.len()
    }

    pub fn palette(&self, skin: usize) -> Option<&SkinPalette> {
        self.palettes.get(skin)
    }

    pub fn expressions(&self) -> &ExpressionManager {
        &self.expressions
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn load_issues(&self) -> &[String] {
        &self.load_issues
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::animation::{
        AutoBlink, ClipBuilder, ExpressionLayer, ExpressionPreset, JointTrack, LipSyncLayer, Sampler, TransformTracks,
        Viseme,
    };
    use crate::config::ValidationLevel;
    use crate::constraint::NodeConstraint;
    use crate::model::{MeshDescriptor, NodeDescriptor, SkinDescriptor};
    use crate::morph::{ExpressionDef, MorphBind, OverrideMode};
    use crate::physics::{SpringDesc, SpringJointParams, SpringSource};
    use crate::skeleton::NodeTransform;
    use crate::VrmError;
    use glam::Quat;

    /// 最小人形：必需骨骼按顺序挂成一条链，末尾追加一根发束（两节）
    pub(crate) fn humanoid_descriptor() -> ModelDescriptor {
        let mut desc = ModelDescriptor::default();
        let count = HumanoidBone::REQUIRED.len();
        for (i, &bone) in HumanoidBone::REQUIRED.iter().enumerate() {
            desc.nodes.push(NodeDescriptor {
                name: Some(bone.name().to_string()),
                translation: if i == 0 { Vec3::new(0.0, 1.0, 0.0) } else { Vec3::new(0.0, 0.05, 0.0) },
                children: if i + 1 < count { vec![i + 1] } else { Vec::new() },
                ..Default::default()
            });
            desc.humanoid.insert(bone, i);
        }
        let hair = desc.nodes.len();
        desc.nodes[0].children.push(hair);
        desc.nodes.push(NodeDescriptor {
            name: Some("hair".into()),
            translation: Vec3::new(0.0, 0.2, 0.0),
            children: vec![hair + 1],
            ..Default::default()
        });
        desc.nodes.push(NodeDescriptor {
            name: Some("hair_end".into()),
            translation: Vec3::new(0.0, 0.0, 0.1),
            ..Default::default()
        });
        desc.skins.push(SkinDescriptor {
            name: None,
            joints: (0..count).collect(),
            inverse_bind_matrices: Vec::new(),
        });
        desc.meshes.push(MeshDescriptor {
            name: Some("face".into()),
            morph_target_count: 3,
        });
        desc
    }

    fn runtime(desc: &ModelDescriptor) -> VrmRuntime {
        VrmRuntime::from_descriptor(desc).unwrap()
    }

    #[test]
    fn test_missing_required_bone_rejected() {
        let mut desc = humanoid_descriptor();
        desc.humanoid.remove(&HumanoidBone::LeftFoot);
        assert!(matches!(
            VrmRuntime::from_descriptor(&desc),
            Err(VrmError::MissingRequiredBone("leftFoot"))
        ));
    }

    #[test]
    fn test_bad_constraint_rejected() {
        let mut desc = humanoid_descriptor();
        desc.constraints.push(NodeConstraint::rotation(99, 0, 1.0));
        assert!(VrmRuntime::from_descriptor(&desc).is_err());
    }

    #[test]
    fn test_clip_drives_nodes_and_palette() {
        let desc = humanoid_descriptor();
        let mut rt = runtime(&desc);
        let turn = Quat::from_rotation_y(0.6);
        let mut builder = ClipBuilder::new("turn");
        builder.add_joint_track(
            HumanoidBone::Head,
            JointTrack::new(
                TransformTracks {
                    rotation: Some(Sampler::constant(turn)),
                    ..Default::default()
                },
                NodeTransform::default(),
            ),
        );
        rt.play_clip("base", Arc::new(builder.build()));
        rt.update(1.0 / 60.0, SpeechState::default());

        let head = rt.node_for_bone(HumanoidBone::Head).unwrap();
        let local = rt.nodes().get(head).unwrap().transform.rotation;
        assert!(local.dot(turn).abs() > 0.9999);
        assert!(rt.pose().get(HumanoidBone::Head).is_some());

        // 逆绑定矩阵为单位矩阵时调色板即世界矩阵
        let palette = rt.palette(0).unwrap();
        assert_eq!(palette.joint_count(), HumanoidBone::REQUIRED.len());
        assert!(palette.matrices()[head].abs_diff_eq(rt.nodes().world_matrix(head), 1e-5));
    }

    #[test]
    fn test_untouched_bones_return_to_rest() {
        let desc = humanoid_descriptor();
        let mut rt = runtime(&desc);
        let spine = rt.node_for_bone(HumanoidBone::Spine).unwrap();
        rt.nodes.get_mut(spine).unwrap().set_rotation(Quat::from_rotation_x(1.0));
        rt.update(1.0 / 60.0, SpeechState::default());
        assert_eq!(rt.nodes().get(spine).unwrap().transform.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_expression_layers_reach_morph_weights() {
        let mut desc = humanoid_descriptor();
        let bind = |morph_index| MorphBind {
            mesh: 0,
            morph_index,
            weight: 1.0,
        };
        desc.expressions.push(ExpressionDef::new(ExpressionPreset::Aa, vec![bind(0)]));
        desc.expressions.push(ExpressionDef::new(ExpressionPreset::Blink, vec![bind(1)]));
        let mut angry = ExpressionDef::new(ExpressionPreset::Angry, vec![bind(2)]);
        angry.override_blink = OverrideMode::Block;
        desc.expressions.push(angry);

        let mut rt = runtime(&desc);
        let mut lip = LipSyncLayer::new(18.0);
        lip.set_viseme(Viseme::Aa, 0.8);
        rt.compositor_mut().add_layer(AnimationLayer::lip_sync("lip", lip));
        let mut face = ExpressionLayer::new().with_auto_blink(AutoBlink::default());
        face.set_weight(ExpressionPreset::Angry, 1.0);
        rt.compositor_mut().add_layer(AnimationLayer::expression("face", face));

        // 推进到自动眨眼峰值附近
        for _ in 0..250 {
            rt.update(1.0 / 60.0, SpeechState::default());
        }
        let weights = rt.expressions().morph_weights(0);
        assert_eq!(weights[2], 1.0);
        // angry 阻止眨眼
        assert_eq!(weights[1], 0.0);
        assert!(rt.expressions().blink_blocked());
    }

    #[test]
    fn test_spring_chain_runs_in_update() {
        let mut desc = humanoid_descriptor();
        let hair = desc.nodes.len() - 2;
        desc.spring.springs.push(SpringDesc {
            name: "hair".into(),
            source: SpringSource::Roots {
                roots: vec![hair],
                params: SpringJointParams {
                    gravity_power: 1.0,
                    ..Default::default()
                },
            },
            collider_groups: Vec::new(),
            center: None,
        });
        let mut rt = runtime(&desc);
        assert_eq!(rt.physics().unwrap().chain_count(), 1);

        rt.update(0.02, SpeechState::default());
        assert_eq!(rt.physics().unwrap().last_substeps(), 2);

        let mut buffers = SpringBoneGpuBuffers::default();
        rt.write_spring_buffers(&mut buffers);
        assert!(!buffers.params.is_empty());

        rt.set_physics_enabled(false);
        rt.update(0.02, SpeechState::default());
        assert_eq!(rt.physics().unwrap().last_substeps(), 2);
    }

    #[test]
    fn test_root_offset_moves_roots() {
        let desc = humanoid_descriptor();
        let mut rt = runtime(&desc);
        rt.set_root_offset(Vec3::new(2.0, 0.0, 0.0));
        rt.update(1.0 / 60.0, SpeechState::default());
        let hips = rt.node_for_bone(HumanoidBone::Hips).unwrap();
        assert!((rt.nodes().world_position(hips) - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_strict_validation_fails_on_bad_skin_joint() {
        let mut desc = humanoid_descriptor();
        desc.skins[0].joints.push(500);
        let rt = runtime(&desc);
        assert_eq!(rt.load_issues().len(), 1);

        config::set_config(RuntimeConfig {
            validation_level: ValidationLevel::Fail,
            ..RuntimeConfig::default()
        });
        let strict = VrmRuntime::from_descriptor(&desc);
        config::reset_config();
        assert!(matches!(strict, Err(VrmError::Validation(_))));
    }
}
