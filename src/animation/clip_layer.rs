//! 基础片段播放层
//!
//! 采样片段 → 坐标约定转换 → 静止姿态增量重定向 → 输出局部变换。
//! 目标模型缺少的骨骼直接跳过。

use std::sync::Arc;

use glam::{Quat, Vec3};

use super::{AnimationClip, AnimationContext, BoneOutput, LayerOutput, RestPose};
use crate::model::VrmVersion;
use crate::retarget::{CoordinateConverter, RootMotion, RootMotionFrame, RootMotionMode, RotationRetargeter};
use crate::skeleton::{HumanoidBone, NodeSet};

/// 基础片段层
#[derive(Clone, Debug)]
pub struct ClipLayer {
    clip: Arc<AnimationClip>,
    rest: RestPose,
    converter: CoordinateConverter,
    retargeter: RotationRetargeter,
    /// (节点索引, 节点轨道索引)
    node_bindings: Vec<(usize, usize)>,

    // ========== 播放状态 ==========
    /// 未回绕的播放时间
    time: f32,
    pub speed: f32,
    pub looping: bool,
    pub playing: bool,

    // ========== 根运动 ==========
    root_motion: Option<RootMotion>,
    root_frame: Option<RootMotionFrame>,
}

impl ClipLayer {
    /// 绑定片段到目标模型
    ///
    /// 节点轨道按名称解析一次；找不到目标的轨道被丢弃。
    pub fn bind(
        clip: Arc<AnimationClip>,
        rest: RestPose,
        nodes: &NodeSet,
        target_version: VrmVersion,
        retargeter: RotationRetargeter,
    ) -> Self {
        let node_bindings: Vec<(usize, usize)> = clip
            .node_tracks()
            .iter()
            .enumerate()
            .filter_map(|(track_idx, track)| track.resolve(nodes).map(|node| (node, track_idx)))
            .collect();
        if node_bindings.len() < clip.node_tracks().len() {
            log::debug!(
                "片段 '{}': {} / {} 节点轨道找到目标",
                clip.name(),
                node_bindings.len(),
                clip.node_tracks().len()
            );
        }

        let converter = CoordinateConverter::new(clip.convention(), target_version);
        Self {
            clip,
            rest,
            converter,
            retargeter,
            node_bindings,
            time: 0.0,
            speed: 1.0,
            looping: true,
            playing: true,
            root_motion: None,
            root_frame: None,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// 设置根运动模式；片段没有髋部平移时无效果
    pub fn set_root_motion(&mut self, mode: RootMotionMode) {
        let duration = self.clip.duration();
        let start = self.hips_translation(0.0);
        let end = self.hips_translation(duration);
        self.root_motion = match (start, end) {
            (Some(start), Some(end)) => Some(RootMotion::new(mode, start, end)),
            _ => None,
        };
        // 播放中途开启时以当前帧为基准
        if self.time > 0.0 {
            if let Some(rm) = &mut self.root_motion {
                rm.reset();
            }
        }
        self.root_frame = None;
    }

    pub fn root_motion(&self) -> Option<&RootMotion> {
        self.root_motion.as_ref()
    }

    /// 跳转到指定时间
    pub fn seek(&mut self, time: f32) {
        self.time = time.max(0.0);
        if let Some(rm) = &mut self.root_motion {
            rm.reset();
        }
        self.root_frame = None;
    }

    /// (圈内时间, 已完成圈数)
    pub fn local_time(&self) -> (f32, u32) {
        let duration = self.clip.duration();
        if duration <= 0.0 {
            return (0.0, 0);
        }
        if !self.looping {
            return (self.time.min(duration), 0);
        }
        let loops = (self.time / duration).floor();
        let local = self.time - loops * duration;
        (local.clamp(0.0, duration), loops.max(0.0) as u32)
    }

    pub fn affected_bones(&self) -> Vec<HumanoidBone> {
        self.clip
            .joints()
            .map(|(bone, _)| bone)
            .filter(|bone| self.rest.get(*bone).is_some())
            .collect()
    }

    pub fn update(&mut self, ctx: &AnimationContext) {
        if self.playing && ctx.delta_time.is_finite() {
            self.time = (self.time + ctx.delta_time * self.speed).max(0.0);
        }

        let (local, loops) = self.local_time();
        let hips = self.hips_translation(local);
        self.root_frame = match (&mut self.root_motion, hips) {
            (Some(rm), Some(sampled)) => Some(rm.process(sampled, loops)),
            _ => None,
        };
    }

    pub fn evaluate(&self, _ctx: &AnimationContext) -> LayerOutput {
        let (t, _) = self.local_time();
        let mut output = LayerOutput::default();

        for (bone, track) in self.clip.joints() {
            let Some(model_rest) = self.rest.get(bone) else {
                continue;
            };
            let sample = track.sample(t);
            let mut out = BoneOutput::default();

            if let Some(rotation) = sample.rotation {
                let animation_rest = self.converter.convert_rotation(bone, track.rest.rotation);
                let animation_rotation = self.converter.convert_rotation(bone, rotation);
                let mut result =
                    self.retargeter
                        .retarget_rotation(animation_rest, model_rest.rotation, animation_rotation);
                if bone == HumanoidBone::Hips {
                    result = self.converter.compose_with_container(result);
                }
                out.rotation = Some(result);
            }

            if bone == HumanoidBone::Hips && sample.translation.is_some() {
                out.translation = match self.root_frame {
                    Some(frame) => Some(frame.bone_translation),
                    None => self.hips_translation(t),
                };
            }

            if let Some(scale) = sample.scale {
                out.scale = Some(scale);
            }

            if !out.is_empty() {
                output.bones.insert(bone, out);
            }
        }

        for &(node, track_idx) in &self.node_bindings {
            let sample = self.clip.node_tracks()[track_idx].sample(t);
            let out = BoneOutput {
                rotation: sample.rotation.map(|q| self.converter.convert_node_rotation(q)),
                translation: sample.translation.map(|v| self.converter.convert_translation(v)),
                scale: sample.scale,
            };
            if !out.is_empty() {
                output.nodes.insert(node, out);
            }
        }

        for (name, sampler) in self.clip.morph_tracks() {
            if let Some(w) = sanitize(sampler.sample(t)) {
                output.morph_weights.insert(name.to_string(), w);
            }
        }
        for (key, sampler) in self.clip.expression_tracks() {
            if let Some(w) = sanitize(sampler.sample(t)) {
                output.morph_weights.insert(key.name().to_string(), w);
            }
        }

        if let Some(frame) = self.root_frame {
            output.root_motion_delta = frame.character_delta;
        }
        output
    }

    /// 重定向后的髋部平移
    fn hips_translation(&self, t: f32) -> Option<Vec3> {
        let track = self.clip.joint(HumanoidBone::Hips)?;
        let model_rest = self.rest.get(HumanoidBone::Hips)?;
        let sampled = track.sample(t).translation?;
        let container = self.converter.container_rotation();
        let animation_rest = container * self.converter.convert_translation(track.rest.translation);
        let animation = container * self.converter.convert_translation(sampled);
        Some(
            self.retargeter
                .retarget_translation(animation_rest, model_rest.translation, animation),
        )
    }
}

#[inline]
fn sanitize(w: f32) -> Option<f32> {
    w.is_finite().then(|| w.clamp(0.0, 1.0))
}

/// 当前片段中某骨骼的重定向旋转（测试与调试用）
pub fn retargeted_rotation(layer: &ClipLayer, bone: HumanoidBone) -> Option<Quat> {
    layer
        .evaluate(&AnimationContext::default())
        .bones
        .get(&bone)
        .and_then(|b| b.rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{ClipBuilder, JointTrack, Sampler, TransformTracks};
    use crate::math::angle_between_deg;
    use crate::retarget::AnimationConvention;
    use crate::skeleton::NodeTransform;
    use std::collections::HashMap;

    fn rest_pose() -> RestPose {
        let mut bones = HashMap::new();
        bones.insert(
            HumanoidBone::Hips,
            NodeTransform::new(Vec3::new(0.0, 0.8, 0.0), Quat::IDENTITY, Vec3::ONE),
        );
        bones.insert(HumanoidBone::Head, NodeTransform::default());
        RestPose { bones }
    }

    fn walking_clip() -> Arc<AnimationClip> {
        let mut builder = ClipBuilder::new("walk").convention(AnimationConvention::Vrm(VrmVersion::V1));
        builder.add_joint_track(
            HumanoidBone::Hips,
            JointTrack::new(
                TransformTracks {
                    translation: Sampler::linear(
                        vec![0.0, 1.0],
                        vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 1.0)],
                    ),
                    ..Default::default()
                },
                NodeTransform::new(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
            ),
        );
        builder.add_joint_track(
            HumanoidBone::Head,
            JointTrack::new(
                TransformTracks {
                    rotation: Sampler::linear(
                        vec![0.0, 1.0],
                        vec![Quat::IDENTITY, Quat::from_rotation_y(1.0)],
                    ),
                    ..Default::default()
                },
                NodeTransform::default(),
            ),
        );
        // 模型里没有的骨骼
        builder.add_joint_track(
            HumanoidBone::LeftThumbDistal,
            JointTrack::new(
                TransformTracks {
                    rotation: Some(Sampler::constant(Quat::from_rotation_x(1.0))),
                    ..Default::default()
                },
                NodeTransform::default(),
            ),
        );
        Arc::new(builder.build())
    }

    fn layer() -> ClipLayer {
        ClipLayer::bind(
            walking_clip(),
            rest_pose(),
            &NodeSet::new(),
            VrmVersion::V1,
            RotationRetargeter::default(),
        )
    }

    #[test]
    fn test_missing_bone_skipped() {
        let layer = layer();
        let out = layer.evaluate(&AnimationContext::default());
        assert!(!out.bones.contains_key(&HumanoidBone::LeftThumbDistal));
        assert!(out.bones.contains_key(&HumanoidBone::Head));
    }

    #[test]
    fn test_playback_and_hip_scaling() {
        let mut layer = layer();
        let ctx = AnimationContext {
            delta_time: 0.5,
            ..Default::default()
        };
        layer.update(&ctx);
        let out = layer.evaluate(&ctx);
        let head = out.bones[&HumanoidBone::Head].rotation.unwrap();
        assert!((angle_between_deg(head, Quat::IDENTITY) - 0.5f32.to_degrees()).abs() < 0.05);
        // 髋高 1.0 → 0.8，位移同比例缩放
        let hips = out.bones[&HumanoidBone::Hips].translation.unwrap();
        assert!((hips - Vec3::new(0.0, 0.8, 0.4)).length() < 1e-4);
    }

    #[test]
    fn test_root_motion_extract() {
        let mut layer = layer();
        layer.set_root_motion(RootMotionMode::Extract);
        let ctx = AnimationContext {
            delta_time: 0.25,
            ..Default::default()
        };
        let mut total = Vec3::ZERO;
        for _ in 0..8 {
            layer.update(&ctx);
            let out = layer.evaluate(&ctx);
            total += out.root_motion_delta;
            // 髋骨留在原地
            let hips = out.bones[&HumanoidBone::Hips].translation.unwrap();
            assert!(hips.z.abs() < 1e-5);
        }
        // 两秒两圈，每圈 0.8
        assert!((total.z - 1.6).abs() < 1e-3, "total={:?}", total);
    }

    #[test]
    fn test_non_looping_clamps() {
        let mut layer = layer();
        layer.looping = false;
        layer.seek(5.0);
        assert_eq!(layer.local_time(), (1.0, 0));
        let head = retargeted_rotation(&layer, HumanoidBone::Head).unwrap();
        assert!(head.dot(Quat::from_rotation_y(1.0)).abs() > 0.9999);
    }
}
