//! 动画轨道
//!
//! - JointTrack: 按人形骨骼角色索引，附带动画侧的静止姿态（重定向用）
//! - NodeTrack: 按自由文本节点名索引，绑定时做规范化的模糊匹配

use glam::{Quat, Vec3};

use super::Sampler;
use crate::math::quat_is_finite;
use crate::skeleton::{NodeSet, NodeTransform};

/// 单次采样结果；缺失的通道为 None
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackSample {
    pub rotation: Option<Quat>,
    pub translation: Option<Vec3>,
    pub scale: Option<Vec3>,
}

/// 旋转 / 平移 / 缩放三个可选通道
#[derive(Clone, Debug, Default)]
pub struct TransformTracks {
    pub rotation: Option<Sampler<Quat>>,
    pub translation: Option<Sampler<Vec3>>,
    pub scale: Option<Sampler<Vec3>>,
}

impl TransformTracks {
    /// 采样；非有限值按缺失处理
    pub fn sample(&self, t: f32) -> TrackSample {
        TrackSample {
            rotation: self
                .rotation
                .as_ref()
                .map(|s| s.sample(t))
                .filter(|q| quat_is_finite(*q)),
            translation: self
                .translation
                .as_ref()
                .map(|s| s.sample(t))
                .filter(|v| v.is_finite()),
            scale: self.scale.as_ref().map(|s| s.sample(t)).filter(|v| v.is_finite()),
        }
    }

    pub fn end_time(&self) -> f32 {
        let r = self.rotation.as_ref().map_or(0.0, |s| s.end_time());
        let t = self.translation.as_ref().map_or(0.0, |s| s.end_time());
        let s = self.scale.as_ref().map_or(0.0, |s| s.end_time());
        r.max(t).max(s)
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_none() && self.translation.is_none() && self.scale.is_none()
    }
}

/// 人形骨骼轨道
#[derive(Clone, Debug, Default)]
pub struct JointTrack {
    pub tracks: TransformTracks,
    /// 动画源骨架中该骨骼的静止姿态
    pub rest: NodeTransform,
}

impl JointTrack {
    pub fn new(tracks: TransformTracks, rest: NodeTransform) -> Self {
        Self { tracks, rest }
    }

    #[inline]
    pub fn sample(&self, t: f32) -> TrackSample {
        self.tracks.sample(t)
    }
}

/// 非人形节点轨道（头发、饰品等）
#[derive(Clone, Debug)]
pub struct NodeTrack {
    pub name: String,
    normalized: String,
    pub tracks: TransformTracks,
}

impl NodeTrack {
    pub fn new(name: impl Into<String>, tracks: TransformTracks) -> Self {
        let name = name.into();
        let normalized = normalize_node_name(&name);
        Self { name, normalized, tracks }
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized
    }

    #[inline]
    pub fn sample(&self, t: f32) -> TrackSample {
        self.tracks.sample(t)
    }

    /// 在节点集合中查找目标
    ///
    /// 先按规范化名称精确匹配；找不到时去掉命名空间前缀（`|`、`:`、`/` 之前的部分）
    /// 再比较，且只接受唯一候选。
    pub fn resolve(&self, nodes: &NodeSet) -> Option<usize> {
        if self.normalized.is_empty() {
            return None;
        }
        let named = || nodes.nodes().iter().filter_map(|n| n.name.as_deref().map(|name| (n.index, name)));

        if let Some((idx, _)) = named().find(|(_, name)| normalize_node_name(name) == self.normalized) {
            return Some(idx);
        }

        let key = normalize_node_name(strip_namespace(&self.name));
        if key.is_empty() {
            return None;
        }
        let mut matches = named().filter(|(_, name)| normalize_node_name(strip_namespace(name)) == key);
        let first = matches.next().map(|(idx, _)| idx);
        if matches.next().is_some() {
            log::debug!("节点轨道 '{}' 匹配到多个节点，跳过", self.name);
            return None;
        }
        first
    }
}

/// 去掉命名空间 / 层次路径前缀
fn strip_namespace(name: &str) -> &str {
    name.rsplit(|c: char| matches!(c, '|' | ':' | '/')).next().unwrap_or(name)
}

/// 名称规范化：小写，去掉分隔符
pub fn normalize_node_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' ' | ':' | '|' | '/'))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes_named(names: &[&str]) -> NodeSet {
        let mut set = NodeSet::new();
        for name in names {
            set.add_node(Some(name.to_string()), NodeTransform::default());
        }
        set.finalize();
        set
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_node_name("J_Sec_Hair1-L.001"), "jsechair1l001");
        assert_eq!(normalize_node_name("Hair Front"), "hairfront");
    }

    #[test]
    fn test_resolve_exact_normalized() {
        let nodes = nodes_named(&["Root", "J_Sec_Hair_1"]);
        let track = NodeTrack::new("j-sec-hair-1", TransformTracks::default());
        assert_eq!(track.resolve(&nodes), Some(1));
    }

    #[test]
    fn test_resolve_suffix() {
        let nodes = nodes_named(&["Armature|Ribbon_L"]);
        let track = NodeTrack::new("ribbonL", TransformTracks::default());
        assert_eq!(track.resolve(&nodes), Some(0));

        let nodes = nodes_named(&["Root", "mixamorig:Tail_1"]);
        let track = NodeTrack::new("Rig|tail-1", TransformTracks::default());
        assert_eq!(track.resolve(&nodes), Some(1));
    }

    #[test]
    fn test_resolve_rejects_partial_name() {
        // 名称只是另一名称的一部分时不能绑定
        let nodes = nodes_named(&["Armature", "Hair", "L"]);
        assert_eq!(NodeTrack::new("BackHair", TransformTracks::default()).resolve(&nodes), None);
        assert_eq!(NodeTrack::new("Tail_L", TransformTracks::default()).resolve(&nodes), None);
    }

    #[test]
    fn test_resolve_ambiguous_prefix_is_skipped() {
        let nodes = nodes_named(&["Body|Ribbon", "Head|Ribbon"]);
        let track = NodeTrack::new("Ribbon", TransformTracks::default());
        assert_eq!(track.resolve(&nodes), None);
    }

    #[test]
    fn test_resolve_missing() {
        let nodes = nodes_named(&["Root"]);
        let track = NodeTrack::new("Tail", TransformTracks::default());
        assert_eq!(track.resolve(&nodes), None);
    }

    #[test]
    fn test_sample_filters_nan() {
        let tracks = TransformTracks {
            translation: Some(Sampler::constant(Vec3::new(f32::NAN, 0.0, 0.0))),
            rotation: Some(Sampler::constant(Quat::from_rotation_x(0.2))),
            scale: None,
        };
        let s = tracks.sample(0.0);
        assert!(s.translation.is_none());
        assert!(s.rotation.is_some());
        assert!(s.scale.is_none());
    }
}
