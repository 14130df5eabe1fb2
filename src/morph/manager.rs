//! 表情管理器

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use super::{ExpressionDef, OverrideMode};
use crate::animation::ExpressionKey;
use crate::config::ValidationReport;
use crate::Result;

/// 低于该值的权重视为未激活
const ACTIVE_EPSILON: f32 = 0.001;

/// 上传用的活动 Morph（8 字节）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ActiveMorph {
    pub index: u32,
    pub weight: f32,
}

const_assert_eq!(std::mem::size_of::<ActiveMorph>(), 8);

/// 覆盖后的组缩放系数
#[derive(Clone, Copy, Debug, PartialEq)]
struct GroupScale {
    blink: f32,
    mouth: f32,
    look_at: f32,
}

impl Default for GroupScale {
    fn default() -> Self {
        Self {
            blink: 1.0,
            mouth: 1.0,
            look_at: 1.0,
        }
    }
}

impl GroupScale {
    fn apply(scale: &mut f32, mode: OverrideMode, weight: f32) {
        match mode {
            OverrideMode::None => {}
            OverrideMode::Block => *scale = 0.0,
            OverrideMode::Blend => *scale *= 1.0 - weight,
        }
    }
}

/// 表情管理器
///
/// 每帧流程：
/// 1. `apply_weights` 写入合成器输出的表情权重
/// 2. `update` 处理二值化与覆盖规则，累计到每个网格的密集权重
/// 3. 取出 `morph_weights` / `active_morphs` 上传
pub struct ExpressionManager {
    expressions: Vec<ExpressionDef>,
    name_to_index: HashMap<String, usize>,
    /// 输入权重（每表情一个）
    weights: Vec<f32>,
    /// 覆盖处理后的有效权重
    effective: Vec<f32>,

    /// 每个网格的 Morph 目标数
    mesh_morph_counts: Vec<usize>,
    /// 每个网格的密集权重
    morph_weights: Vec<Vec<f32>>,
    /// 每个网格的活动 Morph（按权重降序，最多 max_active_morphs 个）
    active: Vec<Vec<ActiveMorph>>,
    max_active_morphs: usize,
}

impl ExpressionManager {
    pub fn new(mesh_morph_counts: Vec<usize>, max_active_morphs: usize) -> Self {
        let morph_weights = mesh_morph_counts.iter().map(|&n| vec![0.0; n]).collect();
        let active = vec![Vec::new(); mesh_morph_counts.len()];
        Self {
            expressions: Vec::new(),
            name_to_index: HashMap::new(),
            weights: Vec::new(),
            effective: Vec::new(),
            mesh_morph_counts,
            morph_weights,
            active,
            max_active_morphs,
        }
    }

    /// 添加表情
    ///
    /// 指向不存在的网格或 Morph 目标的绑定按校验级别上报后丢弃。
    /// 同名表情后者覆盖前者。
    pub fn add_expression(&mut self, mut def: ExpressionDef, report: &mut ValidationReport) -> Result<()> {
        let mut kept = Vec::with_capacity(def.binds.len());
        for bind in def.binds.drain(..) {
            let in_range = self
                .mesh_morph_counts
                .get(bind.mesh)
                .is_some_and(|&count| bind.morph_index < count);
            if in_range {
                kept.push(bind);
            } else {
                report.report(format!(
                    "表情 '{}' 绑定了不存在的 Morph 目标 (网格 {}, 索引 {})",
                    def.key.name(),
                    bind.mesh,
                    bind.morph_index
                ))?;
            }
        }
        def.binds = kept;

        let key = def.key.name().to_string();
        match self.name_to_index.get(&key) {
            Some(&index) => {
                log::debug!("表情 '{}' 重复定义，使用后者", key);
                self.expressions[index] = def;
            }
            None => {
                let index = self.expressions.len();
                self.name_to_index.insert(key, index);
                self.expressions.push(def);
                self.weights.push(0.0);
                self.effective.push(0.0);
            }
        }
        Ok(())
    }

    /// 通过名称查找表情（兼容 VRM 0.x 名称）
    pub fn find_expression(&self, name: &str) -> Option<usize> {
        let key = ExpressionKey::parse(name);
        self.name_to_index.get(key.name()).copied()
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn expression(&self, index: usize) -> Option<&ExpressionDef> {
        self.expressions.get(index)
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_morph_counts.len()
    }

    /// 设置表情权重，返回是否找到该表情
    pub fn set_weight(&mut self, name: &str, weight: f32) -> bool {
        match self.find_expression(name) {
            Some(index) => {
                self.set_weight_by_index(index, weight);
                true
            }
            None => false,
        }
    }

    pub fn set_weight_by_index(&mut self, index: usize, weight: f32) {
        if let Some(w) = self.weights.get_mut(index) {
            *w = if weight.is_finite() { weight.clamp(0.0, 1.0) } else { 0.0 };
        }
    }

    pub fn weight(&self, name: &str) -> f32 {
        self.find_expression(name)
            .and_then(|i| self.weights.get(i).copied())
            .unwrap_or(0.0)
    }

    /// 覆盖处理后的有效权重
    pub fn effective_weight(&self, name: &str) -> f32 {
        self.find_expression(name)
            .and_then(|i| self.effective.get(i).copied())
            .unwrap_or(0.0)
    }

    /// 重置所有表情权重
    pub fn reset_all_weights(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 0.0);
    }

    /// 用合成器输出替换全部表情权重；未知名称忽略
    pub fn apply_weights(&mut self, weights: &HashMap<String, f32>) {
        self.reset_all_weights();
        for (name, &weight) in weights {
            if !self.set_weight(name, weight) {
                log::trace!("未知表情 '{}'，忽略", name);
            }
        }
    }

    /// 是否有激活的表情覆盖了眨眼组（用于暂停自动眨眼）
    pub fn blink_blocked(&self) -> bool {
        self.expressions.iter().zip(&self.weights).any(|(def, &w)| {
            def.override_blink != OverrideMode::None
                && !def.key.preset().is_some_and(|p| p.is_blink())
                && Self::input_weight(def, w) > ACTIVE_EPSILON
        })
    }

    fn input_weight(def: &ExpressionDef, weight: f32) -> f32 {
        if def.is_binary {
            if weight > 0.5 { 1.0 } else { 0.0 }
        } else {
            weight
        }
    }

    // ========== 权重解析 ==========

    /// 计算有效权重并累计到每个网格的 Morph 权重
    pub fn update(&mut self) {
        let mut scale = GroupScale::default();
        for (def, &w) in self.expressions.iter().zip(&self.weights) {
            let w = Self::input_weight(def, w);
            if w <= ACTIVE_EPSILON {
                continue;
            }
            // 表情不覆盖自身所在的组
            let preset = def.key.preset();
            if !preset.is_some_and(|p| p.is_blink()) {
                GroupScale::apply(&mut scale.blink, def.override_blink, w);
            }
            if !preset.is_some_and(|p| p.is_mouth()) {
                GroupScale::apply(&mut scale.mouth, def.override_mouth, w);
            }
            if !preset.is_some_and(|p| p.is_look_at()) {
                GroupScale::apply(&mut scale.look_at, def.override_look_at, w);
            }
        }

        for (i, def) in self.expressions.iter().enumerate() {
            let mut w = Self::input_weight(def, self.weights[i]);
            if let Some(preset) = def.key.preset() {
                if preset.is_blink() {
                    w *= scale.blink;
                } else if preset.is_mouth() {
                    w *= scale.mouth;
                } else if preset.is_look_at() {
                    w *= scale.look_at;
                }
            }
            self.effective[i] = w;
        }

        for mesh in &mut self.morph_weights {
            mesh.iter_mut().for_each(|w| *w = 0.0);
        }
        for (def, &w) in self.expressions.iter().zip(&self.effective) {
            if w <= ACTIVE_EPSILON {
                continue;
            }
            for bind in &def.binds {
                if let Some(target) = self
                    .morph_weights
                    .get_mut(bind.mesh)
                    .and_then(|m| m.get_mut(bind.morph_index))
                {
                    *target += w * bind.weight;
                }
            }
        }

        for (mesh, weights) in self.morph_weights.iter_mut().enumerate() {
            let active = &mut self.active[mesh];
            active.clear();
            for (index, w) in weights.iter_mut().enumerate() {
                *w = w.clamp(0.0, 1.0);
                if *w > ACTIVE_EPSILON {
                    active.push(ActiveMorph {
                        index: index as u32,
                        weight: *w,
                    });
                }
            }
            // 稳定排序，同权重按索引
            active.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            active.truncate(self.max_active_morphs);
        }
    }

    /// 网格的密集 Morph 权重
    pub fn morph_weights(&self, mesh: usize) -> &[f32] {
        self.morph_weights.get(mesh).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 网格的活动 Morph（权重降序）
    pub fn active_morphs(&self, mesh: usize) -> &[ActiveMorph] {
        self.active.get(mesh).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_morphs_bytes(&self, mesh: usize) -> &[u8] {
        bytemuck::cast_slice(self.active_morphs(mesh))
    }

    pub fn set_max_active_morphs(&mut self, max: usize) {
        self.max_active_morphs = max;
    }
}
