//! 理论选择器
//!
//! 为每个已注册理论计算适配度，过滤不合格理论，按适配度排序后选出有界数量的理论，
//! 并给出执行顺序。选择永不失败：最差情况下只剩兜底理论加补充信息提示。

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tj_core::{clamp_unit, question_features, BirthTimeCertainty, Field, UserInput};
use tj_theory::{mbti_index, SpeedTier, Theory, TheoryDescriptor, TheoryRegistry};

use crate::config::SelectorConfig;

/// 未提供或无法识别 MBTI 时的中性匹配度
pub const NEUTRAL_MBTI_MATCH: f64 = 0.7;

/// 单个理论的评分明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TheoryScore {
    pub name: String,
    /// 注册序号
    pub position: usize,
    pub priority: SpeedTier,
    pub fitness: f64,
    /// 必需字段覆盖率
    pub completeness: f64,
    pub bonus: f64,
    pub question_match: f64,
    pub mbti_match: f64,
    pub eligible: bool,
    pub is_fallback: bool,
    pub missing_required: Vec<Field>,
}

/// 选中的理论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedTheory {
    pub name: String,
    pub fitness: f64,
    pub priority: SpeedTier,
    pub completeness: f64,
    /// 选中理由
    pub reason: String,
}

/// 选择结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// 按适配度降序
    pub selected: Vec<SelectedTheory>,
    /// 合格理论不足时，建议用户补充的字段 (按缺失频次降序)
    pub missing_info: Option<Vec<Field>>,
}

impl Selection {
    pub fn names(&self) -> Vec<String> {
        self.selected.iter().map(|s| s.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selected.iter().any(|s| s.name == name)
    }
}

/// 问题类别特征向量与理论擅长向量的余弦相似度
pub fn calculate_question_matching(question_type: &str, theory: &TheoryDescriptor) -> f64 {
    let features = question_features(question_type);
    let dot: f64 = features
        .iter()
        .zip(theory.strengths.iter())
        .map(|(a, b)| a * b)
        .sum();
    let norm_a = features.iter().map(|a| a * a).sum::<f64>().sqrt();
    let norm_b = theory.strengths.iter().map(|b| b * b).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    clamp_unit(dot / (norm_a * norm_b))
}

/// MBTI 接受度，未提供或无法识别时为中性值
pub fn calculate_mbti_matching(mbti: Option<&str>, theory: &TheoryDescriptor) -> f64 {
    mbti.and_then(mbti_index)
        .map(|i| clamp_unit(theory.mbti_affinity[i]))
        .unwrap_or(NEUTRAL_MBTI_MATCH)
}

/// 理论选择器
#[derive(Debug, Clone)]
pub struct TheorySelector {
    registry: Arc<TheoryRegistry>,
    config: SelectorConfig,
}

impl TheorySelector {
    pub fn new(registry: Arc<TheoryRegistry>, config: SelectorConfig) -> Self {
        Self { registry, config }
    }

    /// 内置理论 + 默认配置
    pub fn default_selector() -> Self {
        Self::new(
            Arc::new(TheoryRegistry::with_defaults()),
            SelectorConfig::default(),
        )
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TheoryRegistry> {
        &self.registry
    }

    /// 时辰敏感理论按出生时辰确定性打折
    fn hour_factor(&self, input: &UserInput, descriptor: &TheoryDescriptor) -> f64 {
        if !descriptor.hour_sensitive {
            return 1.0;
        }
        match input.birth_time_certainty {
            BirthTimeCertainty::Certain => 1.0,
            BirthTimeCertainty::Uncertain => self.config.uncertain_hour_factor,
            BirthTimeCertainty::Unknown => self.config.unknown_hour_factor,
        }
    }

    /// 计算单个理论的适配度
    pub fn calculate_theory_fitness(
        &self,
        input: &UserInput,
        theory: &dyn Theory,
        position: usize,
    ) -> TheoryScore {
        let descriptor = theory.descriptor();
        let completeness = theory.required_coverage(input);
        let missing_required = input.missing(theory.get_required_fields());
        let eligible =
            missing_required.is_empty() && completeness >= theory.get_min_completeness();

        let damped = completeness * self.hour_factor(input, descriptor);
        let bonus = clamp_unit(theory.optional_bonus(input));
        let question_match = calculate_question_matching(&input.question_type, descriptor);
        let mbti_match = calculate_mbti_matching(input.mbti_type.as_deref(), descriptor);

        let c = &self.config;
        let weighted = c.weight_completeness * damped
            + c.weight_bonus * bonus
            + c.weight_question * question_match
            + c.weight_mbti * mbti_match;
        let weight_sum = c.weight_sum();
        let fitness = if weight_sum > 0.0 {
            clamp_unit(weighted / weight_sum)
        } else {
            0.0
        };

        tracing::debug!(
            "{} 适配度 {:.3} (完备度 {:.2}, 加成 {:.2}, 问题 {:.2}, MBTI {:.2}, 合格 {})",
            theory.name(),
            fitness,
            completeness,
            bonus,
            question_match,
            mbti_match,
            eligible
        );

        TheoryScore {
            name: theory.name().to_string(),
            position,
            priority: descriptor.speed,
            fitness,
            completeness,
            bonus,
            question_match,
            mbti_match,
            eligible,
            is_fallback: descriptor.is_fallback(),
            missing_required,
        }
    }

    /// 所有注册理论的评分 (注册顺序)
    pub fn score_all(&self, input: &UserInput) -> Vec<TheoryScore> {
        self.registry
            .iter()
            .enumerate()
            .map(|(position, theory)| {
                self.calculate_theory_fitness(input, theory.as_ref(), position)
            })
            .collect()
    }

    /// 选择理论
    pub fn select_theories(&self, input: &UserInput) -> Selection {
        let scores = self.score_all(input);

        // 适配度降序，稳定排序保证同分时按注册顺序
        let mut ranked: Vec<&TheoryScore> = scores.iter().filter(|s| s.eligible).collect();
        ranked.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal));

        let max = self.config.max_theories.max(1);
        let mut picked: Vec<usize> = Vec::new();

        if self.config.ensure_tier_coverage {
            for tier in SpeedTier::ALL {
                if picked.len() >= max {
                    break;
                }
                if let Some(i) = ranked.iter().position(|s| s.priority == tier) {
                    picked.push(i);
                }
            }
        }
        for i in 0..ranked.len() {
            if picked.len() >= max {
                break;
            }
            if !picked.contains(&i) {
                picked.push(i);
            }
        }

        let mut forced_fallback = None;
        if self.config.always_include_fallback {
            let designated = self.registry.fallback().map(|t| t.name().to_string());
            let fallback = designated.and_then(|name| ranked.iter().position(|s| s.name == name));
            if let Some(fallback) = fallback {
                if !picked.contains(&fallback) {
                    if picked.len() >= max {
                        if let Some(lowest) = picked.iter().copied().max() {
                            picked.retain(|i| *i != lowest);
                        }
                    }
                    picked.push(fallback);
                    forced_fallback = Some(fallback);
                }
            }
        }
        picked.sort_unstable();

        let selected: Vec<SelectedTheory> = picked
            .iter()
            .map(|&i| {
                let score = ranked[i];
                let mut reason = format!(
                    "{}理论，完备度 {:.2}，问题匹配 {:.2}，MBTI {:.2}",
                    score.priority.label(),
                    score.completeness,
                    score.question_match,
                    score.mbti_match
                );
                if forced_fallback == Some(i) {
                    reason.push_str("，兜底保留");
                }
                SelectedTheory {
                    name: score.name.clone(),
                    fitness: score.fitness,
                    priority: score.priority,
                    completeness: score.completeness,
                    reason,
                }
            })
            .collect();

        if selected.is_empty() {
            tracing::warn!("没有任何合格理论，且注册表中没有兜底理论");
        }

        let missing_info = if ranked.len() < self.config.min_theories {
            self.collect_missing_info(&scores)
        } else {
            None
        };

        tracing::info!(
            "选中 {} 个理论 (合格 {} / 注册 {}): {:?}",
            selected.len(),
            ranked.len(),
            scores.len(),
            selected.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );

        Selection {
            selected,
            missing_info,
        }
    }

    /// 差一点合格的理论所缺字段，按频次降序，同频按首次出现顺序
    fn collect_missing_info(&self, scores: &[TheoryScore]) -> Option<Vec<Field>> {
        let threshold = 1.0 - self.config.near_miss_margin;
        let mut counts: Vec<(Field, usize)> = Vec::new();
        for score in scores
            .iter()
            .filter(|s| !s.eligible && s.completeness >= threshold)
        {
            for field in &score.missing_required {
                match counts.iter_mut().find(|(f, _)| f == field) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((*field, 1)),
                }
            }
        }
        if counts.is_empty() {
            return None;
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Some(counts.into_iter().map(|(f, _)| f).collect())
    }

    /// 执行顺序：快速层在前，深度层在后，层内保持适配度顺序
    pub fn determine_execution_order(&self, selected: &[SelectedTheory]) -> Vec<String> {
        let mut ordered: Vec<&SelectedTheory> = selected.iter().collect();
        ordered.sort_by_key(|s| s.priority);
        ordered.into_iter().map(|s| s.name.clone()).collect()
    }
}
