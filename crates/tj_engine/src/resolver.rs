//! 冲突调和器
//!
//! 把各理论的标准答案融合为一个最终决策：加权共识程度、一致性、应期、
//! 去重后的建议排序，以及两两冲突检测。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tj_core::{clamp_unit, Judgment, Result, StandardAnswer, TianjiError};

use crate::arbitration::ArbitrationRecord;
use crate::config::ResolverConfig;

/// 方差归一化上限 (取值在 [0,1] 时方差最大为 0.25)
const MAX_VARIANCE: f64 = 0.25;

/// 包含关系判重时较短一方的最少字数
const MIN_CONTAINED_CHARS: usize = 4;

/// 参与调和的答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingAnswer {
    pub theory: String,
    /// 选择阶段的适配度
    pub fitness: f64,
    pub answer: StandardAnswer,
}

impl ContributingAnswer {
    pub fn new(theory: impl Into<String>, fitness: f64, answer: StandardAnswer) -> Self {
        Self {
            theory: theory.into(),
            fitness,
            answer,
        }
    }

    /// 原始权重 = 适配度 × 置信度
    pub fn raw_weight(&self) -> f64 {
        clamp_unit(self.fitness) * clamp_unit(self.answer.confidence)
    }
}

/// 单个理论在最终决策中的贡献
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub theory: String,
    /// 归一化后的权重
    pub weight: f64,
    pub judgment: Judgment,
    pub judgment_level: f64,
    pub confidence: f64,
}

/// 排序后的建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceEntry {
    pub theory: String,
    pub weight: f64,
    pub text: String,
}

/// 冲突等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConflictLevel {
    /// 轻微分歧
    Minor,
    /// 明显分歧
    Significant,
    /// 结论相反
    Severe,
}

impl ConflictLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ConflictLevel::Minor => "轻微",
            ConflictLevel::Significant => "明显",
            ConflictLevel::Severe => "严重",
        }
    }

    pub fn strategy(&self) -> ResolutionStrategy {
        match self {
            ConflictLevel::Minor => ResolutionStrategy::SimpleAverage,
            ConflictLevel::Significant => ResolutionStrategy::WeightedHarmonize,
            ConflictLevel::Severe => ResolutionStrategy::NeedsArbitration,
        }
    }
}

/// 调和策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    /// 无冲突
    Unanimous,
    SimpleAverage,
    WeightedHarmonize,
    /// 结论相反，需要第三方理论裁决
    NeedsArbitration,
    /// 已由第三方理论裁决
    Arbitrated,
}

impl ResolutionStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionStrategy::Unanimous => "意见一致",
            ResolutionStrategy::SimpleAverage => "简单平均",
            ResolutionStrategy::WeightedHarmonize => "加权调和",
            ResolutionStrategy::NeedsArbitration => "需要裁决",
            ResolutionStrategy::Arbitrated => "已裁决",
        }
    }
}

/// 两两冲突记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub theory_a: String,
    pub theory_b: String,
    /// |level_a - level_b|
    pub gap: f64,
    pub level: ConflictLevel,
}

/// 最终决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub judgment: Judgment,
    /// 加权共识程度 0-1
    pub consensus_level: f64,
    /// 一致性 0-1
    pub agreement: f64,
    /// 总体置信度 0-1
    pub confidence: f64,
    pub timing: Option<String>,
    /// 一致性过低时的分歧提示
    pub notice: Option<String>,
    /// 按权重降序、去重后的建议
    pub advice: Vec<AdviceEntry>,
    /// 按权重降序
    pub contributions: Vec<Contribution>,
    pub conflicts: Vec<ConflictRecord>,
    pub strategy: ResolutionStrategy,
    /// 严重冲突经第三方理论裁决时的记录
    #[serde(default)]
    pub arbitration: Option<ArbitrationRecord>,
}

impl FinalDecision {
    /// 合成建议文本，分歧提示与裁决说明在最前
    pub fn synthesized_advice(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        if let Some(notice) = &self.notice {
            lines.push(notice.clone());
        }
        if let Some(arbitration) = &self.arbitration {
            lines.push(arbitration.explanation.clone());
        }
        lines.extend(
            self.advice
                .iter()
                .map(|a| format!("【{}】{}", a.theory, a.text)),
        );
        lines.join("\n")
    }

    pub fn theories(&self) -> Vec<String> {
        self.contributions.iter().map(|c| c.theory.clone()).collect()
    }
}

/// 冲突调和器
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// 归一化权重；全部为 0 时等权
    fn normalized_weights(answers: &[ContributingAnswer]) -> Vec<f64> {
        let raw: Vec<f64> = answers.iter().map(|a| a.raw_weight()).collect();
        let total: f64 = raw.iter().sum();
        if total > 0.0 && total.is_finite() {
            raw.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / answers.len() as f64; answers.len()]
        }
    }

    /// 融合答案
    pub fn resolve(&self, answers: &[ContributingAnswer]) -> Result<FinalDecision> {
        if answers.is_empty() {
            return Err(TianjiError::AllTheoriesFailed {
                attempted: Vec::new(),
            });
        }

        let weights = Self::normalized_weights(answers);
        let levels: Vec<f64> = answers
            .iter()
            .map(|a| clamp_unit(a.answer.judgment_level))
            .collect();

        let consensus_level = if answers.len() == 1 {
            levels[0]
        } else {
            clamp_unit(weights.iter().zip(&levels).map(|(w, l)| w * l).sum())
        };
        let agreement = if answers.len() == 1 {
            1.0
        } else {
            let variance: f64 = weights
                .iter()
                .zip(&levels)
                .map(|(w, l)| w * (l - consensus_level).powi(2))
                .sum();
            clamp_unit(1.0 - variance / MAX_VARIANCE)
        };

        // 单个答案也按配置阈值判断，原生用语只保留在贡献明细里
        let judgment = Judgment::from_level(
            consensus_level,
            self.config.favorable_threshold,
            self.config.unfavorable_threshold,
        );
        let confidence = self.threshold_distance(consensus_level) * agreement;

        // 权重降序，同权保持输入顺序
        let mut order: Vec<usize> = (0..answers.len()).collect();
        order.sort_by(|a, b| {
            weights[*b]
                .partial_cmp(&weights[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let timing = order
            .iter()
            .find_map(|&i| answers[i].answer.timing.clone().filter(|t| !t.trim().is_empty()));

        let advice = self.rank_advice(answers, &weights, &order);

        let contributions = order
            .iter()
            .map(|&i| Contribution {
                theory: answers[i].theory.clone(),
                weight: weights[i],
                judgment: answers[i].answer.judgment,
                judgment_level: levels[i],
                confidence: clamp_unit(answers[i].answer.confidence),
            })
            .collect();

        let conflicts = self.detect_conflicts(answers);
        let strategy = conflicts
            .iter()
            .map(|c| c.level)
            .max()
            .map(|level| level.strategy())
            .unwrap_or(ResolutionStrategy::Unanimous);

        let notice = if answers.len() > 1 && agreement < self.config.low_agreement_threshold {
            Some(self.disagreement_notice(agreement, &conflicts))
        } else {
            None
        };

        tracing::info!(
            "调和完成: {} 共识 {:.3} 一致性 {:.3} 置信度 {:.3} 冲突 {} ({})",
            judgment.label(),
            consensus_level,
            agreement,
            confidence,
            conflicts.len(),
            strategy.label()
        );

        Ok(FinalDecision {
            judgment,
            consensus_level,
            agreement,
            confidence,
            timing,
            notice,
            advice,
            contributions,
            conflicts,
            strategy,
            arbitration: None,
        })
    }

    /// 共识程度距最近阈值的距离，各区间统一按最大可能距离归一化
    ///
    /// 中性带内的距离不超过半个带宽，因此带内的置信度总是偏低；
    /// 带外越远置信度越高。
    fn threshold_distance(&self, level: f64) -> f64 {
        let fav = self.config.favorable_threshold;
        let unfav = self.config.unfavorable_threshold;
        let distance = if level >= fav {
            level - fav
        } else if level < unfav {
            unfav - level
        } else {
            (level - unfav).min(fav - level)
        };
        let scale = (1.0 - fav).max(unfav);
        if scale > 0.0 {
            clamp_unit(distance / scale)
        } else {
            0.0
        }
    }

    /// 两两比较判断程度，差距越大冲突越严重
    pub fn detect_conflicts(&self, answers: &[ContributingAnswer]) -> Vec<ConflictRecord> {
        let mut conflicts = Vec::new();
        for (i, a) in answers.iter().enumerate() {
            for b in &answers[i + 1..] {
                let gap = (clamp_unit(a.answer.judgment_level)
                    - clamp_unit(b.answer.judgment_level))
                .abs();
                if let Some(level) = self.classify_gap(gap) {
                    tracing::debug!(
                        "{} 与 {} 存在{}冲突 (差距 {:.2})",
                        a.theory,
                        b.theory,
                        level.label(),
                        gap
                    );
                    conflicts.push(ConflictRecord {
                        theory_a: a.theory.clone(),
                        theory_b: b.theory.clone(),
                        gap,
                        level,
                    });
                }
            }
        }
        conflicts
    }

    fn classify_gap(&self, gap: f64) -> Option<ConflictLevel> {
        let c = &self.config;
        if gap < c.minor_conflict_gap {
            None
        } else if gap < c.significant_conflict_gap {
            Some(ConflictLevel::Minor)
        } else if gap < c.severe_conflict_gap {
            Some(ConflictLevel::Significant)
        } else {
            Some(ConflictLevel::Severe)
        }
    }

    fn disagreement_notice(&self, agreement: f64, conflicts: &[ConflictRecord]) -> String {
        let widest = conflicts.iter().max_by(|a, b| {
            a.gap
                .partial_cmp(&b.gap)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        match widest {
            Some(c) => format!(
                "注意：各理论分歧较大 (一致性 {:.2})，{} 与 {} 的判断差距 {:.2}，请谨慎参考",
                agreement, c.theory_a, c.theory_b, c.gap
            ),
            None => format!("注意：各理论分歧较大 (一致性 {:.2})，请谨慎参考", agreement),
        }
    }

    /// 按权重排序建议并去除近似重复
    fn rank_advice(
        &self,
        answers: &[ContributingAnswer],
        weights: &[f64],
        order: &[usize],
    ) -> Vec<AdviceEntry> {
        let mut kept: Vec<(AdviceEntry, String)> = Vec::new();
        for &i in order {
            let text = answers[i].answer.advice.trim();
            let normalized = normalize_advice(text);
            if normalized.is_empty() {
                continue;
            }
            let duplicate = kept
                .iter()
                .any(|(_, seen)| is_near_duplicate(seen, &normalized, self.config.dedup_similarity));
            if duplicate {
                tracing::debug!("去除 {} 的重复建议", answers[i].theory);
                continue;
            }
            kept.push((
                AdviceEntry {
                    theory: answers[i].theory.clone(),
                    weight: weights[i],
                    text: text.to_string(),
                },
                normalized,
            ));
        }
        kept.into_iter().map(|(entry, _)| entry).collect()
    }
}

/// 去掉空白与标点，英文转小写
fn normalize_advice(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 相同、足够长的一方被另一方包含，或字符二元组 Dice 系数达到阈值
fn is_near_duplicate(a: &str, b: &str, threshold: f64) -> bool {
    if a == b {
        return true;
    }
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if shorter.chars().count() >= MIN_CONTAINED_CHARS && longer.contains(shorter) {
        return true;
    }
    let bigrams = |s: &str| -> HashSet<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let (x, y) = (bigrams(a), bigrams(b));
    if x.is_empty() || y.is_empty() {
        return false;
    }
    let common = x.intersection(&y).count();
    2.0 * common as f64 / (x.len() + y.len()) as f64 >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(level: f64, confidence: f64, timing: Option<&str>, advice: &str) -> StandardAnswer {
        StandardAnswer {
            judgment: Judgment::from_level(level, 0.5, 0.4),
            label: "平".to_string(),
            judgment_level: level,
            timing: timing.map(str::to_string),
            advice: advice.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_singleton_is_identity() {
        let resolver = ConflictResolver::default();
        let single = ContributingAnswer::new("小六壬", 0.6, answer(0.3, 1.0, None, "耐心等待"));
        let decision = resolver.resolve(&[single]).unwrap();
        assert_eq!(decision.consensus_level, 0.3);
        assert_eq!(decision.agreement, 1.0);
        assert_eq!(decision.judgment, Judgment::Unfavorable);
        assert!(decision.conflicts.is_empty());
        assert_eq!(decision.strategy, ResolutionStrategy::Unanimous);
        assert!(decision.notice.is_none());
        // (0.4 - 0.3) / max(1 - 0.5, 0.4)
        assert!((decision.confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_singleton_judgment_follows_configured_thresholds() {
        let resolver = ConflictResolver::default();
        let mut at_midpoint = answer(0.5, 1.0, None, "a");
        at_midpoint.judgment = Judgment::Neutral;
        let decision = resolver
            .resolve(&[ContributingAnswer::new("甲", 0.6, at_midpoint)])
            .unwrap();
        assert_eq!(decision.judgment, Judgment::Favorable);
        assert_eq!(decision.contributions[0].judgment, Judgment::Neutral);

        let mut mild = answer(0.42, 1.0, None, "a");
        mild.judgment = Judgment::Unfavorable;
        let decision = resolver
            .resolve(&[ContributingAnswer::new("甲", 0.6, mild)])
            .unwrap();
        assert_eq!(decision.judgment, Judgment::Neutral);
    }

    #[test]
    fn test_empty_is_error() {
        let err = ConflictResolver::default().resolve(&[]).unwrap_err();
        assert!(matches!(err, TianjiError::AllTheoriesFailed { .. }));
    }

    #[test]
    fn test_weighted_consensus() {
        let resolver = ConflictResolver::default();
        let answers = vec![
            ContributingAnswer::new("甲", 1.0, answer(0.8, 1.0, None, "积极推进")),
            ContributingAnswer::new("乙", 0.5, answer(0.2, 0.5, None, "暂缓行动")),
        ];
        let decision = resolver.resolve(&answers).unwrap();
        // 权重 1.0 与 0.25 => 0.8 与 0.2
        assert!((decision.consensus_level - 0.68).abs() < 1e-9);
        assert_eq!(decision.judgment, Judgment::Favorable);
        assert_eq!(decision.contributions[0].theory, "甲");
        assert!((decision.contributions[0].weight - 0.8).abs() < 1e-9);
        // 方差 0.8*0.0144 + 0.2*0.2304 = 0.0576
        assert!((decision.agreement - (1.0 - 0.0576 / 0.25)).abs() < 1e-9);
        assert_eq!(decision.conflicts.len(), 1);
        assert_eq!(decision.conflicts[0].level, ConflictLevel::Severe);
        assert_eq!(decision.strategy, ResolutionStrategy::NeedsArbitration);
    }

    #[test]
    fn test_zero_weights_fall_back_to_equal() {
        let resolver = ConflictResolver::default();
        let answers = vec![
            ContributingAnswer::new("甲", 0.0, answer(0.75, 0.9, None, "a")),
            ContributingAnswer::new("乙", 0.0, answer(0.25, 0.9, None, "b")),
        ];
        let decision = resolver.resolve(&answers).unwrap();
        assert_eq!(decision.consensus_level, 0.5);
        assert_eq!(decision.judgment, Judgment::Favorable);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_timing_from_heaviest_answer_with_timing() {
        let resolver = ConflictResolver::default();
        let answers = vec![
            ContributingAnswer::new("甲", 0.9, answer(0.6, 1.0, None, "a")),
            ContributingAnswer::new("乙", 0.5, answer(0.6, 1.0, Some("三日内"), "b")),
            ContributingAnswer::new("丙", 0.8, answer(0.6, 1.0, Some("下月"), "c")),
        ];
        let decision = resolver.resolve(&answers).unwrap();
        assert_eq!(decision.timing.as_deref(), Some("下月"));
        assert_eq!(decision.theories(), vec!["甲", "丙", "乙"]);
    }

    #[test]
    fn test_advice_dedup_keeps_heaviest() {
        let resolver = ConflictResolver::default();
        let answers = vec![
            ContributingAnswer::new("甲", 0.5, answer(0.6, 1.0, None, "宜耐心等待时机。")),
            ContributingAnswer::new("乙", 0.9, answer(0.6, 1.0, None, "宜耐心等待时机")),
            ContributingAnswer::new("丙", 0.7, answer(0.6, 1.0, None, "谨言慎行，避免争执")),
            ContributingAnswer::new("丁", 0.6, answer(0.6, 1.0, None, "  ")),
        ];
        let decision = resolver.resolve(&answers).unwrap();
        let theories: Vec<&str> = decision.advice.iter().map(|a| a.theory.as_str()).collect();
        assert_eq!(theories, vec!["乙", "丙"]);
    }

    #[test]
    fn test_short_advice_survives_dedup() {
        let resolver = ConflictResolver::default();
        let answers = vec![
            ContributingAnswer::new("甲", 0.9, answer(0.8, 1.0, None, "大吉之象，宜出行")),
            ContributingAnswer::new("乙", 0.5, answer(0.8, 1.0, None, "吉")),
        ];
        let decision = resolver.resolve(&answers).unwrap();
        assert_eq!(decision.advice.len(), 2);
    }

    #[test]
    fn test_low_agreement_prefixes_notice() {
        let resolver = ConflictResolver::default();
        let answers = vec![
            ContributingAnswer::new("八字", 0.8, answer(0.95, 1.0, None, "大胆去做")),
            ContributingAnswer::new("小六壬", 0.8, answer(0.05, 1.0, None, "切勿行动")),
        ];
        let decision = resolver.resolve(&answers).unwrap();
        assert!(decision.agreement < 0.6);
        let text = decision.synthesized_advice();
        assert!(text.starts_with("注意"));
        assert!(text.contains("八字") && text.contains("小六壬"));
    }

    #[test]
    fn test_conflict_levels() {
        let resolver = ConflictResolver::default();
        assert_eq!(resolver.classify_gap(0.1), None);
        assert_eq!(resolver.classify_gap(0.25), Some(ConflictLevel::Minor));
        assert_eq!(resolver.classify_gap(0.45), Some(ConflictLevel::Significant));
        assert_eq!(resolver.classify_gap(0.7), Some(ConflictLevel::Severe));
    }

    #[test]
    fn test_neutral_band_is_never_more_confident_than_outside() {
        let resolver = ConflictResolver::default();
        // 中性带正中：距阈值 0.05
        assert!((resolver.threshold_distance(0.45) - 0.1).abs() < 1e-9);
        assert!((resolver.threshold_distance(0.6) - 0.2).abs() < 1e-9);
        assert_eq!(resolver.threshold_distance(0.4), 0.0);
        assert_eq!(resolver.threshold_distance(1.0), 1.0);
        assert!((resolver.threshold_distance(0.0) - 0.8).abs() < 1e-9);

        // 离开中性带越远，置信度不降
        let favorable: Vec<f64> = (50..=100)
            .map(|i| resolver.threshold_distance(i as f64 / 100.0))
            .collect();
        assert!(favorable.windows(2).all(|w| w[0] <= w[1]));
        let unfavorable: Vec<f64> = (0..40)
            .rev()
            .map(|i| resolver.threshold_distance(i as f64 / 100.0))
            .collect();
        assert!(unfavorable.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_ambiguous_consensus_gets_low_confidence() {
        let resolver = ConflictResolver::default();
        let neutral = resolver
            .resolve(&[
                ContributingAnswer::new("甲", 0.8, answer(0.45, 1.0, None, "a")),
                ContributingAnswer::new("乙", 0.8, answer(0.45, 1.0, None, "b")),
            ])
            .unwrap();
        let favorable = resolver
            .resolve(&[
                ContributingAnswer::new("甲", 0.8, answer(0.6, 1.0, None, "a")),
                ContributingAnswer::new("乙", 0.8, answer(0.6, 1.0, None, "b")),
            ])
            .unwrap();
        assert_eq!(neutral.judgment, Judgment::Neutral);
        assert_eq!(favorable.judgment, Judgment::Favorable);
        assert!(neutral.confidence < favorable.confidence);
    }

    #[test]
    fn test_near_duplicate() {
        assert!(is_near_duplicate("abcdef", "abcdef", 0.8));
        assert!(is_near_duplicate("事情平稳", "事情平稳可以按计划进行", 0.8));
        assert!(!is_near_duplicate("宜守", "宜攻", 0.8));
        // 过短的建议不因被包含而判重
        assert!(!is_near_duplicate("吉", "大吉之象宜出行", 0.8));
        assert!(!is_near_duplicate("大吉之象宜出行", "吉", 0.8));
    }
}
