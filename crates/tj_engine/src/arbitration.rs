//! 冲突裁决
//!
//! 出现严重冲突时，按问题类别的优先级挑选一个本次尚未参与的理论作为第三方。
//! 裁决理论的答案并入调和，再与冲突双方加权投票，得票最多的判断为最终判断。

use serde::{Deserialize, Serialize};

use tj_core::{clamp_unit, Judgment, QuestionCategory, Result};

use crate::config::ArbitrationConfig;
use crate::resolver::{
    ConflictLevel, ConflictRecord, ConflictResolver, ContributingAnswer, FinalDecision,
    ResolutionStrategy,
};

/// 权重全为 0 时每票的最小分量
const MIN_VOTE: f64 = 1e-6;

/// 裁决记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRecord {
    pub arbiter: String,
    pub theory_a: String,
    pub theory_b: String,
    pub arbiter_judgment: Judgment,
    pub final_judgment: Judgment,
    /// 最终判断的得票占比
    pub vote_share: f64,
    pub explanation: String,
}

/// 裁决器
#[derive(Debug, Clone, Default)]
pub struct Arbitrator {
    config: ArbitrationConfig,
}

impl Arbitrator {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    /// 问题类别对应的裁决优先级
    pub fn priority_for(&self, question_type: &str) -> &[String] {
        QuestionCategory::parse(question_type)
            .and_then(|c| self.config.priorities.get(c.label()))
            .unwrap_or(&self.config.default_priority)
    }

    /// 优先级最高、本次未参与且合格的理论
    pub fn choose_arbiter(
        &self,
        question_type: &str,
        attempted: &[String],
        eligible: impl Fn(&str) -> bool,
    ) -> Option<&str> {
        self.priority_for(question_type)
            .iter()
            .map(String::as_str)
            .find(|name| !attempted.iter().any(|a| a.as_str() == *name) && eligible(*name))
    }

    /// 待裁决的冲突：差距最大的严重冲突，同差距取先出现者
    pub fn target(decision: &FinalDecision) -> Option<&ConflictRecord> {
        decision
            .conflicts
            .iter()
            .filter(|c| c.level == ConflictLevel::Severe)
            .reduce(|best, c| if c.gap > best.gap { c } else { best })
    }

    /// 以裁决理论的答案重新调和，并按加权投票确定最终判断
    ///
    /// `answers` 不含裁决理论；没有严重冲突时只做普通调和。
    pub fn arbitrate(
        &self,
        resolver: &ConflictResolver,
        answers: &[ContributingAnswer],
        arbiter: ContributingAnswer,
    ) -> Result<FinalDecision> {
        let conflict = Self::target(&resolver.resolve(answers)?).cloned();

        let mut combined = answers.to_vec();
        combined.push(arbiter.clone());
        let mut decision = resolver.resolve(&combined)?;

        let Some(conflict) = conflict else {
            return Ok(decision);
        };
        let find = |name: &str| answers.iter().find(|a| a.theory == name);
        let (Some(a), Some(b)) = (
            find(conflict.theory_a.as_str()),
            find(conflict.theory_b.as_str()),
        ) else {
            return Ok(decision);
        };

        let judge = |c: &ContributingAnswer| {
            let config = resolver.config();
            Judgment::from_level(
                clamp_unit(c.answer.judgment_level),
                config.favorable_threshold,
                config.unfavorable_threshold,
            )
        };
        let (judgment_a, judgment_b, arbiter_judgment) = (judge(a), judge(b), judge(&arbiter));

        let ballots = [
            (judgment_a, a.raw_weight().max(MIN_VOTE)),
            (judgment_b, b.raw_weight().max(MIN_VOTE)),
            (
                arbiter_judgment,
                arbiter.raw_weight().max(MIN_VOTE) * self.config.arbiter_bonus,
            ),
        ];
        let votes = |j: Judgment| -> f64 {
            ballots
                .iter()
                .filter(|(judgment, _)| *judgment == j)
                .map(|(_, w)| w)
                .sum()
        };
        let total: f64 = ballots.iter().map(|(_, w)| w).sum();

        // 同票时依次偏向裁决理论、冲突甲方、冲突乙方
        let final_judgment = [arbiter_judgment, judgment_a, judgment_b]
            .into_iter()
            .reduce(|best, j| if votes(j) > votes(best) { j } else { best })
            .unwrap_or(arbiter_judgment);
        let vote_share = clamp_unit(votes(final_judgment) / total);

        let explanation = if arbiter_judgment == final_judgment {
            let sided_with = if judgment_a == arbiter_judgment {
                Some(&a.theory)
            } else if judgment_b == arbiter_judgment {
                Some(&b.theory)
            } else {
                None
            };
            match sided_with {
                Some(theory) => format!(
                    "裁决理论{}判断为「{}」，与{}一致，综合判断为「{}」",
                    arbiter.theory,
                    arbiter_judgment.label(),
                    theory,
                    final_judgment.label()
                ),
                None => format!(
                    "裁决理论{}判断为「{}」，{}与{}各执一端，综合判断为「{}」",
                    arbiter.theory,
                    arbiter_judgment.label(),
                    a.theory,
                    b.theory,
                    final_judgment.label()
                ),
            }
        } else {
            format!(
                "裁决理论{}判断为「{}」，综合各理论权重后，最终判断为「{}」",
                arbiter.theory,
                arbiter_judgment.label(),
                final_judgment.label()
            )
        };

        tracing::info!(
            "{} 裁决 {} 与 {} 的冲突: {} (得票 {:.2})",
            arbiter.theory,
            a.theory,
            b.theory,
            final_judgment.label(),
            vote_share
        );

        decision.judgment = final_judgment;
        decision.confidence = clamp_unit(vote_share * decision.agreement);
        decision.strategy = ResolutionStrategy::Arbitrated;
        decision.arbitration = Some(ArbitrationRecord {
            arbiter: arbiter.theory.clone(),
            theory_a: a.theory.clone(),
            theory_b: b.theory.clone(),
            arbiter_judgment,
            final_judgment,
            vote_share,
            explanation,
        });
        Ok(decision)
    }
}
