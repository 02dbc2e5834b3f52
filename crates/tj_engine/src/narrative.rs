//! 叙事生成与降级链
//!
//! 叙事只是锦上添花：生成器失败或超时都不影响已经算出的决策。
//! 生成器按顺序尝试，首选失败后降级到备用，全部失败时返回本地简化解读。

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tj_core::{Result, TianjiError, UserInput};

use crate::config::NarrativeConfig;
use crate::resolver::FinalDecision;

/// 简化解读的提供方名称
pub const SIMPLIFIED_PROVIDER: &str = "simplified";

/// 叙事生成器特征
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// 生成器名称
    fn name(&self) -> &str;

    /// 根据决策与原始输入生成自由文本
    async fn generate(&self, decision: &FinalDecision, input: &UserInput) -> Result<String>;
}

/// 生成的叙事
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    /// 实际产出文本的生成器
    pub provider: String,
    /// 非首选生成器产出
    pub degraded: bool,
}

/// 本地简化解读，无需网络
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifiedNarrator;

impl SimplifiedNarrator {
    pub fn render(decision: &FinalDecision, input: &UserInput) -> String {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "关于「{}」({})：综合判断为{}。",
            input.question_description.trim(),
            input.question_type,
            decision.judgment.label()
        );
        let _ = writeln!(
            text,
            "共识程度 {:.2}，一致性 {:.2}，置信度 {:.2}。",
            decision.consensus_level, decision.agreement, decision.confidence
        );
        if let Some(timing) = &decision.timing {
            let _ = writeln!(text, "应期：{timing}");
        }
        if !decision.conflicts.is_empty() {
            let _ = writeln!(
                text,
                "各理论存在 {} 处分歧，调和策略：{}。",
                decision.conflicts.len(),
                decision.strategy.label()
            );
        }
        let advice = decision.synthesized_advice();
        if !advice.is_empty() {
            let _ = writeln!(text, "建议：\n{advice}");
        }
        text.trim_end().to_string()
    }
}

#[async_trait]
impl NarrativeGenerator for SimplifiedNarrator {
    fn name(&self) -> &str {
        SIMPLIFIED_PROVIDER
    }

    async fn generate(&self, decision: &FinalDecision, input: &UserInput) -> Result<String> {
        Ok(Self::render(decision, input))
    }
}

/// 叙事降级链
pub struct NarrativeChain {
    generators: Vec<Arc<dyn NarrativeGenerator>>,
    config: NarrativeConfig,
}

impl NarrativeChain {
    /// 按给定顺序创建，第一个为首选
    pub fn new(generators: Vec<Arc<dyn NarrativeGenerator>>, config: NarrativeConfig) -> Self {
        Self { generators, config }
    }

    /// 仅含本地简化解读
    pub fn simplified_only(config: NarrativeConfig) -> Self {
        Self::new(vec![Arc::new(SimplifiedNarrator)], config)
    }

    /// 追加备用生成器
    pub fn with_generator(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    pub fn generators(&self) -> Vec<&str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    fn timeout_for(&self, index: usize) -> Duration {
        if index == 0 {
            Duration::from_secs(self.config.primary_timeout_secs)
        } else {
            Duration::from_secs(self.config.secondary_timeout_secs)
        }
    }

    /// 依次尝试生成器，首个成功者胜出
    pub async fn narrate(&self, decision: &FinalDecision, input: &UserInput) -> Result<Narrative> {
        if !self.config.enabled {
            return Err(TianjiError::Narrative("叙事生成已关闭".to_string()));
        }

        let mut failures = Vec::new();
        for (index, generator) in self.generators.iter().enumerate() {
            let limit = self.timeout_for(index);
            match tokio::time::timeout(limit, generator.generate(decision, input)).await {
                Ok(Ok(text)) => {
                    if index > 0 {
                        tracing::warn!("叙事已降级到 {}", generator.name());
                    }
                    return Ok(Narrative {
                        text,
                        provider: generator.name().to_string(),
                        degraded: index > 0,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!("叙事生成器 {} 失败: {}", generator.name(), e);
                    failures.push(format!("{}: {}", generator.name(), e));
                }
                Err(_) => {
                    tracing::warn!(
                        "叙事生成器 {} 超时 ({} 秒)",
                        generator.name(),
                        limit.as_secs()
                    );
                    failures.push(format!("{}: 超时", generator.name()));
                }
            }
        }

        if self.config.simplified_fallback {
            tracing::warn!("所有叙事生成器均失败，返回简化解读");
            return Ok(Narrative {
                text: SimplifiedNarrator::render(decision, input),
                provider: SIMPLIFIED_PROVIDER.to_string(),
                degraded: true,
            });
        }

        Err(TianjiError::Narrative(if failures.is_empty() {
            "没有可用的叙事生成器".to_string()
        } else {
            failures.join("; ")
        }))
    }
}

impl std::fmt::Debug for NarrativeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeChain")
            .field("generators", &self.generators())
            .field("config", &self.config)
            .finish()
    }
}
