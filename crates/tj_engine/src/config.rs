//! 引擎配置
//!
//! 所有阈值均为可调参数而非固定常量，支持从 TOML 文件加载。

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use tj_core::{Result, TianjiError};

/// 理论选择配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// 目标最少理论数
    pub min_theories: usize,
    /// 最多理论数
    pub max_theories: usize,
    /// 完备度权重
    pub weight_completeness: f64,
    /// 可选字段加成权重
    pub weight_bonus: f64,
    /// 问题匹配权重
    pub weight_question: f64,
    /// MBTI 匹配权重
    pub weight_mbti: f64,
    /// 必需字段覆盖率达到 1 - margin 的不合格理论视为 "差一点"
    pub near_miss_margin: f64,
    /// 优先保证每个执行层级至少一个理论
    pub ensure_tier_coverage: bool,
    /// 始终包含兜底理论
    pub always_include_fallback: bool,
    /// 出生时辰 "大概" 时对时辰敏感理论完备度的折扣
    pub uncertain_hour_factor: f64,
    /// 出生时辰 "不记得" 时的折扣
    pub unknown_hour_factor: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_theories: 3,
            max_theories: 5,
            weight_completeness: 0.30,
            weight_bonus: 0.10,
            weight_question: 0.35,
            weight_mbti: 0.25,
            near_miss_margin: 0.5,
            ensure_tier_coverage: true,
            always_include_fallback: true,
            uncertain_hour_factor: 0.8,
            unknown_hour_factor: 0.3,
        }
    }
}

impl SelectorConfig {
    pub fn weight_sum(&self) -> f64 {
        self.weight_completeness + self.weight_bonus + self.weight_question + self.weight_mbti
    }
}

/// 冲突调和配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 共识程度 >= 此值判为吉
    pub favorable_threshold: f64,
    /// 共识程度 < 此值判为凶
    pub unfavorable_threshold: f64,
    /// 一致性低于此值时在建议前显式提示分歧
    pub low_agreement_threshold: f64,
    pub minor_conflict_gap: f64,
    pub significant_conflict_gap: f64,
    pub severe_conflict_gap: f64,
    /// 建议去重的相似度阈值
    pub dedup_similarity: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            favorable_threshold: 0.5,
            unfavorable_threshold: 0.4,
            low_agreement_threshold: 0.6,
            minor_conflict_gap: 0.2,
            significant_conflict_gap: 0.4,
            severe_conflict_gap: 0.5,
            dedup_similarity: 0.8,
        }
    }
}

/// 冲突裁决配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrationConfig {
    /// 出现严重冲突时引入第三方理论裁决
    pub enabled: bool,
    /// 裁决理论的投票加成倍数
    pub arbiter_bonus: f64,
    /// 按问题类别的裁决理论优先级
    pub priorities: BTreeMap<String, Vec<String>>,
    /// 类别未列出或无法识别时的优先级
    pub default_priority: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        let priorities = [
            ("事业", ["六爻", "梅花易数", "小六壬", "奇门遁甲"]),
            ("感情", ["测字术", "梅花易数", "六爻", "紫微斗数"]),
            ("财运", ["六爻", "奇门遁甲", "小六壬", "梅花易数"]),
            ("健康", ["六爻", "小六壬", "梅花易数", "八字"]),
            ("决策", ["奇门遁甲", "六爻", "大六壬", "梅花易数"]),
            ("学业", ["梅花易数", "六爻", "八字", "紫微斗数"]),
        ]
        .into_iter()
        .map(|(category, list)| (category.to_string(), names(&list)))
        .collect();
        Self {
            enabled: true,
            arbiter_bonus: 1.2,
            priorities,
            default_priority: names(&["六爻", "梅花易数", "小六壬", "奇门遁甲"]),
        }
    }
}

/// 执行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// 并行执行理论
    pub parallel: bool,
    /// 单个理论的超时 (秒)
    pub theory_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            theory_timeout_secs: 250,
        }
    }
}

/// 叙事生成配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub enabled: bool,
    /// 首选生成器超时 (秒)
    pub primary_timeout_secs: u64,
    /// 备用生成器超时 (秒)
    pub secondary_timeout_secs: u64,
    /// 全部失败时返回本地简化解读
    pub simplified_fallback: bool,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_timeout_secs: 250,
            secondary_timeout_secs: 120,
            simplified_fallback: true,
        }
    }
}

/// 引擎总配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub selector: SelectorConfig,
    pub resolver: ResolverConfig,
    pub execution: ExecutionConfig,
    pub arbitration: ArbitrationConfig,
    pub narrative: NarrativeConfig,
}

impl EngineConfig {
    /// 从 TOML 文件加载并校验
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 加载失败时记录告警并使用默认配置
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_from_path(path) {
            Ok(config) => {
                tracing::info!("已加载配置 {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("配置 {} 加载失败，使用默认配置: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        let s = &self.selector;
        if s.min_theories == 0 {
            return Err(invalid("selector.min_theories 必须大于 0"));
        }
        if s.min_theories > s.max_theories {
            return Err(invalid(format!(
                "selector.min_theories ({}) 大于 max_theories ({})",
                s.min_theories, s.max_theories
            )));
        }
        let weights = [
            s.weight_completeness,
            s.weight_bonus,
            s.weight_question,
            s.weight_mbti,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || s.weight_sum() <= 0.0 {
            return Err(invalid("selector 权重必须非负且和大于 0"));
        }

        let r = &self.resolver;
        let unit = [
            ("selector.near_miss_margin", s.near_miss_margin),
            ("selector.uncertain_hour_factor", s.uncertain_hour_factor),
            ("selector.unknown_hour_factor", s.unknown_hour_factor),
            ("resolver.favorable_threshold", r.favorable_threshold),
            ("resolver.unfavorable_threshold", r.unfavorable_threshold),
            ("resolver.low_agreement_threshold", r.low_agreement_threshold),
            ("resolver.dedup_similarity", r.dedup_similarity),
        ];
        if let Some((name, value)) = unit.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(invalid(format!("{name} = {value} 不在 [0, 1] 范围内")));
        }
        if r.unfavorable_threshold > r.favorable_threshold {
            return Err(invalid("resolver.unfavorable_threshold 不能大于 favorable_threshold"));
        }
        if !(r.minor_conflict_gap <= r.significant_conflict_gap
            && r.significant_conflict_gap <= r.severe_conflict_gap)
        {
            return Err(invalid("resolver 冲突阈值必须递增"));
        }
        let bonus = self.arbitration.arbiter_bonus;
        if !bonus.is_finite() || bonus <= 0.0 {
            return Err(invalid(format!("arbitration.arbiter_bonus = {bonus} 必须为正数")));
        }
        if self.execution.theory_timeout_secs == 0 {
            return Err(invalid("execution.theory_timeout_secs 必须大于 0"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TianjiError {
    TianjiError::Config(message.into())
}
