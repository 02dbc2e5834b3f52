//! 术数理论能力契约
//!
//! 每种理论声明自己需要的字段、字段权重、最小完备度与执行层级，
//! 选择器与调和器只依赖这里的契约，新增理论无需修改它们。

use serde::{Deserialize, Serialize};

use tj_core::{
    Event, Field, RawResult, Result, StandardAnswer, TianjiError, UserInput, FEATURE_DIMS,
};

/// MBTI 类型的规范顺序 (与 `TheoryDescriptor::mbti_affinity` 对齐)
pub const MBTI_TYPES: [&str; 16] = [
    "INTJ", "INTP", "ENTJ", "ENTP", "INFJ", "INFP", "ENFJ", "ENFP", "ISTJ", "ISFJ", "ESTJ",
    "ESFJ", "ISTP", "ISFP", "ESTP", "ESFP",
];

/// MBTI 类型序号 (大小写不敏感)
pub fn mbti_index(mbti: &str) -> Option<usize> {
    let upper = mbti.trim().to_uppercase();
    MBTI_TYPES.iter().position(|t| *t == upper)
}

/// 执行层级：快速理论先出结果，深度理论最后
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpeedTier {
    Fast,
    Basic,
    Deep,
}

impl SpeedTier {
    pub const ALL: [SpeedTier; 3] = [SpeedTier::Fast, SpeedTier::Basic, SpeedTier::Deep];

    pub fn label(&self) -> &'static str {
        match self {
            SpeedTier::Fast => "快速",
            SpeedTier::Basic => "基础",
            SpeedTier::Deep => "深度",
        }
    }
}

/// 理论描述：注册时构建一次，之后只读
#[derive(Debug, Clone)]
pub struct TheoryDescriptor {
    pub name: String,
    pub speed: SpeedTier,
    pub required_fields: Vec<Field>,
    /// 可选字段及其权重 (权重不要求和为 1)
    pub field_weights: Vec<(Field, f64)>,
    pub min_completeness: f64,
    pub supports_multi_subject: bool,
    /// 依赖出生时辰，时辰不确定时降低适配度
    pub hour_sensitive: bool,
    /// 问题特征维度上的擅长程度
    pub strengths: [f64; FEATURE_DIMS],
    /// 按 `MBTI_TYPES` 顺序的接受度
    pub mbti_affinity: [f64; 16],
}

impl TheoryDescriptor {
    pub fn new(name: impl Into<String>, speed: SpeedTier) -> Self {
        Self {
            name: name.into(),
            speed,
            required_fields: Vec::new(),
            field_weights: Vec::new(),
            min_completeness: 0.0,
            supports_multi_subject: false,
            hour_sensitive: false,
            strengths: [0.5; FEATURE_DIMS],
            mbti_affinity: [0.7; 16],
        }
    }

    pub fn require(mut self, fields: &[Field]) -> Self {
        self.required_fields.extend_from_slice(fields);
        self
    }

    pub fn optional(mut self, field: Field, weight: f64) -> Self {
        self.field_weights.push((field, weight));
        self
    }

    pub fn min_completeness(mut self, threshold: f64) -> Self {
        self.min_completeness = threshold;
        self
    }

    pub fn multi_subject(mut self) -> Self {
        self.supports_multi_subject = true;
        self
    }

    pub fn hour_sensitive(mut self) -> Self {
        self.hour_sensitive = true;
        self
    }

    pub fn strengths(mut self, strengths: [f64; FEATURE_DIMS]) -> Self {
        self.strengths = strengths;
        self
    }

    pub fn mbti_affinity(mut self, affinity: [f64; 16]) -> Self {
        self.mbti_affinity = affinity;
        self
    }

    /// 无必需字段且最小完备度为 0：任何输入都可用的兜底理论
    pub fn is_fallback(&self) -> bool {
        self.required_fields.is_empty() && self.min_completeness <= 0.0
    }
}

/// 术数理论特征
pub trait Theory: Send + Sync + 'static {
    /// 理论描述
    fn descriptor(&self) -> &TheoryDescriptor;

    /// 纯代码排盘计算，相同输入恒得相同结果
    fn calculate(&self, input: &UserInput) -> Result<RawResult>;

    /// 转换为标准答案，对本理论 `calculate` 的任何产出都不会失败
    fn to_standard_answer(&self, raw: &RawResult) -> StandardAnswer {
        StandardAnswer::from_raw(raw)
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn get_required_fields(&self) -> &[Field] {
        &self.descriptor().required_fields
    }

    fn get_optional_fields(&self) -> Vec<Field> {
        self.descriptor().field_weights.iter().map(|(f, _)| *f).collect()
    }

    fn get_field_weights(&self) -> &[(Field, f64)] {
        &self.descriptor().field_weights
    }

    fn get_min_completeness(&self) -> f64 {
        self.descriptor().min_completeness
    }

    /// 必需字段覆盖率，无必需字段时为 1
    fn required_coverage(&self, input: &UserInput) -> f64 {
        let required = self.get_required_fields();
        if required.is_empty() {
            return 1.0;
        }
        let present = required.iter().filter(|f| input.has(**f)).count();
        present as f64 / required.len() as f64
    }

    /// 已提供的可选字段权重之和
    fn optional_bonus(&self, input: &UserInput) -> f64 {
        self.get_field_weights()
            .iter()
            .filter(|(f, _)| input.has(*f))
            .map(|(_, w)| *w)
            .sum()
    }

    /// 计算前校验必需字段
    fn ensure_required(&self, input: &UserInput) -> Result<()> {
        let missing = input.missing(self.get_required_fields());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TianjiError::InsufficientData {
                theory: self.name().to_string(),
                missing,
            })
        }
    }

    /// 不支持多人分析时只分析主要咨询者，并产出结构化告警
    fn narrowing_events(&self, input: &UserInput) -> Vec<Event> {
        if self.descriptor().supports_multi_subject || input.additional_persons.is_empty() {
            return Vec::new();
        }
        vec![Event::subjects_narrowed(
            self.name(),
            input.additional_persons.len(),
        )]
    }
}

/// 将 0-1 的程度映射为原生吉凶用语
///
/// 吉、平、凶的分界与默认调和阈值 (0.5 / 0.4) 一致。
pub fn native_label(level: f64) -> &'static str {
    if level >= 0.9 {
        "大吉"
    } else if level >= 0.7 {
        "吉"
    } else if level >= 0.5 {
        "小吉"
    } else if level >= 0.4 {
        "平"
    } else if level >= 0.3 {
        "小凶"
    } else if level >= 0.1 {
        "凶"
    } else {
        "大凶"
    }
}

/// 计算失败的便捷构造
pub(crate) fn calculation_error(theory: &str, message: impl Into<String>) -> TianjiError {
    TianjiError::Calculation {
        theory: theory.to_string(),
        message: message.into(),
    }
}
