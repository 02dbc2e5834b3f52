//! 理论输出：原始结果与标准答案

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// 统一吉凶判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Favorable,
    Neutral,
    Unfavorable,
}

impl Judgment {
    /// 将各理论的原生吉凶用语归一化
    ///
    /// 未识别的用语按 "平" 处理。
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "大吉" | "吉" | "小吉" | "favorable" => Judgment::Favorable,
            "小凶" | "凶" | "大凶" | "unfavorable" => Judgment::Unfavorable,
            "平" | "neutral" => Judgment::Neutral,
            other => {
                tracing::debug!("未识别的吉凶用语 {other:?}，按平处理");
                Judgment::Neutral
            }
        }
    }

    /// 按数值与阈值判断，阈值之间为中性带
    pub fn from_level(level: f64, favorable_threshold: f64, unfavorable_threshold: f64) -> Self {
        if level >= favorable_threshold {
            Judgment::Favorable
        } else if level < unfavorable_threshold {
            Judgment::Unfavorable
        } else {
            Judgment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Favorable => "favorable",
            Judgment::Neutral => "neutral",
            Judgment::Unfavorable => "unfavorable",
        }
    }

    /// 中文用语
    pub fn label(&self) -> &'static str {
        match self {
            Judgment::Favorable => "吉",
            Judgment::Neutral => "平",
            Judgment::Unfavorable => "凶",
        }
    }
}

/// 理论计算的原始结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResult {
    /// 产出该结果的理论
    pub theory: String,
    /// 原生吉凶用语 (大吉、吉、小吉、平 ...)
    pub label: String,
    /// 吉凶程度 0-1
    pub judgment_level: f64,
    /// 应期
    pub timing: Option<String>,
    pub advice: String,
    /// 理论自报置信度 0-1
    pub confidence: f64,
    /// 排盘细节 (理论自定义结构)
    pub details: serde_json::Value,
    /// 计算过程中的结构化告警
    pub events: Vec<Event>,
}

impl RawResult {
    pub fn new(theory: impl Into<String>, label: impl Into<String>, judgment_level: f64) -> Self {
        Self {
            theory: theory.into(),
            label: label.into(),
            judgment_level,
            timing: None,
            advice: String::new(),
            confidence: 0.8,
            details: serde_json::Value::Null,
            events: Vec::new(),
        }
    }

    pub fn with_timing(mut self, timing: impl Into<String>) -> Self {
        self.timing = Some(timing.into());
        self
    }

    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = advice.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = Event>) -> Self {
        self.events.extend(events);
        self
    }
}

/// 标准答案：所有理论共同的输出形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardAnswer {
    pub judgment: Judgment,
    /// 原生吉凶用语
    pub label: String,
    /// 0-1，越高越吉
    pub judgment_level: f64,
    pub timing: Option<String>,
    pub advice: String,
    /// 0-1
    pub confidence: f64,
}

impl StandardAnswer {
    /// 直接映射原始结果，数值截断到 [0, 1]
    pub fn from_raw(raw: &RawResult) -> Self {
        Self {
            judgment: Judgment::from_label(&raw.label),
            label: raw.label.clone(),
            judgment_level: clamp_unit(raw.judgment_level),
            timing: raw.timing.clone(),
            advice: raw.advice.clone(),
            confidence: clamp_unit(raw.confidence),
        }
    }
}

/// 截断到 [0, 1]，NaN 视为 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_normalization() {
        assert_eq!(Judgment::from_label("大吉"), Judgment::Favorable);
        assert_eq!(Judgment::from_label("小吉"), Judgment::Favorable);
        assert_eq!(Judgment::from_label("平"), Judgment::Neutral);
        assert_eq!(Judgment::from_label("小凶"), Judgment::Unfavorable);
        assert_eq!(Judgment::from_label("凶"), Judgment::Unfavorable);
        assert_eq!(Judgment::from_label("???"), Judgment::Neutral);
    }

    #[test]
    fn test_level_dead_band() {
        assert_eq!(Judgment::from_level(0.5, 0.5, 0.4), Judgment::Favorable);
        assert_eq!(Judgment::from_level(0.45, 0.5, 0.4), Judgment::Neutral);
        assert_eq!(Judgment::from_level(0.4, 0.5, 0.4), Judgment::Neutral);
        assert_eq!(Judgment::from_level(0.39, 0.5, 0.4), Judgment::Unfavorable);
    }

    #[test]
    fn test_standard_answer_clamps() {
        let raw = RawResult::new("测试", "吉", 1.4).with_confidence(f64::NAN);
        let answer = StandardAnswer::from_raw(&raw);
        assert_eq!(answer.judgment, Judgment::Favorable);
        assert_eq!(answer.judgment_level, 1.0);
        assert_eq!(answer.confidence, 0.0);
    }
}
