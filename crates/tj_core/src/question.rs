//! 问题类别与特征向量

use serde::{Deserialize, Serialize};

/// 特征维度数
pub const FEATURE_DIMS: usize = 8;

/// 未知类别使用的平坦向量
pub const NEUTRAL_FEATURES: [f64; FEATURE_DIMS] = [0.5; FEATURE_DIMS];

/// 问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionCategory {
    Career,
    Wealth,
    Romance,
    Marriage,
    Health,
    Study,
    Relations,
    Timing,
    Decision,
    Personality,
}

impl QuestionCategory {
    pub const ALL: [QuestionCategory; 10] = [
        QuestionCategory::Career,
        QuestionCategory::Wealth,
        QuestionCategory::Romance,
        QuestionCategory::Marriage,
        QuestionCategory::Health,
        QuestionCategory::Study,
        QuestionCategory::Relations,
        QuestionCategory::Timing,
        QuestionCategory::Decision,
        QuestionCategory::Personality,
    ];

    /// 解析中英文类别标签
    pub fn parse(raw: &str) -> Option<Self> {
        let category = match raw.trim().to_lowercase().as_str() {
            "事业" | "career" => QuestionCategory::Career,
            "财运" | "wealth" | "finance" => QuestionCategory::Wealth,
            "感情" | "romance" | "love" => QuestionCategory::Romance,
            "婚姻" | "marriage" => QuestionCategory::Marriage,
            "健康" | "health" => QuestionCategory::Health,
            "学业" | "study" | "education" => QuestionCategory::Study,
            "人际" | "relations" | "relationships" => QuestionCategory::Relations,
            "择时" | "timing" => QuestionCategory::Timing,
            "决策" | "decision" => QuestionCategory::Decision,
            "性格" | "personality" => QuestionCategory::Personality,
            _ => return None,
        };
        Some(category)
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionCategory::Career => "事业",
            QuestionCategory::Wealth => "财运",
            QuestionCategory::Romance => "感情",
            QuestionCategory::Marriage => "婚姻",
            QuestionCategory::Health => "健康",
            QuestionCategory::Study => "学业",
            QuestionCategory::Relations => "人际",
            QuestionCategory::Timing => "择时",
            QuestionCategory::Decision => "决策",
            QuestionCategory::Personality => "性格",
        }
    }

    /// 类别序号
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).unwrap_or(0)
    }

    /// 特征向量
    ///
    /// [时间敏感性, 空间相关性, 人际关系, 财务相关, 健康相关, 决策相关, 情感强度, 复杂程度]
    pub fn features(&self) -> [f64; FEATURE_DIMS] {
        match self {
            QuestionCategory::Career => [0.7, 0.3, 0.8, 0.9, 0.2, 0.9, 0.5, 0.8],
            QuestionCategory::Wealth => [0.6, 0.4, 0.5, 1.0, 0.1, 0.8, 0.4, 0.7],
            QuestionCategory::Romance => [0.4, 0.2, 0.9, 0.3, 0.3, 0.6, 1.0, 0.8],
            QuestionCategory::Marriage => [0.3, 0.3, 1.0, 0.5, 0.2, 0.7, 0.9, 0.9],
            QuestionCategory::Health => [0.9, 0.2, 0.3, 0.4, 1.0, 0.5, 0.7, 0.6],
            QuestionCategory::Study => [0.5, 0.2, 0.4, 0.3, 0.2, 0.6, 0.5, 0.5],
            QuestionCategory::Relations => [0.3, 0.3, 1.0, 0.2, 0.1, 0.4, 0.8, 0.6],
            QuestionCategory::Timing => [1.0, 0.8, 0.3, 0.5, 0.2, 1.0, 0.3, 0.5],
            QuestionCategory::Decision => [0.7, 0.5, 0.6, 0.7, 0.2, 1.0, 0.5, 0.8],
            QuestionCategory::Personality => [0.1, 0.1, 0.7, 0.3, 0.4, 0.2, 0.6, 0.7],
        }
    }
}

/// 问题类别的特征向量，未知类别返回平坦向量
pub fn question_features(question_type: &str) -> [f64; FEATURE_DIMS] {
    QuestionCategory::parse(question_type)
        .map(|c| c.features())
        .unwrap_or(NEUTRAL_FEATURES)
}
