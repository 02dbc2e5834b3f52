//! 全局错误处理机制

use thiserror::Error;

use crate::input::Field;

/// Tianji 统一错误类型
#[derive(Error, Debug)]
pub enum TianjiError {
    /// 计算时缺少必需字段 (选择器本应拦截)
    #[error("{theory} 缺少必需字段: {}", format_fields(.missing))]
    InsufficientData { theory: String, missing: Vec<Field> },

    #[error("{theory} 计算失败: {message}")]
    Calculation { theory: String, message: String },

    #[error("{theory} 计算超时 ({secs} 秒)")]
    TheoryTimeout { theory: String, secs: u64 },

    /// 所有选中理论都失败，查询无结果
    #[error("所有理论分析都失败了: {}", .attempted.join(", "))]
    AllTheoriesFailed { attempted: Vec<String> },

    #[error("分析已被调用方取消")]
    Cancelled,

    #[error("Narrative generator error: {0}")]
    Narrative(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl TianjiError {
    /// 单个理论范围内的错误，引擎会排除该理论而不是终止整个查询
    pub fn is_theory_local(&self) -> bool {
        matches!(
            self,
            TianjiError::InsufficientData { .. }
                | TianjiError::Calculation { .. }
                | TianjiError::TheoryTimeout { .. }
        )
    }

    /// 出错理论名称 (仅限单理论错误)
    pub fn theory(&self) -> Option<&str> {
        match self {
            TianjiError::InsufficientData { theory, .. }
            | TianjiError::Calculation { theory, .. }
            | TianjiError::TheoryTimeout { theory, .. } => Some(theory),
            _ => None,
        }
    }
}

fn format_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 统一 Result 类型别名
pub type Result<T> = std::result::Result<T, TianjiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theory_local_classification() {
        let err = TianjiError::InsufficientData {
            theory: "八字".to_string(),
            missing: vec![Field::BirthYear, Field::BirthDay],
        };
        assert!(err.is_theory_local());
        assert_eq!(err.theory(), Some("八字"));
        assert_eq!(err.to_string(), "八字 缺少必需字段: birth_year, birth_day");

        let err = TianjiError::AllTheoriesFailed {
            attempted: vec!["六爻".to_string()],
        };
        assert!(!err.is_theory_local());
        assert!(err.theory().is_none());
        assert!(!TianjiError::Cancelled.is_theory_local());
    }
}
