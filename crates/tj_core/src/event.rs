//! 分析事件定义
//!
//! 结构化事件代替异常传递非致命告警，同时构成一次问询的事件日志。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 分析事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// 事件唯一标识
    pub id: Uuid,
    /// 事件类型
    pub kind: EventKind,
    /// 事件时间戳
    pub timestamp: DateTime<Utc>,
    /// 关联理论
    pub theory: Option<String>,
    /// 事件载荷 (JSON)
    pub payload: serde_json::Value,
}

impl Event {
    /// 创建新事件
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            theory: None,
            payload,
        }
    }

    /// 关联理论
    pub fn for_theory(mut self, theory: impl Into<String>) -> Self {
        self.theory = Some(theory.into());
        self
    }

    /// 理论不支持多人分析，只分析主要咨询者
    pub fn subjects_narrowed(theory: impl Into<String>, ignored: usize) -> Self {
        Self::new(
            EventKind::SubjectsNarrowed,
            serde_json::json!({ "ignored_persons": ignored }),
        )
        .for_theory(theory)
    }

    /// 是否为告警类事件
    pub fn is_warning(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubjectsNarrowed
                | EventKind::TheoryFailed
                | EventKind::ConflictDetected
                | EventKind::ArbitrationUnavailable
                | EventKind::NarrativeDegraded
                | EventKind::NarrativeFailed
        )
    }
}

/// 事件类型枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventKind {
    // 选择事件
    TheoriesSelected,

    // 执行事件
    TheoryStarted,
    TheoryCompleted,
    TheoryFailed,
    SubjectsNarrowed,

    // 调和事件
    ConflictDetected,
    DecisionReached,

    // 裁决事件
    ArbitrationCompleted,
    ArbitrationUnavailable,

    // 叙事事件
    NarrativeCompleted,
    NarrativeDegraded,
    NarrativeFailed,
}

impl EventKind {
    /// 获取事件类型名称
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::TheoriesSelected => "theories_selected",
            EventKind::TheoryStarted => "theory_started",
            EventKind::TheoryCompleted => "theory_completed",
            EventKind::TheoryFailed => "theory_failed",
            EventKind::SubjectsNarrowed => "subjects_narrowed",
            EventKind::ConflictDetected => "conflict_detected",
            EventKind::DecisionReached => "decision_reached",
            EventKind::ArbitrationCompleted => "arbitration_completed",
            EventKind::ArbitrationUnavailable => "arbitration_unavailable",
            EventKind::NarrativeCompleted => "narrative_completed",
            EventKind::NarrativeDegraded => "narrative_degraded",
            EventKind::NarrativeFailed => "narrative_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_narrowed_event() {
        let event = Event::subjects_narrowed("小六壬", 2);
        assert_eq!(event.kind, EventKind::SubjectsNarrowed);
        assert_eq!(event.theory.as_deref(), Some("小六壬"));
        assert_eq!(event.payload["ignored_persons"], 2);
        assert!(event.is_warning());
        assert_eq!(event.kind.as_str(), "subjects_narrowed");
    }
}
