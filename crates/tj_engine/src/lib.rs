//! # tj_engine - Tianji Decision Engine
//!
//! 决策层：按适配度选择理论，并行或顺序执行并容忍部分失败，
//! 融合各理论答案并检测冲突，严重冲突时引入第三方理论裁决，
//! 最后经叙事降级链生成解读。
//!
//! 理论注册表只读共享，每次问询的中间状态由该次问询独占。

pub mod arbitration;
pub mod config;
pub mod engine;
pub mod narrative;
pub mod resolver;
pub mod selector;

pub use arbitration::{ArbitrationRecord, Arbitrator};
pub use config::{
    ArbitrationConfig, EngineConfig, ExecutionConfig, NarrativeConfig, ResolverConfig,
    SelectorConfig,
};
pub use engine::{AnalysisReport, DecisionEngine, ProgressStatus};
pub use narrative::{Narrative, NarrativeChain, NarrativeGenerator, SimplifiedNarrator};
pub use resolver::{
    AdviceEntry, ConflictLevel, ConflictRecord, ConflictResolver, Contribution,
    ContributingAnswer, FinalDecision, ResolutionStrategy,
};
pub use selector::{
    calculate_mbti_matching, calculate_question_matching, SelectedTheory, Selection,
    TheoryScore, TheorySelector,
};
