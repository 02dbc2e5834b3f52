//! # tj_core - Tianji Core Primitives
//!
//! 核心原语层，定义用户输入、标准答案、分析事件与全局错误处理机制。
//! 此 crate 是整个项目的基础依赖，不依赖其他业务 crate。

pub mod answer;
pub mod error;
pub mod event;
pub mod input;
pub mod question;

pub use answer::{clamp_unit, Judgment, RawResult, StandardAnswer};
pub use error::{Result, TianjiError};
pub use event::{Event, EventKind};
pub use input::{BirthTimeCertainty, CalendarType, Field, Gender, PersonBirthInfo, UserInput};
pub use question::{question_features, QuestionCategory, FEATURE_DIMS};
