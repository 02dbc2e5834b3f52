//! # tj_theory - 术数理论层
//!
//! 理论能力契约、五行干支基础运算，以及八种内置理论的纯代码排盘实现。
//! 所有计算均为同步且确定的，由上层引擎负责调度与超时。

pub mod ganzhi;
pub mod registry;
pub mod theories;
pub mod theory;
pub mod wuxing;

pub use registry::TheoryRegistry;
pub use theory::{mbti_index, native_label, SpeedTier, Theory, TheoryDescriptor, MBTI_TYPES};
pub use wuxing::{Element, Relation};
