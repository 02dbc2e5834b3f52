//! 理论注册表
//!
//! 注册顺序即排序时的稳定次序 (适配度相同时先注册者优先)。

use std::collections::HashMap;
use std::sync::Arc;

use crate::theories::{
    BaZiTheory, CeZiTheory, DaLiuRenTheory, LiuYaoTheory, MeiHuaTheory, QiMenTheory,
    XiaoLiuRenTheory, ZiWeiTheory,
};
use crate::theory::Theory;

/// 理论注册表
#[derive(Clone, Default)]
pub struct TheoryRegistry {
    theories: Vec<Arc<dyn Theory>>,
    index: HashMap<String, usize>,
}

impl TheoryRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部内置理论
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(XiaoLiuRenTheory::new()));
        registry.register(Arc::new(MeiHuaTheory::new()));
        registry.register(Arc::new(CeZiTheory::new()));
        registry.register(Arc::new(BaZiTheory::new()));
        registry.register(Arc::new(ZiWeiTheory::new()));
        registry.register(Arc::new(QiMenTheory::new()));
        registry.register(Arc::new(LiuYaoTheory::new()));
        registry.register(Arc::new(DaLiuRenTheory::new()));
        registry
    }

    /// 注册理论，同名理论原位替换
    pub fn register(&mut self, theory: Arc<dyn Theory>) {
        let name = theory.name().to_string();
        match self.index.get(&name) {
            Some(&position) => {
                tracing::warn!("理论 {name} 已注册，替换原有实现");
                self.theories[position] = theory;
            }
            None => {
                tracing::debug!("注册理论 {name}");
                self.index.insert(name, self.theories.len());
                self.theories.push(theory);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Theory>> {
        self.index.get(name).map(|&i| Arc::clone(&self.theories[i]))
    }

    /// 注册序号
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Theory>> {
        self.theories.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.theories.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.theories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theories.is_empty()
    }

    /// 第一个兜底理论 (无必需字段且最小完备度为 0)
    pub fn fallback(&self) -> Option<Arc<dyn Theory>> {
        self.theories
            .iter()
            .find(|t| t.descriptor().is_fallback())
            .cloned()
    }
}

impl std::fmt::Debug for TheoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TheoryRegistry")
            .field("theories", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tj_core::{RawResult, Result, UserInput};

    use super::*;
    use crate::theory::{SpeedTier, TheoryDescriptor};

    struct Fixed {
        descriptor: TheoryDescriptor,
        level: f64,
    }

    impl Theory for Fixed {
        fn descriptor(&self) -> &TheoryDescriptor {
            &self.descriptor
        }

        fn calculate(&self, _input: &UserInput) -> Result<RawResult> {
            Ok(RawResult::new(self.name(), "平", self.level))
        }
    }

    #[test]
    fn test_default_registration_order() {
        let registry = TheoryRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["小六壬", "梅花易数", "测字术", "八字", "紫微斗数", "奇门遁甲", "六爻", "大六壬"]
        );
        assert_eq!(registry.position("八字"), Some(3));
        assert_eq!(registry.fallback().unwrap().name(), "小六壬");
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut registry = TheoryRegistry::with_defaults();
        registry.register(Arc::new(Fixed {
            descriptor: TheoryDescriptor::new("八字", SpeedTier::Fast),
            level: 0.5,
        }));
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.position("八字"), Some(3));
        assert_eq!(registry.get("八字").unwrap().descriptor().speed, SpeedTier::Fast);
    }

    #[test]
    fn test_empty_registry_has_no_fallback() {
        let registry = TheoryRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.fallback().is_none());
        assert!(registry.get("小六壬").is_none());
    }
}
