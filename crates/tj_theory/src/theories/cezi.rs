//! 测字术
//!
//! 以所写之字定五行，与问题所属五行论生克。

use chrono::Timelike;
use serde_json::json;

use tj_core::{Field, QuestionCategory, RawResult, Result, UserInput};

use crate::theory::{calculation_error, SpeedTier, Theory, TheoryDescriptor};
use crate::wuxing::{Element, Relation};

/// 字的五行：按码位取模
pub fn glyph_element(glyph: char) -> Element {
    Element::ALL[(u32::from(glyph) % 5) as usize]
}

/// 问题所属五行
pub fn question_element(question_type: &str) -> Element {
    match QuestionCategory::parse(question_type) {
        Some(QuestionCategory::Career) | Some(QuestionCategory::Study) => Element::Wood,
        Some(QuestionCategory::Wealth) | Some(QuestionCategory::Decision) => Element::Metal,
        Some(QuestionCategory::Romance) | Some(QuestionCategory::Marriage) => Element::Fire,
        Some(QuestionCategory::Health) => Element::Water,
        _ => Element::Earth,
    }
}

/// 测字术
pub struct CeZiTheory {
    descriptor: TheoryDescriptor,
}

impl CeZiTheory {
    pub const NAME: &'static str = "测字术";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Fast)
                .require(&[Field::QuestionDescription, Field::Character])
                .optional(Field::CurrentTime, 0.1)
                .min_completeness(0.7)
                .strengths([0.6, 0.2, 0.9, 0.4, 0.3, 0.3, 0.9, 0.4])
                .mbti_affinity([
                    0.5, 0.6, 0.4, 0.7, 0.9, 0.9, 0.8, 0.9, 0.4, 0.7, 0.3, 0.8, 0.5, 0.9, 0.4, 0.9,
                ]),
        }
    }
}

impl Default for CeZiTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for CeZiTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let glyph = input
            .character
            .as_deref()
            .and_then(|s| s.trim().chars().next())
            .ok_or_else(|| calculation_error(Self::NAME, "未提供可测之字"))?;

        let glyph_el = glyph_element(glyph);
        let question_el = question_element(&input.question_type);
        let relation = glyph_el.relation(question_el);

        let (level, advice) = match relation {
            Relation::Generates => (0.8, format!("「{glyph}」字生扶所问之事，得助力，宜顺势而为")),
            Relation::Same => (0.7, format!("「{glyph}」字与所问同气，心意相合，稳步推进")),
            Relation::GeneratedBy => (0.6, format!("所问之事生「{glyph}」字，需先付出，方有所得")),
            Relation::Overcomes => (0.45, format!("「{glyph}」字克所问之事，主观意愿过强，宜放缓节奏")),
            Relation::OvercomeBy => (0.25, format!("所问之事克「{glyph}」字，阻力在外，暂不宜轻动")),
        };

        // 测字应期取当前时辰起算的一个时辰周期
        let hour = input.current_time.hour();
        let timing = format!("{}时至{}时之间有所显现", (hour + 2) % 24, (hour + 4) % 24);

        let details = json!({
            "character": glyph.to_string(),
            "code_point": u32::from(glyph),
            "glyph_element": glyph_el.label(),
            "question_element": question_el.label(),
            "relation": relation.label(),
        });

        Ok(
            RawResult::new(Self::NAME, crate::theory::native_label(level), level)
                .with_timing(timing)
                .with_advice(advice)
                .with_confidence(0.6)
                .with_details(details)
                .with_events(events),
        )
    }
}
