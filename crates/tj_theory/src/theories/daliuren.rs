//! 大六壬 - 月将加时与初传天将
//!
//! 以月将加占时得天地盘，日干寄宫上神为初课，按贵人起天将。
//! 起课时间优先取首次问询时间。

use chrono::{Datelike, Timelike};
use serde_json::json;

use tj_core::{Field, RawResult, Result, UserInput};

use crate::ganzhi::{branch_element, day_cycle_index, hour_branch, stem_element, BRANCHES, STEMS};
use crate::theory::{native_label, SpeedTier, Theory, TheoryDescriptor};
use crate::wuxing::Relation;

/// 十天干寄宫 (甲寄寅，乙寄辰 ...)
const STEM_LODGING: [usize; 10] = [2, 4, 5, 7, 5, 7, 8, 10, 11, 1];

/// 十二天将及其吉度 (自贵人起)
pub const GENERALS: [(&str, f64); 12] = [
    ("贵人", 0.85),
    ("螣蛇", 0.3),
    ("朱雀", 0.4),
    ("六合", 0.75),
    ("勾陈", 0.35),
    ("青龙", 0.85),
    ("天空", 0.3),
    ("白虎", 0.15),
    ("太常", 0.7),
    ("玄武", 0.25),
    ("太阴", 0.65),
    ("天后", 0.7),
];

/// 日干贵人所临地支
fn noble_branch(stem: usize) -> usize {
    match stem % 10 {
        0 | 4 | 6 => 1,
        1 | 5 => 0,
        2 | 3 => 11,
        8 | 9 => 3,
        _ => 6,
    }
}

/// 月将 (按公历月近似：一月子将，二月亥将，逆行)
pub fn monthly_general(month: u32) -> usize {
    (13 - i64::from(month)).rem_euclid(12) as usize
}

/// 课体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lesson {
    pub general: usize,
    pub hour_branch: usize,
    pub day_stem: usize,
    /// 初课上神
    pub upper: usize,
    /// 初课天将序号
    pub heavenly_general: usize,
}

impl Lesson {
    pub fn cast(month: u32, hour_branch: usize, day_stem: usize) -> Self {
        let general = monthly_general(month);
        let offset = (general as i64 - hour_branch as i64).rem_euclid(12) as usize;
        let upper = (STEM_LODGING[day_stem % 10] + offset) % 12;
        let noble = noble_branch(day_stem);
        let heavenly_general = (upper as i64 - noble as i64).rem_euclid(12) as usize;
        Self {
            general,
            hour_branch,
            day_stem: day_stem % 10,
            upper,
            heavenly_general,
        }
    }

    /// 上神对日干的生克修正
    pub fn stem_adjustment(&self) -> f64 {
        match branch_element(self.upper).relation(stem_element(self.day_stem)) {
            Relation::Same | Relation::Generates => 0.1,
            Relation::Overcomes => -0.1,
            Relation::GeneratedBy | Relation::OvercomeBy => 0.0,
        }
    }
}

/// 大六壬
pub struct DaLiuRenTheory {
    descriptor: TheoryDescriptor,
}

impl DaLiuRenTheory {
    pub const NAME: &'static str = "大六壬";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Deep)
                .require(&[Field::QuestionDescription, Field::CurrentTime])
                .optional(Field::InitialInquiryTime, 0.3)
                .min_completeness(0.6)
                .strengths([0.8, 0.7, 0.7, 0.7, 0.7, 0.85, 0.5, 0.8])
                .mbti_affinity([
                    0.7, 0.6, 0.8, 0.7, 0.6, 0.5, 0.7, 0.6, 0.8, 0.6, 0.9, 0.7, 0.7, 0.5, 0.8, 0.6,
                ]),
        }
    }
}

impl Default for DaLiuRenTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for DaLiuRenTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let t = input.divination_time();
        let day_stem = day_cycle_index(t.date()) % 10;
        let lesson = Lesson::cast(t.month(), hour_branch(t.hour()), day_stem);
        let (general_name, general_score) = GENERALS[lesson.heavenly_general];
        let level = (general_score + lesson.stem_adjustment()).clamp(0.0, 1.0);

        let upper = BRANCHES[lesson.upper];
        let advice = if level >= 0.7 {
            format!("初传{}乘{}，贵气相扶，所谋可成", upper, general_name)
        } else if level >= 0.45 {
            format!("初传{}乘{}，事有起伏，宜守正待变", upper, general_name)
        } else {
            format!("初传{}乘{}，凶将临身，宜谨慎防范", upper, general_name)
        };

        let details = json!({
            "divination_time": t.format("%Y-%m-%d %H:%M").to_string(),
            "uses_initial_inquiry": input.initial_inquiry_time.is_some(),
            "monthly_general": BRANCHES[lesson.general],
            "hour_branch": BRANCHES[lesson.hour_branch],
            "day_stem": STEMS[lesson.day_stem],
            "first_lesson": upper,
            "heavenly_general": general_name,
        });

        Ok(RawResult::new(Self::NAME, native_label(level), level)
            .with_timing(format!("应在{}日或{}月", upper, upper))
            .with_advice(advice)
            .with_confidence(0.75)
            .with_details(details)
            .with_events(events))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(month: u32, day: u32, hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_monthly_general() {
        assert_eq!(BRANCHES[monthly_general(1)], "子");
        assert_eq!(BRANCHES[monthly_general(2)], "亥");
        assert_eq!(BRANCHES[monthly_general(12)], "丑");
    }

    #[test]
    fn test_lesson_cast() {
        // 二月亥将加子时，甲日寄寅 => 上神丑，甲日贵人在丑 => 贵人
        let lesson = Lesson::cast(2, 0, 0);
        assert_eq!(BRANCHES[lesson.upper], "丑");
        assert_eq!(GENERALS[lesson.heavenly_general].0, "贵人");
    }

    #[test]
    fn test_initial_inquiry_time_takes_precedence() {
        let theory = DaLiuRenTheory::new();
        let plain = UserInput::at("决策", "合作能否成功", at(5, 20, 10));
        let earlier = plain.clone().with_initial_inquiry_time(at(2, 3, 0));
        let a = theory.calculate(&plain).unwrap();
        let b = theory.calculate(&earlier).unwrap();
        assert_eq!(a.details["uses_initial_inquiry"], false);
        assert_eq!(b.details["uses_initial_inquiry"], true);
        assert_eq!(b.details["divination_time"], "2024-02-03 00:00");
    }

    #[test]
    fn test_level_in_unit_range() {
        let theory = DaLiuRenTheory::new();
        for month in 1..=12 {
            for hour in [0, 5, 11, 17, 23] {
                let raw = theory
                    .calculate(&UserInput::at("事业", "q", at(month, 7, hour)))
                    .unwrap();
                assert!((0.0..=1.0).contains(&raw.judgment_level));
                assert!(raw.timing.as_deref().unwrap().starts_with("应在"));
            }
        }
    }

    #[test]
    fn test_requires_description() {
        let err = DaLiuRenTheory::new()
            .calculate(&UserInput::at("事业", "", at(1, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, tj_core::TianjiError::InsufficientData { .. }));
    }
}
