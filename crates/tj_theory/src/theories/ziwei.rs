//! 紫微斗数 - 命宫与问事宫主星
//!
//! 以生月、生时定命宫，以生日定紫微星位并顺布主星，
//! 命宫主星与所问之宫主星共同决定吉凶。

use chrono::Datelike;
use serde_json::json;

use tj_core::{
    BirthTimeCertainty, CalendarType, Field, QuestionCategory, RawResult, Result, UserInput,
};

use crate::ganzhi::{hour_branch, year_cycle_index, BRANCHES};
use crate::theory::{calculation_error, native_label, SpeedTier, Theory, TheoryDescriptor};

/// 十四主星及其吉度
pub const STARS: [(&str, f64); 14] = [
    ("紫微", 0.85),
    ("天机", 0.65),
    ("太阳", 0.75),
    ("武曲", 0.7),
    ("天同", 0.7),
    ("廉贞", 0.45),
    ("天府", 0.8),
    ("太阴", 0.7),
    ("贪狼", 0.5),
    ("巨门", 0.35),
    ("天相", 0.7),
    ("天梁", 0.75),
    ("七杀", 0.4),
    ("破军", 0.3),
];

/// 十二宫 (自命宫逆行)
pub const PALACES: [&str; 12] = [
    "命宫", "兄弟", "夫妻", "子女", "财帛", "疾厄", "迁移", "交友", "官禄", "田宅", "福德", "父母",
];

/// 问题类别对应的宫位偏移
fn palace_offset(question_type: &str) -> usize {
    match QuestionCategory::parse(question_type) {
        Some(QuestionCategory::Career) => 8,
        Some(QuestionCategory::Wealth) => 4,
        Some(QuestionCategory::Romance) | Some(QuestionCategory::Marriage) => 2,
        Some(QuestionCategory::Health) => 5,
        Some(QuestionCategory::Study) => 11,
        Some(QuestionCategory::Relations) => 7,
        Some(QuestionCategory::Timing) | Some(QuestionCategory::Decision) => 6,
        Some(QuestionCategory::Personality) | None => 0,
    }
}

/// 命盘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chart {
    /// 命宫地支
    pub ming: usize,
    /// 紫微星所在地支
    pub ziwei: usize,
    /// 生年地支 (主星起布偏移)
    pub year_branch: usize,
}

impl Chart {
    pub fn compute(year: i32, month: u32, day: u32, hour: u32) -> Self {
        let hb = hour_branch(hour) as i64;
        let ming = (2 + (i64::from(month) - 1) - hb).rem_euclid(12) as usize;
        let ziwei = (i64::from(day) + 1).rem_euclid(12) as usize;
        Self {
            ming,
            ziwei,
            year_branch: year_cycle_index(year) % 12,
        }
    }

    /// 第 offset 宫的地支
    pub fn palace_branch(&self, offset: usize) -> usize {
        (self.ming + 12 - offset % 12) % 12
    }

    /// 某地支宫位的主星
    pub fn star_at(&self, branch: usize) -> (&'static str, f64) {
        let from_ziwei = (branch + 12 - self.ziwei) % 12;
        STARS[(from_ziwei + self.year_branch) % STARS.len()]
    }

    /// 五行局数 (2-6)，决定起运岁数
    pub fn bureau(&self) -> u32 {
        2 + (self.ming % 5) as u32
    }
}

/// 紫微斗数
pub struct ZiWeiTheory {
    descriptor: TheoryDescriptor,
}

impl ZiWeiTheory {
    pub const NAME: &'static str = "紫微斗数";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Basic)
                .require(&[
                    Field::QuestionType,
                    Field::QuestionDescription,
                    Field::BirthYear,
                    Field::BirthMonth,
                    Field::BirthDay,
                    Field::BirthHour,
                ])
                .optional(Field::CalendarType, 0.05)
                .min_completeness(0.95)
                .hour_sensitive()
                .strengths([0.2, 0.1, 0.9, 0.8, 0.9, 0.6, 0.7, 0.9])
                .mbti_affinity([
                    0.8, 0.9, 0.7, 0.6, 0.8, 0.9, 0.7, 0.6, 0.8, 0.9, 0.7, 0.8, 0.7, 0.8, 0.6, 0.7,
                ]),
        }
    }
}

impl Default for ZiWeiTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for ZiWeiTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let (Some(year), Some(month), Some(day), Some(hour)) = (
            input.birth_year,
            input.birth_month,
            input.birth_day,
            input.birth_hour,
        ) else {
            return Err(calculation_error(Self::NAME, "出生信息不完整"));
        };
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 {
            return Err(calculation_error(
                Self::NAME,
                format!("无效的出生信息 {month}月{day}日{hour}时"),
            ));
        }

        let chart = Chart::compute(year, month, day, hour);
        let offset = palace_offset(&input.question_type);
        let question_branch = chart.palace_branch(offset);
        let (ming_star, ming_score) = chart.star_at(chart.ming);
        let (question_star, question_score) = chart.star_at(question_branch);

        let level = 0.4 * ming_score + 0.6 * question_score;

        // 大限：自命宫起，每十年一宫
        let bureau = chart.bureau();
        let age = (input.current_time.year() - year).max(0) as u32;
        let period = age.saturating_sub(bureau) / 10;
        let period_branch = (chart.ming + period as usize) % 12;
        let next_start = bureau + (period + 1) * 10;
        let (next_star, _) = chart.star_at((period_branch + 1) % 12);
        let timing = format!(
            "{}岁起行{}宫大限，主星{}",
            next_start,
            BRANCHES[(period_branch + 1) % 12],
            next_star
        );

        let advice = if question_score >= 0.7 {
            format!("{}宫得{}坐守，此事可积极争取", PALACES[offset], question_star)
        } else if question_score >= 0.5 {
            format!("{}宫主星{}，吉凶参半，宜稳中求进", PALACES[offset], question_star)
        } else {
            format!("{}宫逢{}，多有波折，宜守成待时", PALACES[offset], question_star)
        };

        let confidence = 0.8
            * match input.birth_time_certainty {
                BirthTimeCertainty::Certain => 1.0,
                BirthTimeCertainty::Uncertain => 0.9,
                BirthTimeCertainty::Unknown => 0.75,
            };

        let calendar = match input.calendar_type {
            Some(CalendarType::Lunar) => "农历",
            _ => "公历近似",
        };

        let details = json!({
            "calendar": calendar,
            "ming_palace": BRANCHES[chart.ming],
            "ming_star": ming_star,
            "question_palace": PALACES[offset],
            "question_branch": BRANCHES[question_branch],
            "question_star": question_star,
            "bureau": bureau,
            "current_period": format!("{}宫大限", BRANCHES[period_branch]),
        });

        Ok(RawResult::new(Self::NAME, native_label(level), level)
            .with_timing(timing)
            .with_advice(advice)
            .with_confidence(confidence)
            .with_details(details)
            .with_events(events))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tj_core::TianjiError;

    use super::*;

    fn input(question_type: &str) -> UserInput {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        UserInput::at(question_type, "未来发展如何", now).with_birth(1990, 5, 15)
    }

    #[test]
    fn test_ming_palace() {
        // 五月子时：寅起正月顺数至五月为午，子时不逆 => 午
        let chart = Chart::compute(1990, 5, 15, 0);
        assert_eq!(BRANCHES[chart.ming], "午");
        // 五月午时：自午逆数六位 => 子
        let chart = Chart::compute(1990, 5, 15, 12);
        assert_eq!(BRANCHES[chart.ming], "子");
    }

    #[test]
    fn test_requires_hour() {
        let err = ZiWeiTheory::new().calculate(&input("事业")).unwrap_err();
        match err {
            TianjiError::InsufficientData { missing, .. } => {
                assert_eq!(missing, vec![Field::BirthHour]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_level_blends_ming_and_question_palace() {
        let theory = ZiWeiTheory::new();
        let raw = theory.calculate(&input("事业").with_birth_hour(8)).unwrap();
        let chart = Chart::compute(1990, 5, 15, 8);
        let (_, ming) = chart.star_at(chart.ming);
        let (_, career) = chart.star_at(chart.palace_branch(8));
        assert!((raw.judgment_level - (0.4 * ming + 0.6 * career)).abs() < 1e-9);
        assert_eq!(raw.details["question_palace"], "官禄");
        assert!(raw.timing.is_some());
    }

    #[test]
    fn test_personality_reads_ming_palace_only() {
        let theory = ZiWeiTheory::new();
        let raw = theory.calculate(&input("性格").with_birth_hour(8)).unwrap();
        assert_eq!(raw.details["ming_star"], raw.details["question_star"]);
    }

    #[test]
    fn test_invalid_month_is_calculation_error() {
        let mut input = input("事业").with_birth_hour(8);
        input.birth_month = Some(13);
        let err = ZiWeiTheory::new().calculate(&input).unwrap_err();
        assert!(matches!(err, TianjiError::Calculation { .. }));
    }
}
