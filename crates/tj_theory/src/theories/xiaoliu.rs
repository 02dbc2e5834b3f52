//! 小六壬 - 掌诀起课
//!
//! 月、日、时三数依次在六宫上顺数，末宫即为所得之课。
//! 任何整数输入都能落到某一宫，因此它是永远可用的兜底理论。

use chrono::{Datelike, Timelike};
use serde_json::json;

use tj_core::{Field, RawResult, Result, StandardAnswer, UserInput};

use crate::theory::{SpeedTier, Theory, TheoryDescriptor};
use crate::wuxing::Element;

/// 六宫
#[derive(Debug, Clone, Copy)]
pub struct Palace {
    pub name: &'static str,
    pub label: &'static str,
    pub element: Element,
    pub direction: &'static str,
    pub meaning: &'static str,
    pub score: f64,
    pub advice: &'static str,
}

/// 六宫顺序 (自大安起顺行)
pub const PALACES: [Palace; 6] = [
    Palace {
        name: "大安",
        label: "吉",
        element: Element::Wood,
        direction: "东",
        meaning: "平安、稳定",
        score: 0.75,
        advice: "事情平稳，可以按计划进行，不必着急",
    },
    Palace {
        name: "留连",
        label: "凶",
        element: Element::Earth,
        direction: "中",
        meaning: "拖延、纠缠",
        score: 0.3,
        advice: "事情有阻碍，容易拖延，建议耐心等待时机",
    },
    Palace {
        name: "速喜",
        label: "吉",
        element: Element::Fire,
        direction: "南",
        meaning: "喜事、快速",
        score: 0.9,
        advice: "吉利之象，事情进展快速，宜抓住机会",
    },
    Palace {
        name: "赤口",
        label: "凶",
        element: Element::Metal,
        direction: "西",
        meaning: "口舌、官非",
        score: 0.2,
        advice: "需防口舌是非，谨言慎行，避免争执",
    },
    Palace {
        name: "小吉",
        label: "吉",
        element: Element::Water,
        direction: "北",
        meaning: "小吉、和合",
        score: 0.65,
        advice: "小有吉利，事情顺利但不宜期望过高",
    },
    Palace {
        name: "空亡",
        label: "凶",
        element: Element::Earth,
        direction: "中",
        meaning: "落空、不成",
        score: 0.1,
        advice: "事情容易落空，建议重新评估或另作打算",
    },
];

/// 起课结果：月、日、时三宫序号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lesson {
    pub month_index: usize,
    pub day_index: usize,
    pub hour_index: usize,
}

impl Lesson {
    /// 月数定起宫，日数自月宫续数，时数自日宫续数
    pub fn cast(month: i64, day: i64, hour: i64) -> Self {
        // 先各自取模再相加，极端整数也不会溢出
        let month_index = (month.rem_euclid(6) + 5) % 6;
        let day_index = (month_index + day.rem_euclid(6) + 5) % 6;
        let hour_index = (day_index + hour.rem_euclid(6)) % 6;
        Self {
            month_index: month_index as usize,
            day_index: day_index as usize,
            hour_index: hour_index as usize,
        }
    }

    pub fn final_palace(&self) -> &'static Palace {
        &PALACES[self.hour_index]
    }
}

/// 小六壬
pub struct XiaoLiuRenTheory {
    descriptor: TheoryDescriptor,
}

impl XiaoLiuRenTheory {
    pub const NAME: &'static str = "小六壬";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Fast)
                .optional(Field::Numbers, 0.5)
                .optional(Field::BirthMonth, 0.2)
                .optional(Field::BirthDay, 0.2)
                .optional(Field::CurrentTime, 0.1)
                .min_completeness(0.0)
                .strengths([0.8, 0.3, 0.5, 0.7, 0.6, 0.4, 0.5, 0.3])
                .mbti_affinity([
                    0.6, 0.5, 0.7, 0.6, 0.5, 0.4, 0.6, 0.7, 0.9, 0.8, 0.9, 0.8, 0.6, 0.5, 0.7, 0.6,
                ]),
        }
    }

    /// 起课三数：优先用户数字，否则取当前时间 (时数为 小时/2)
    fn seed_numbers(input: &UserInput) -> ([i64; 3], &'static str) {
        match input.three_numbers() {
            Some(numbers) => (numbers, "数字起课"),
            None => {
                let t = input.current_time;
                (
                    [
                        i64::from(t.month()),
                        i64::from(t.day()),
                        i64::from(t.hour() / 2),
                    ],
                    "时间起课",
                )
            }
        }
    }
}

impl Default for XiaoLiuRenTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for XiaoLiuRenTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let ([month, day, hour], method) = Self::seed_numbers(input);
        let lesson = Lesson::cast(month, day, hour);
        let palace = lesson.final_palace();

        let details = json!({
            "method": method,
            "numbers": [month, day, hour],
            "month_palace": PALACES[lesson.month_index].name,
            "day_palace": PALACES[lesson.day_index].name,
            "final_palace": palace.name,
            "element": palace.element.label(),
            "direction": palace.direction,
            "meaning": palace.meaning,
        });

        Ok(RawResult::new(Self::NAME, palace.label, palace.score)
            .with_advice(palace.advice)
            .with_confidence(1.0)
            .with_details(details)
            .with_events(events))
    }

    fn to_standard_answer(&self, raw: &RawResult) -> StandardAnswer {
        // 小六壬只论吉凶，不论应期
        StandardAnswer {
            timing: None,
            ..StandardAnswer::from_raw(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tj_core::{EventKind, Judgment, PersonBirthInfo};

    use super::*;

    fn input_at(hour: u32) -> UserInput {
        let now = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap();
        UserInput::at("决策", "要不要接这个项目", now)
    }

    #[test]
    fn test_numbers_3_7_5_lands_on_liulian() {
        let theory = XiaoLiuRenTheory::new();
        let input = input_at(10).with_numbers(vec![3, 7, 5]);
        let raw = theory.calculate(&input).unwrap();
        assert_eq!(raw.details["month_palace"], "速喜");
        assert_eq!(raw.details["day_palace"], "速喜");
        assert_eq!(raw.details["final_palace"], "留连");

        let answer = theory.to_standard_answer(&raw);
        assert_eq!(answer.judgment, Judgment::Unfavorable);
        assert_eq!(answer.judgment_level, 0.3);
        assert_eq!(answer.confidence, 1.0);
        assert!(answer.timing.is_none());
    }

    #[test]
    fn test_first_number_only_matters_mod_six() {
        let a = Lesson::cast(3, 7, 5);
        let b = Lesson::cast(9, 7, 5);
        let c = Lesson::cast(-3, 7, 5);
        assert_eq!(a.final_palace().name, b.final_palace().name);
        assert_eq!(a.final_palace().name, c.final_palace().name);
    }

    #[test]
    fn test_total_over_integers() {
        for month in -20..20 {
            for day in -5..40 {
                let lesson = Lesson::cast(month, day, i64::from(day % 12));
                assert!(lesson.hour_index < 6);
            }
        }
    }

    #[test]
    fn test_extreme_numbers_still_land_on_a_palace() {
        let theory = XiaoLiuRenTheory::new();
        for numbers in [
            vec![i64::MIN, 7, 5],
            vec![i64::MAX, i64::MAX, i64::MAX],
            vec![i64::MIN, i64::MIN, i64::MIN],
        ] {
            let [m, d, h] = [numbers[0], numbers[1], numbers[2]];
            let raw = theory.calculate(&input_at(10).with_numbers(numbers)).unwrap();
            let expected = Lesson::cast(m.rem_euclid(6), d.rem_euclid(6), h.rem_euclid(6));
            assert_eq!(raw.details["final_palace"], expected.final_palace().name);
        }
        // i64::MIN ≡ 4 (mod 6)，与 4/7/5 同课
        assert_eq!(Lesson::cast(i64::MIN, 7, 5), Lesson::cast(4, 7, 5));
    }

    #[test]
    fn test_time_based_lesson() {
        // 3月15日 10点 => 月 3, 日 15, 时 5
        let theory = XiaoLiuRenTheory::new();
        let raw = theory.calculate(&input_at(10)).unwrap();
        assert_eq!(raw.details["method"], "时间起课");
        assert_eq!(raw.details["numbers"], json!([3, 15, 5]));
        let expected = Lesson::cast(3, 15, 5).final_palace().name;
        assert_eq!(raw.details["final_palace"], expected);
    }

    #[test]
    fn test_additional_persons_only_warn() {
        let theory = XiaoLiuRenTheory::new();
        let input = input_at(8)
            .with_numbers(vec![1, 1, 0])
            .with_person(PersonBirthInfo::new("同事", 1988, 8, 8));
        let raw = theory.calculate(&input).unwrap();
        assert_eq!(raw.details["final_palace"], "大安");
        assert_eq!(raw.events[0].kind, EventKind::SubjectsNarrowed);
    }

    #[test]
    fn test_is_fallback() {
        assert!(XiaoLiuRenTheory::new().descriptor().is_fallback());
    }
}
