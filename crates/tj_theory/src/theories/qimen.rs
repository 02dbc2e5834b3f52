//! 奇门遁甲 - 时家奇门简盘
//!
//! 夏至后用阴遁，冬至后用阳遁；以节气序数定局，以时辰转值使门与值符星。

use chrono::{Datelike, Timelike};
use serde_json::json;

use tj_core::{Field, QuestionCategory, RawResult, Result, UserInput};

use crate::ganzhi::{branch_hours, cycle_name, hour_branch, year_cycle_index, BRANCHES};
use crate::theory::{native_label, SpeedTier, Theory, TheoryDescriptor};

/// 八门及其吉度
pub const DOORS: [(&str, f64); 8] = [
    ("休门", 0.7),
    ("生门", 0.85),
    ("伤门", 0.3),
    ("杜门", 0.35),
    ("景门", 0.55),
    ("死门", 0.1),
    ("惊门", 0.25),
    ("开门", 0.8),
];

/// 九星及其吉度
pub const STARS: [(&str, f64); 9] = [
    ("天蓬", 0.3),
    ("天芮", 0.25),
    ("天冲", 0.7),
    ("天辅", 0.8),
    ("天禽", 0.6),
    ("天心", 0.8),
    ("天柱", 0.35),
    ("天任", 0.7),
    ("天英", 0.5),
];

/// 休、生、开三吉门
const AUSPICIOUS_DOORS: [usize; 3] = [0, 1, 7];

/// 局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub yang: bool,
    /// 1-9
    pub ju: usize,
}

impl Board {
    /// 冬至 (约第 356 日) 至夏至 (约第 172 日) 为阳遁
    pub fn for_ordinal(ordinal: u32) -> Self {
        Self {
            yang: !(172..356).contains(&ordinal),
            ju: ((ordinal / 5) % 9 + 1) as usize,
        }
    }

    pub fn door_index(&self, hour_branch: usize) -> usize {
        if self.yang {
            (self.ju + hour_branch) % 8
        } else {
            (self.ju as i64 - hour_branch as i64).rem_euclid(8) as usize
        }
    }

    pub fn star_index(&self, hour_branch: usize, category: usize) -> usize {
        (self.ju + hour_branch + category) % 9
    }

    /// 当前时辰之后 (含当前) 第一个值吉门的时辰
    pub fn next_auspicious_branch(&self, from: usize) -> Option<usize> {
        (0..12)
            .map(|step| (from + step) % 12)
            .find(|b| AUSPICIOUS_DOORS.contains(&self.door_index(*b)))
    }
}

/// 奇门遁甲
pub struct QiMenTheory {
    descriptor: TheoryDescriptor,
}

impl QiMenTheory {
    pub const NAME: &'static str = "奇门遁甲";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Deep)
                .require(&[
                    Field::QuestionType,
                    Field::QuestionDescription,
                    Field::CurrentTime,
                ])
                .optional(Field::BirthYear, 0.05)
                .optional(Field::BirthMonth, 0.05)
                .optional(Field::BirthDay, 0.05)
                .min_completeness(0.7)
                .strengths([0.9, 0.8, 0.6, 0.85, 0.7, 0.9, 0.4, 0.6])
                .mbti_affinity([
                    0.9, 0.7, 0.9, 0.8, 0.6, 0.5, 0.7, 0.6, 0.8, 0.6, 0.9, 0.7, 0.8, 0.5, 0.9, 0.6,
                ]),
        }
    }
}

impl Default for QiMenTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for QiMenTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let now = input.current_time;
        let board = Board::for_ordinal(now.ordinal());
        let hb = hour_branch(now.hour());
        let category = QuestionCategory::parse(&input.question_type)
            .map(|c| c.index())
            .unwrap_or(0);

        let (door, door_score) = DOORS[board.door_index(hb)];
        let (star, star_score) = STARS[board.star_index(hb, category)];
        let level = 0.6 * door_score + 0.4 * star_score;

        let timing = board.next_auspicious_branch(hb).map(|b| {
            let (start, end) = branch_hours(b);
            let (door, _) = DOORS[board.door_index(b)];
            format!("{}时 ({}:00-{}:00) 值{}，宜行动", BRANCHES[b], start, end, door)
        });

        let advice = if door_score >= 0.7 {
            format!("值使{}，{}当值，时机有利，可主动出击", door, star)
        } else if door_score >= 0.5 {
            format!("值使{}，宜先谋划，择吉时而动", door)
        } else {
            format!("值使{}，局势不利，宜避其锋芒，等待吉门", door)
        };

        let details = json!({
            "dun": if board.yang { "阳遁" } else { "阴遁" },
            "ju": board.ju,
            "hour_branch": BRANCHES[hb],
            "door": door,
            "star": star,
            "birth_year_pillar": input.birth_year.map(|y| cycle_name(year_cycle_index(y))),
        });

        let mut raw = RawResult::new(Self::NAME, native_label(level), level)
            .with_advice(advice)
            .with_confidence(0.8)
            .with_details(details)
            .with_events(events);
        if let Some(timing) = timing {
            raw = raw.with_timing(timing);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn input(month: u32, day: u32, hour: u32) -> UserInput {
        let now = NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        UserInput::at("决策", "下周是否签约", now)
    }

    #[test]
    fn test_dun_by_season() {
        assert!(Board::for_ordinal(10).yang);
        assert!(!Board::for_ordinal(200).yang);
        assert!(Board::for_ordinal(360).yang);
        assert!((1..=9).contains(&Board::for_ordinal(365).ju));
    }

    #[test]
    fn test_yin_dun_rotates_backwards() {
        let yang = Board { yang: true, ju: 3 };
        let yin = Board { yang: false, ju: 3 };
        assert_eq!(yang.door_index(2), 5);
        assert_eq!(yin.door_index(2), 1);
        assert_eq!(yin.door_index(5), 6);
    }

    #[test]
    fn test_level_blends_door_and_star() {
        let input = input(3, 10, 9);
        let raw = QiMenTheory::new().calculate(&input).unwrap();
        let board = Board::for_ordinal(input.current_time.ordinal());
        let hb = hour_branch(9);
        let expected = 0.6 * DOORS[board.door_index(hb)].1
            + 0.4 * STARS[board.star_index(hb, QuestionCategory::Decision.index())].1;
        assert!((raw.judgment_level - expected).abs() < 1e-9);
        assert_eq!(raw.confidence, 0.8);
    }

    #[test]
    fn test_timing_points_at_auspicious_door() {
        let raw = QiMenTheory::new().calculate(&input(7, 1, 15)).unwrap();
        let timing = raw.timing.unwrap();
        assert!(["休门", "生门", "开门"].iter().any(|d| timing.contains(d)));
    }

    #[test]
    fn test_every_board_has_auspicious_hour() {
        for ordinal in 1..=366 {
            let board = Board::for_ordinal(ordinal);
            assert!(board.next_auspicious_branch(0).is_some());
        }
    }
}
