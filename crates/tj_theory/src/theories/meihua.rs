//! 梅花易数 - 数字/外应/时间起卦
//!
//! 上卦、下卦按先天数取八卦，动爻取六。无动爻之卦为体，有动爻之卦为用，
//! 以用卦对体卦的五行生克断吉凶。

use chrono::{Datelike, Duration, Timelike};
use serde_json::json;

use tj_core::{Field, RawResult, Result, UserInput};

use crate::theory::{SpeedTier, Theory, TheoryDescriptor};
use crate::wuxing::{Element, Relation};

/// 先天八卦 (乾一兑二离三震四巽五坎六艮七坤八)
pub const TRIGRAMS: [&str; 8] = ["乾", "兑", "离", "震", "巽", "坎", "艮", "坤"];

pub(crate) const TRIGRAM_ELEMENTS: [Element; 8] = [
    Element::Metal,
    Element::Metal,
    Element::Fire,
    Element::Wood,
    Element::Wood,
    Element::Water,
    Element::Earth,
    Element::Earth,
];

/// 三爻阴阳，自下而上，true 为阳
const TRIGRAM_LINES: [[bool; 3]; 8] = [
    [true, true, true],
    [true, true, false],
    [true, false, true],
    [true, false, false],
    [false, true, true],
    [false, true, false],
    [false, false, true],
    [false, false, false],
];

/// 先天数 (可为任意整数) 转卦序
pub(crate) fn trigram_index(number: i64) -> usize {
    ((number.rem_euclid(8) + 7) % 8) as usize
}

/// 动爻 1-6
pub(crate) fn moving_line(number: i64) -> usize {
    ((number.rem_euclid(6) + 5) % 6 + 1) as usize
}

fn trigram_from_lines(lines: [bool; 3]) -> usize {
    TRIGRAM_LINES
        .iter()
        .position(|l| *l == lines)
        .unwrap_or(7)
}

/// 颜色取卦
fn color_trigram(color: &str) -> Option<i64> {
    let table: [(&str, i64); 10] = [
        ("白", 1),
        ("金", 1),
        ("粉", 2),
        ("红", 3),
        ("紫", 3),
        ("绿", 4),
        ("青", 5),
        ("黑", 6),
        ("蓝", 6),
        ("黄", 8),
    ];
    table
        .iter()
        .find(|(key, _)| color.contains(key))
        .map(|(_, n)| *n)
}

/// 方位取卦 (后天方位)，复合方位优先匹配
fn direction_trigram(direction: &str) -> Option<i64> {
    let table: [(&str, i64); 8] = [
        ("西北", 1),
        ("东南", 5),
        ("东北", 7),
        ("西南", 8),
        ("西", 2),
        ("南", 3),
        ("东", 4),
        ("北", 6),
    ];
    table
        .iter()
        .find(|(key, _)| direction.contains(key))
        .map(|(_, n)| *n)
}

/// 起卦
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cast {
    pub upper: usize,
    pub lower: usize,
    /// 1-6，自下而上
    pub moving: usize,
    pub method: &'static str,
}

impl Cast {
    pub fn from_numbers(upper: i64, lower: i64, moving: i64, method: &'static str) -> Self {
        Self {
            upper: trigram_index(upper),
            lower: trigram_index(lower),
            moving: moving_line(moving),
            method,
        }
    }

    /// 依输入的优先级起卦：数字 > 颜色/方位 > 汉字 > 时间
    pub fn from_input(input: &UserInput) -> Self {
        let t = input.current_time;

        if let Some(numbers) = input.numbers.as_deref() {
            if let [a, b, rest @ ..] = numbers {
                let moving = rest.first().copied().unwrap_or(a.wrapping_add(*b));
                return Self::from_numbers(*a, *b, moving, "数字起卦");
            }
        }

        let external = input
            .favorite_color
            .as_deref()
            .and_then(color_trigram)
            .or_else(|| input.current_direction.as_deref().and_then(direction_trigram));
        if let Some(gua) = external {
            let time_num = i64::from(t.hour() + t.minute());
            return Self::from_numbers(gua, time_num % 8 + 1, (gua + time_num) % 6 + 1, "外应起卦");
        }

        if let Some(ch) = input.character.as_deref().and_then(|s| s.trim().chars().next()) {
            let cp = i64::from(u32::from(ch));
            return Self::from_numbers(cp % 8 + 1, (cp / 8) % 8 + 1, cp % 6 + 1, "汉字起卦");
        }

        let base = i64::from(t.month() + t.day());
        let with_hour = base + i64::from(t.hour());
        Self::from_numbers(base, with_hour, with_hour, "时间起卦")
    }

    /// 动爻在下卦时下卦为用
    pub fn use_is_lower(&self) -> bool {
        self.moving <= 3
    }

    pub fn body(&self) -> usize {
        if self.use_is_lower() {
            self.upper
        } else {
            self.lower
        }
    }

    pub fn usage(&self) -> usize {
        if self.use_is_lower() {
            self.lower
        } else {
            self.upper
        }
    }

    /// 变卦 (上卦, 下卦)
    pub fn changed(&self) -> (usize, usize) {
        if self.use_is_lower() {
            let mut lines = TRIGRAM_LINES[self.lower];
            lines[self.moving - 1] = !lines[self.moving - 1];
            (self.upper, trigram_from_lines(lines))
        } else {
            let mut lines = TRIGRAM_LINES[self.upper];
            lines[self.moving - 4] = !lines[self.moving - 4];
            (trigram_from_lines(lines), self.lower)
        }
    }
}

/// 用卦对体卦的关系断语
fn judge(use_to_body: Relation) -> (&'static str, f64, &'static str) {
    match use_to_body {
        Relation::Generates => ("大吉", 0.85, "用生体，外力相助，事情易成，宜积极推进"),
        Relation::Same => ("吉", 0.7, "体用比和，内外协调，按部就班即可顺利"),
        Relation::OvercomeBy => ("小吉", 0.6, "体克用，事可成但需付出努力，掌握主动"),
        Relation::GeneratedBy => ("小凶", 0.35, "体生用，多有耗费，投入大于回报，宜节制"),
        Relation::Overcomes => ("凶", 0.2, "用克体，外部阻力大，不宜强求，宜守不宜攻"),
    }
}

/// 梅花易数
pub struct MeiHuaTheory {
    descriptor: TheoryDescriptor,
}

impl MeiHuaTheory {
    pub const NAME: &'static str = "梅花易数";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Fast)
                .optional(Field::Numbers, 0.3)
                .optional(Field::Character, 0.2)
                .optional(Field::FavoriteColor, 0.2)
                .optional(Field::CurrentDirection, 0.2)
                .optional(Field::CurrentTime, 0.1)
                .min_completeness(0.0)
                .strengths([0.7, 0.5, 0.7, 0.6, 0.5, 0.6, 0.8, 0.5])
                .mbti_affinity([
                    0.7, 0.8, 0.6, 0.9, 0.9, 0.8, 0.7, 0.9, 0.5, 0.6, 0.5, 0.6, 0.7, 0.8, 0.6, 0.8,
                ]),
        }
    }
}

impl Default for MeiHuaTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for MeiHuaTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let cast = Cast::from_input(input);
        let body = TRIGRAM_ELEMENTS[cast.body()];
        let usage = TRIGRAM_ELEMENTS[cast.usage()];
        let relation = usage.relation(body);
        let (label, level, advice) = judge(relation);
        let (changed_upper, changed_lower) = cast.changed();

        // 应期：上下卦先天数之和为天数，逢生体之五行日应验
        let days = (cast.upper + cast.lower + 2) as i64;
        let due = input.current_time.date() + Duration::days(days);
        let timing = format!(
            "{}日内 (约{}前后)，逢{}日应验",
            days,
            crate::ganzhi::format_date(due),
            body.generated_by().label()
        );

        let details = json!({
            "method": cast.method,
            "original": format!("上{}下{}", TRIGRAMS[cast.upper], TRIGRAMS[cast.lower]),
            "changed": format!("上{}下{}", TRIGRAMS[changed_upper], TRIGRAMS[changed_lower]),
            "moving_line": cast.moving,
            "body": format!("{}({})", TRIGRAMS[cast.body()], body.label()),
            "use": format!("{}({})", TRIGRAMS[cast.usage()], usage.label()),
            "relation": relation.label(),
        });

        Ok(RawResult::new(Self::NAME, label, level)
            .with_timing(timing)
            .with_advice(advice)
            .with_confidence(0.75)
            .with_details(details)
            .with_events(events))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tj_core::Judgment;

    use super::*;

    fn input() -> UserInput {
        let now = NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(14, 10, 0)
            .unwrap();
        UserInput::at("决策", "是否搬家", now)
    }

    #[test]
    fn test_numbers_cast() {
        // 上 1 乾，下 8 坤，动爻 3 (下卦为用)
        let cast = Cast::from_input(&input().with_numbers(vec![1, 8, 3]));
        assert_eq!(cast.method, "数字起卦");
        assert_eq!(TRIGRAMS[cast.upper], "乾");
        assert_eq!(TRIGRAMS[cast.lower], "坤");
        assert_eq!(cast.moving, 3);
        assert!(cast.use_is_lower());
        // 坤第三爻变阳为艮
        assert_eq!(cast.changed(), (0, 6));
    }

    #[test]
    fn test_two_numbers_use_sum_for_moving_line() {
        let cast = Cast::from_input(&input().with_numbers(vec![5, 6]));
        assert_eq!(cast.moving, moving_line(11));
    }

    #[test]
    fn test_body_use_relation() {
        // 乾(金)为体，坤(土)为用：土生金，用生体
        let theory = MeiHuaTheory::new();
        let raw = theory.calculate(&input().with_numbers(vec![1, 8, 3])).unwrap();
        assert_eq!(raw.label, "大吉");
        assert_eq!(raw.judgment_level, 0.85);
        assert_eq!(raw.details["relation"], Relation::Generates.label());
        let answer = theory.to_standard_answer(&raw);
        assert_eq!(answer.judgment, Judgment::Favorable);
        assert!(answer.timing.unwrap().contains("逢土日"));
    }

    #[test]
    fn test_source_priority() {
        let base = input().with_character("安").with_current_direction("西北");
        assert_eq!(Cast::from_input(&base).method, "外应起卦");
        let base = base.with_numbers(vec![2, 3, 4]);
        assert_eq!(Cast::from_input(&base).method, "数字起卦");
        assert_eq!(
            Cast::from_input(&input().with_character("安")).method,
            "汉字起卦"
        );
        assert_eq!(Cast::from_input(&input()).method, "时间起卦");
    }

    #[test]
    fn test_unrecognised_color_falls_through() {
        let cast = Cast::from_input(&input().with_favorite_color("透明"));
        assert_eq!(cast.method, "时间起卦");
    }

    #[test]
    fn test_deterministic() {
        let theory = MeiHuaTheory::new();
        let input = input().with_favorite_color("红色");
        let a = theory.calculate(&input).unwrap();
        let b = theory.calculate(&input).unwrap();
        assert_eq!(a.judgment_level, b.judgment_level);
        assert_eq!(a.details, b.details);
        assert_eq!(a.timing, b.timing);
    }

    #[test]
    fn test_extreme_numbers_are_total() {
        let theory = MeiHuaTheory::new();
        for numbers in [vec![i64::MIN, i64::MAX], vec![i64::MAX, i64::MAX, i64::MIN]] {
            let raw = theory.calculate(&input().with_numbers(numbers)).unwrap();
            assert!((0.0..=1.0).contains(&raw.judgment_level));
        }
        // i64::MIN ≡ 0 (mod 8) 为坤，≡ 4 (mod 6) 动四爻
        assert_eq!(trigram_index(i64::MIN), 7);
        assert_eq!(moving_line(i64::MIN), 4);
        assert_eq!(trigram_index(i64::MAX), 6);
    }

    #[test]
    fn test_negative_numbers_are_total() {
        let cast = Cast::from_input(&input().with_numbers(vec![-7, 0, -1]));
        assert!(cast.upper < 8 && cast.lower < 8);
        assert!((1..=6).contains(&cast.moving));
    }
}
