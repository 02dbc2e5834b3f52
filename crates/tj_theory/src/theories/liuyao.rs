//! 六爻 - 纳甲装卦与用神
//!
//! 数字起卦后按简化纳甲为六爻配地支，以上卦五行为宫，定六亲，
//! 再以动爻五行对用神五行的生克断事。

use chrono::{Datelike, Timelike};
use serde_json::json;

use tj_core::{Field, Gender, QuestionCategory, RawResult, Result, UserInput};

use crate::ganzhi::{branch_element, format_date, next_branch_day, BRANCHES};
use crate::theory::{calculation_error, native_label, SpeedTier, Theory, TheoryDescriptor};
use crate::wuxing::{Element, Relation};

use super::meihua::{moving_line, trigram_index, TRIGRAMS, TRIGRAM_ELEMENTS};

/// 六亲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relative {
    Sibling,
    Offspring,
    Wealth,
    Officer,
    Parent,
}

impl Relative {
    pub fn label(&self) -> &'static str {
        match self {
            Relative::Sibling => "兄弟",
            Relative::Offspring => "子孙",
            Relative::Wealth => "妻财",
            Relative::Officer => "官鬼",
            Relative::Parent => "父母",
        }
    }

    /// 以宫五行定某五行的六亲
    pub fn of(palace: Element, element: Element) -> Self {
        match palace.relation(element) {
            Relation::Same => Relative::Sibling,
            Relation::Generates => Relative::Offspring,
            Relation::Overcomes => Relative::Wealth,
            Relation::OvercomeBy => Relative::Officer,
            Relation::GeneratedBy => Relative::Parent,
        }
    }

    /// 某六亲对应的五行
    pub fn element(&self, palace: Element) -> Element {
        match self {
            Relative::Sibling => palace,
            Relative::Offspring => palace.generates(),
            Relative::Wealth => palace.overcomes(),
            Relative::Officer => Element::from_index(palace.index() + 3),
            Relative::Parent => palace.generated_by(),
        }
    }

    /// 问题类别取用神
    pub fn useful_for(question_type: &str, gender: Option<Gender>) -> Self {
        match QuestionCategory::parse(question_type) {
            Some(QuestionCategory::Wealth) => Relative::Wealth,
            Some(QuestionCategory::Health) => Relative::Offspring,
            Some(QuestionCategory::Study) => Relative::Parent,
            Some(QuestionCategory::Relations) | Some(QuestionCategory::Personality) => {
                Relative::Sibling
            }
            Some(QuestionCategory::Romance) | Some(QuestionCategory::Marriage) => match gender {
                Some(Gender::Female) => Relative::Officer,
                _ => Relative::Wealth,
            },
            _ => Relative::Officer,
        }
    }
}

/// 卦
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hexagram {
    pub upper: usize,
    pub lower: usize,
    /// 1-6
    pub moving: usize,
    /// 六爻地支，自初爻起
    pub branches: [usize; 6],
}

impl Hexagram {
    pub fn new(upper: i64, lower: i64, moving: i64) -> Self {
        let upper = trigram_index(upper);
        let lower = trigram_index(lower);
        let mut branches = [0usize; 6];
        for line in 0..3 {
            branches[line] = (lower * 2 + line) % 12;
            branches[line + 3] = (upper * 2 + line + 6) % 12;
        }
        Self {
            upper,
            lower,
            moving: moving_line(moving),
            branches,
        }
    }

    pub fn palace_element(&self) -> Element {
        TRIGRAM_ELEMENTS[self.upper]
    }

    pub fn moving_element(&self) -> Element {
        branch_element(self.branches[self.moving - 1])
    }

    pub fn relatives(&self) -> [Relative; 6] {
        let palace = self.palace_element();
        self.branches.map(|b| Relative::of(palace, branch_element(b)))
    }
}

/// 六爻
pub struct LiuYaoTheory {
    descriptor: TheoryDescriptor,
}

impl LiuYaoTheory {
    pub const NAME: &'static str = "六爻";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Deep)
                .require(&[Field::Numbers])
                .optional(Field::CurrentTime, 0.2)
                .optional(Field::QuestionDescription, 0.1)
                .min_completeness(0.6)
                .strengths([0.5, 0.4, 0.8, 0.9, 0.7, 0.8, 0.7, 0.6])
                .mbti_affinity([
                    0.7, 0.8, 0.6, 0.7, 0.7, 0.6, 0.5, 0.6, 0.8, 0.7, 0.7, 0.6, 0.9, 0.7, 0.8, 0.6,
                ]),
        }
    }

    /// 数字不足三个时以起卦时辰补足
    fn cast(input: &UserInput) -> Result<Hexagram> {
        let numbers = input
            .numbers
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| calculation_error(Self::NAME, "缺少起卦数字"))?;
        let hour = i64::from(input.current_time.hour());
        let upper = numbers[0];
        let lower = numbers.get(1).copied().unwrap_or(upper.wrapping_add(hour));
        let moving = numbers
            .get(2)
            .copied()
            .unwrap_or(upper.wrapping_add(lower).wrapping_add(hour));
        Ok(Hexagram::new(upper, lower, moving))
    }
}

impl Default for LiuYaoTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for LiuYaoTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;
        let events = self.narrowing_events(input);

        let hexagram = Self::cast(input)?;
        let palace = hexagram.palace_element();
        let useful = Relative::useful_for(&input.question_type, input.gender);
        let useful_element = useful.element(palace);
        let moving_element = hexagram.moving_element();
        let relation = moving_element.relation(useful_element);

        let (level, advice) = match relation {
            Relation::Generates => (0.85, format!("动爻生{}，所求之事得助，可放手去做", useful.label())),
            Relation::Same => (0.75, format!("动爻即{}，用神发动，事有转机", useful.label())),
            Relation::GeneratedBy => (0.4, format!("{}泄气于动爻，投入多而收获少，宜量力而行", useful.label())),
            Relation::OvercomeBy => (0.5, format!("{}克制动爻，局面尚可掌控，谨慎推进", useful.label())),
            Relation::Overcomes => (0.25, format!("动爻克{}，阻碍明显，不宜强行推进", useful.label())),
        };

        // 应期：用神所临地支之日，卦中不见用神则取同五行的首个地支
        let relatives = hexagram.relatives();
        let useful_branch = relatives
            .iter()
            .position(|r| *r == useful)
            .map(|line| hexagram.branches[line])
            .or_else(|| (0..12).find(|b| branch_element(*b) == useful_element));
        let timing = useful_branch.map(|b| {
            let day = next_branch_day(input.current_time.date(), b);
            format!("应在{}日 ({})", BRANCHES[b], format_date(day))
        });

        let lines: Vec<String> = hexagram
            .branches
            .iter()
            .zip(relatives.iter())
            .map(|(b, r)| format!("{}{}", r.label(), BRANCHES[*b]))
            .collect();
        let details = json!({
            "hexagram": format!("上{}下{}", TRIGRAMS[hexagram.upper], TRIGRAMS[hexagram.lower]),
            "palace_element": palace.label(),
            "lines": lines,
            "moving_line": hexagram.moving,
            "useful_god": useful.label(),
            "useful_element": useful_element.label(),
            "moving_element": moving_element.label(),
            "cast_year": input.current_time.year(),
        });

        let mut raw = RawResult::new(Self::NAME, native_label(level), level)
            .with_advice(advice)
            .with_confidence(0.7)
            .with_details(details)
            .with_events(events);
        if let Some(timing) = timing {
            raw = raw.with_timing(timing);
        }
        Ok(raw)
    }
}
