//! 八字 - 四柱排盘与日主旺衰
//!
//! 年柱以立春为界，月柱以节气为界 (取近似节日)，日柱按六十甲子连续推算，
//! 时柱由日干起。只做旺衰与用神的简化论断，不排大运。

use chrono::{Datelike, NaiveDate};
use serde_json::json;

use tj_core::{
    BirthTimeCertainty, Field, PersonBirthInfo, QuestionCategory, RawResult, Result, UserInput,
};

use crate::ganzhi::{
    branch_element, cycle_name, day_cycle_index, hour_branch, stem_element, year_cycle_index,
    BRANCHES, STEMS,
};
use crate::theory::{calculation_error, SpeedTier, Theory, TheoryDescriptor};
use crate::wuxing::{Element, Relation};

/// 北京时间所在经度
const STANDARD_MERIDIAN: f64 = 120.0;

/// 一柱：天干序号 + 地支序号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pillar {
    pub stem: usize,
    pub branch: usize,
}

impl Pillar {
    fn from_cycle(index: usize) -> Self {
        Self {
            stem: index % 10,
            branch: index % 12,
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", STEMS[self.stem], BRANCHES[self.branch])
    }
}

/// 四柱 (时柱可缺)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourPillars {
    pub year: Pillar,
    pub month: Pillar,
    pub day: Pillar,
    pub hour: Option<Pillar>,
}

impl FourPillars {
    pub fn compute(date: NaiveDate, hour: Option<u32>) -> Self {
        let (y, m, d) = (date.year(), date.month(), date.day());

        let before_spring = m < 2 || (m == 2 && d < 4);
        let pillar_year = if before_spring { y - 1 } else { y };
        let year = Pillar::from_cycle(year_cycle_index(pillar_year));

        // 每月节气约在 6 日前后，二月立春约在 4 日
        let jie_day = if m == 2 { 4 } else { 6 };
        let solar_month = if d < jie_day { m as i64 - 1 } else { m as i64 };
        let month_branch = solar_month.rem_euclid(12) as usize;
        let first_stem = (year.stem % 5) * 2 + 2;
        let month_stem = (first_stem + (month_branch as i64 - 2).rem_euclid(12) as usize) % 10;
        let month = Pillar {
            stem: month_stem,
            branch: month_branch,
        };

        let day = Pillar::from_cycle(day_cycle_index(date));

        let hour = hour.map(|h| {
            let branch = hour_branch(h);
            Pillar {
                stem: ((day.stem % 5) * 2 + branch) % 10,
                branch,
            }
        });

        Self {
            year,
            month,
            day,
            hour,
        }
    }

    pub fn day_master(&self) -> Element {
        stem_element(self.day.stem)
    }

    /// 日主得生扶的比例，月令加倍计
    pub fn support_ratio(&self) -> f64 {
        let master = self.day_master();
        let helps = |el: Element| el == master || el == master.generated_by();

        let mut weighted: Vec<(Element, f64)> = vec![
            (stem_element(self.year.stem), 1.0),
            (branch_element(self.year.branch), 1.0),
            (stem_element(self.month.stem), 1.0),
            (branch_element(self.month.branch), 2.0),
            (branch_element(self.day.branch), 1.0),
        ];
        if let Some(hour) = self.hour {
            weighted.push((stem_element(hour.stem), 1.0));
            weighted.push((branch_element(hour.branch), 1.0));
        }

        let total: f64 = weighted.iter().map(|(_, w)| w).sum();
        let support: f64 = weighted
            .iter()
            .filter(|(el, _)| helps(*el))
            .map(|(_, w)| w)
            .sum();
        support / total
    }
}

/// 日主旺衰
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Strong,
    Balanced,
    Weak,
}

impl Strength {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.6 {
            Strength::Strong
        } else if ratio >= 0.4 {
            Strength::Balanced
        } else {
            Strength::Weak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strength::Strong => "身强",
            Strength::Balanced => "中和",
            Strength::Weak => "身弱",
        }
    }

    /// 用神五行
    pub fn useful_element(&self, master: Element) -> Element {
        match self {
            Strength::Strong => master.generates(),
            Strength::Balanced => master.overcomes(),
            Strength::Weak => master.generated_by(),
        }
    }
}

fn birth_date(theory: &str, year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| calculation_error(theory, format!("无效的出生日期 {year}-{month}-{day}")))
}

/// 按出生地经度修正为真太阳时 (只修正到小时)
fn true_solar_hour(hour: u32, lng: Option<f64>) -> u32 {
    match lng {
        Some(lng) if lng.is_finite() => {
            let offset = ((lng - STANDARD_MERIDIAN) * 4.0).round() as i64;
            ((i64::from(hour) * 60 + 30 + offset).rem_euclid(1440) / 60) as u32
        }
        _ => hour,
    }
}

/// 八字
pub struct BaZiTheory {
    descriptor: TheoryDescriptor,
}

impl BaZiTheory {
    pub const NAME: &'static str = "八字";

    pub fn new() -> Self {
        Self {
            descriptor: TheoryDescriptor::new(Self::NAME, SpeedTier::Basic)
                .require(&[Field::BirthYear, Field::BirthMonth, Field::BirthDay])
                .optional(Field::BirthHour, 0.15)
                .optional(Field::Gender, 0.05)
                .optional(Field::BirthPlaceLng, 0.05)
                .min_completeness(0.75)
                .multi_subject()
                .hour_sensitive()
                .strengths([0.3, 0.1, 0.8, 0.7, 0.9, 0.5, 0.6, 0.9])
                .mbti_affinity([
                    0.8, 0.9, 0.7, 0.6, 0.8, 0.9, 0.7, 0.6, 0.8, 0.9, 0.7, 0.8, 0.7, 0.8, 0.6, 0.7,
                ]),
        }
    }

    fn partner_relation(
        &self,
        master: Element,
        person: &PersonBirthInfo,
    ) -> Result<(FourPillars, Relation)> {
        let date = birth_date(
            Self::NAME,
            person.birth_year,
            person.birth_month,
            person.birth_day,
        )?;
        let pillars = FourPillars::compute(date, person.birth_hour);
        Ok((pillars, master.relation(pillars.day_master())))
    }
}

impl Default for BaZiTheory {
    fn default() -> Self {
        Self::new()
    }
}

impl Theory for BaZiTheory {
    fn descriptor(&self) -> &TheoryDescriptor {
        &self.descriptor
    }

    fn calculate(&self, input: &UserInput) -> Result<RawResult> {
        self.ensure_required(input)?;

        let (Some(year), Some(month), Some(day)) =
            (input.birth_year, input.birth_month, input.birth_day)
        else {
            return Err(calculation_error(Self::NAME, "出生日期不完整"));
        };
        let date = birth_date(Self::NAME, year, month, day)?;
        if let Some(hour) = input.birth_hour.filter(|h| *h > 23) {
            return Err(calculation_error(Self::NAME, format!("无效的出生时 {hour}")));
        }
        let hour = input
            .birth_hour
            .map(|h| true_solar_hour(h, input.birth_place_lng));

        let pillars = FourPillars::compute(date, hour);
        let master = pillars.day_master();
        let ratio = pillars.support_ratio();
        let strength = Strength::from_ratio(ratio);
        let useful = strength.useful_element(master);

        let (mut label, mut level) = match strength {
            Strength::Strong => ("吉", 0.65),
            Strength::Balanced => ("吉", 0.75),
            Strength::Weak => ("小凶", 0.35),
        };
        let mut advice = format!(
            "日主{}{}，{}，宜多借{}之力",
            STEMS[pillars.day.stem],
            master.label(),
            strength.label(),
            useful.label()
        );

        // 合婚、合伙：逐一比对对方日主
        let mut partners = Vec::new();
        for person in &input.additional_persons {
            let (their, relation) = self.partner_relation(master, person)?;
            partners.push(json!({
                "name": person.name,
                "day_pillar": their.day.name(),
                "day_master": their.day_master().label(),
                "relation": relation.label(),
            }));
            let harmony = matches!(
                relation,
                Relation::Same | Relation::Generates | Relation::GeneratedBy
            );
            advice.push_str(&format!(
                "；与{}日主{}，{}",
                person.name,
                relation.label(),
                if harmony { "彼此相扶" } else { "需多包容" }
            ));
        }
        if let (Some(first), Some(QuestionCategory::Romance | QuestionCategory::Marriage)) = (
            input.additional_persons.first(),
            QuestionCategory::parse(&input.question_type),
        ) {
            let (_, relation) = self.partner_relation(master, first)?;
            level += match relation {
                Relation::Same | Relation::Generates | Relation::GeneratedBy => 0.05,
                Relation::Overcomes | Relation::OvercomeBy => -0.1,
            };
            label = crate::theory::native_label(level);
        }

        // 应期：用神五行当令的最近流年
        let current_year = input.current_time.year();
        let timing = (0..10)
            .map(|offset| current_year + offset)
            .find(|y| stem_element(year_cycle_index(*y) % 10) == useful)
            .map(|y| {
                format!(
                    "{}年({})用神{}透出，运势转佳",
                    y,
                    cycle_name(year_cycle_index(y)),
                    useful.label()
                )
            });

        let mut confidence = if hour.is_some() { 0.85 } else { 0.7 };
        if hour.is_some() {
            confidence *= match input.birth_time_certainty {
                BirthTimeCertainty::Certain => 1.0,
                BirthTimeCertainty::Uncertain => 0.9,
                BirthTimeCertainty::Unknown => 0.75,
            };
        }

        let details = json!({
            "year_pillar": pillars.year.name(),
            "month_pillar": pillars.month.name(),
            "day_pillar": pillars.day.name(),
            "hour_pillar": pillars.hour.map(|p| p.name()),
            "day_master": master.label(),
            "support_ratio": ratio,
            "strength": strength.label(),
            "useful_element": useful.label(),
            "gender": input.gender,
            "partners": partners,
        });

        let mut raw = RawResult::new(Self::NAME, label, level)
            .with_advice(advice)
            .with_confidence(confidence)
            .with_details(details);
        if let Some(timing) = timing {
            raw = raw.with_timing(timing);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tj_core::{Judgment, TianjiError};

    use super::*;

    fn input() -> UserInput {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        UserInput::at("事业", "今年是否适合跳槽", now)
    }

    #[test]
    fn test_pillars_for_known_date() {
        // 2000-01-01 12 时：己卯年 丙子月 戊午日 戊午时
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let pillars = FourPillars::compute(date, Some(12));
        assert_eq!(pillars.year.name(), "己卯");
        assert_eq!(pillars.month.name(), "丙子");
        assert_eq!(pillars.day.name(), "戊午");
        assert_eq!(pillars.hour.unwrap().name(), "戊午");
    }

    #[test]
    fn test_spring_boundary() {
        let before = FourPillars::compute(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(), None);
        let after = FourPillars::compute(NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(), None);
        assert_eq!(before.year.name(), "癸卯");
        assert_eq!(after.year.name(), "甲辰");
        assert_eq!(after.month.name(), "丙寅");
    }

    #[test]
    fn test_requires_birth_date() {
        let err = BaZiTheory::new().calculate(&input()).unwrap_err();
        match err {
            TianjiError::InsufficientData { missing, .. } => assert_eq!(missing.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_date_is_calculation_error() {
        let err = BaZiTheory::new()
            .calculate(&input().with_birth(1990, 2, 30))
            .unwrap_err();
        assert!(matches!(err, TianjiError::Calculation { .. }));
    }

    #[test]
    fn test_hour_raises_confidence() {
        let theory = BaZiTheory::new();
        let without = theory.calculate(&input().with_birth(1990, 5, 15)).unwrap();
        let with = theory
            .calculate(&input().with_birth(1990, 5, 15).with_birth_hour(8))
            .unwrap();
        assert_eq!(without.confidence, 0.7);
        assert_eq!(with.confidence, 0.85);
        let uncertain = theory
            .calculate(
                &input()
                    .with_birth(1990, 5, 15)
                    .with_birth_hour(8)
                    .with_birth_time_certainty(BirthTimeCertainty::Uncertain),
            )
            .unwrap();
        assert!(uncertain.confidence < with.confidence);
    }

    #[test]
    fn test_strength_drives_judgment() {
        let theory = BaZiTheory::new();
        let raw = theory
            .calculate(&input().with_birth(1990, 5, 15).with_birth_hour(8))
            .unwrap();
        let strength = raw.details["strength"].as_str().unwrap().to_string();
        let answer = theory.to_standard_answer(&raw);
        match strength.as_str() {
            "身弱" => assert_eq!(answer.judgment, Judgment::Unfavorable),
            _ => assert_eq!(answer.judgment, Judgment::Favorable),
        }
        assert!(raw.timing.is_some());
    }

    #[test]
    fn test_partners_are_analyzed_not_narrowed() {
        let theory = BaZiTheory::new();
        let input = UserInput::at("婚姻", "两人是否合适", input().current_time)
            .with_birth(1990, 5, 15)
            .with_person(PersonBirthInfo::new("伴侣", 1991, 9, 9));
        let raw = theory.calculate(&input).unwrap();
        assert!(raw.events.is_empty());
        assert_eq!(raw.details["partners"].as_array().unwrap().len(), 1);
        assert!(raw.advice.contains("伴侣"));
    }

    #[test]
    fn test_true_solar_hour() {
        assert_eq!(true_solar_hour(12, None), 12);
        assert_eq!(true_solar_hour(12, Some(120.0)), 12);
        // 乌鲁木齐约慢两小时多
        assert_eq!(true_solar_hour(12, Some(87.6)), 10);
    }
}
