//! 用户输入定义
//!
//! 每次问询构造一次，之后只读。除问题类别、问题描述与当前时间外，
//! 所有字段均可缺省；缺省本身有意义 (驱动完备度计算)，不是错误。

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 输入字段名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    QuestionType,
    QuestionDescription,
    CurrentTime,
    InitialInquiryTime,
    BirthYear,
    BirthMonth,
    BirthDay,
    BirthHour,
    BirthPlaceLng,
    CalendarType,
    Gender,
    Numbers,
    Character,
    MbtiType,
    FavoriteColor,
    CurrentDirection,
    AdditionalPersons,
}

impl Field {
    /// 获取字段名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::QuestionType => "question_type",
            Field::QuestionDescription => "question_description",
            Field::CurrentTime => "current_time",
            Field::InitialInquiryTime => "initial_inquiry_time",
            Field::BirthYear => "birth_year",
            Field::BirthMonth => "birth_month",
            Field::BirthDay => "birth_day",
            Field::BirthHour => "birth_hour",
            Field::BirthPlaceLng => "birth_place_lng",
            Field::CalendarType => "calendar_type",
            Field::Gender => "gender",
            Field::Numbers => "numbers",
            Field::Character => "character",
            Field::MbtiType => "mbti_type",
            Field::FavoriteColor => "favorite_color",
            Field::CurrentDirection => "current_direction",
            Field::AdditionalPersons => "additional_persons",
        }
    }

    /// 面向用户的补充提示
    pub fn label(&self) -> &'static str {
        match self {
            Field::QuestionType => "问题类别",
            Field::QuestionDescription => "问题描述",
            Field::CurrentTime => "起卦时间",
            Field::InitialInquiryTime => "首次问询时间",
            Field::BirthYear => "出生年份",
            Field::BirthMonth => "出生月份",
            Field::BirthDay => "出生日期",
            Field::BirthHour => "出生时辰",
            Field::BirthPlaceLng => "出生地经度",
            Field::CalendarType => "历法类型",
            Field::Gender => "性别",
            Field::Numbers => "3个随机数字",
            Field::Character => "一个汉字",
            Field::MbtiType => "MBTI 类型",
            Field::FavoriteColor => "喜欢的颜色",
            Field::CurrentDirection => "当前方位",
            Field::AdditionalPersons => "其他相关人物",
        }
    }
}

/// 性别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// 解析 "male"/"female"/"男"/"女"
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" | "m" | "男" => Some(Gender::Male),
            "female" | "f" | "女" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// 出生时辰确定性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BirthTimeCertainty {
    /// 记得
    #[default]
    Certain,
    /// 大概
    Uncertain,
    /// 不记得
    Unknown,
}

impl BirthTimeCertainty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "certain" | "记得" => Some(BirthTimeCertainty::Certain),
            "uncertain" | "大概" => Some(BirthTimeCertainty::Uncertain),
            "unknown" | "不记得" => Some(BirthTimeCertainty::Unknown),
            _ => None,
        }
    }
}

/// 历法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarType {
    Solar,
    Lunar,
}

/// 次要人物出生信息 (合婚、代问等场景)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonBirthInfo {
    /// 姓名/标签
    pub name: String,
    pub birth_year: i32,
    pub birth_month: u32,
    pub birth_day: u32,
    pub birth_hour: Option<u32>,
    pub gender: Option<Gender>,
}

impl PersonBirthInfo {
    pub fn new(name: impl Into<String>, year: i32, month: u32, day: u32) -> Self {
        Self {
            name: name.into(),
            birth_year: year,
            birth_month: month,
            birth_day: day,
            birth_hour: None,
            gender: None,
        }
    }

    pub fn with_hour(mut self, hour: u32) -> Self {
        self.birth_hour = Some(hour);
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }
}

/// 用户输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    /// 问题类别 (事业、财运、决策 ...)
    pub question_type: String,
    /// 问题描述
    pub question_description: String,
    /// 当前时间 (本地时间，起卦依据)
    pub current_time: NaiveDateTime,
    /// 首次问询时间
    pub initial_inquiry_time: Option<NaiveDateTime>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<u32>,
    pub birth_day: Option<u32>,
    /// 出生时 (0-23)
    pub birth_hour: Option<u32>,
    pub birth_time_certainty: BirthTimeCertainty,
    pub birth_place_lng: Option<f64>,
    pub calendar_type: Option<CalendarType>,
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub mbti_type: Option<String>,
    /// 数字起卦用的随机数字
    pub numbers: Option<Vec<i64>>,
    /// 测字用的汉字
    pub character: Option<String>,
    pub favorite_color: Option<String>,
    pub current_direction: Option<String>,
    /// 其他相关人物
    pub additional_persons: Vec<PersonBirthInfo>,
}

impl UserInput {
    /// 以当前本地时间创建新的输入
    pub fn new(question_type: impl Into<String>, question_description: impl Into<String>) -> Self {
        Self::at(question_type, question_description, Local::now().naive_local())
    }

    /// 以指定时间创建新的输入
    pub fn at(
        question_type: impl Into<String>,
        question_description: impl Into<String>,
        current_time: NaiveDateTime,
    ) -> Self {
        Self {
            question_type: question_type.into(),
            question_description: question_description.into(),
            current_time,
            initial_inquiry_time: None,
            birth_year: None,
            birth_month: None,
            birth_day: None,
            birth_hour: None,
            birth_time_certainty: BirthTimeCertainty::Certain,
            birth_place_lng: None,
            calendar_type: None,
            name: None,
            gender: None,
            mbti_type: None,
            numbers: None,
            character: None,
            favorite_color: None,
            current_direction: None,
            additional_persons: Vec::new(),
        }
    }

    /// 设置出生年月日
    pub fn with_birth(mut self, year: i32, month: u32, day: u32) -> Self {
        self.birth_year = Some(year);
        self.birth_month = Some(month);
        self.birth_day = Some(day);
        self
    }

    pub fn with_birth_hour(mut self, hour: u32) -> Self {
        self.birth_hour = Some(hour);
        self
    }

    pub fn with_birth_time_certainty(mut self, certainty: BirthTimeCertainty) -> Self {
        self.birth_time_certainty = certainty;
        self
    }

    pub fn with_birth_place_lng(mut self, lng: f64) -> Self {
        self.birth_place_lng = Some(lng);
        self
    }

    pub fn with_calendar_type(mut self, calendar: CalendarType) -> Self {
        self.calendar_type = Some(calendar);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_mbti(mut self, mbti: impl Into<String>) -> Self {
        self.mbti_type = Some(mbti.into());
        self
    }

    pub fn with_numbers(mut self, numbers: Vec<i64>) -> Self {
        self.numbers = Some(numbers);
        self
    }

    pub fn with_character(mut self, character: impl Into<String>) -> Self {
        self.character = Some(character.into());
        self
    }

    pub fn with_favorite_color(mut self, color: impl Into<String>) -> Self {
        self.favorite_color = Some(color.into());
        self
    }

    pub fn with_current_direction(mut self, direction: impl Into<String>) -> Self {
        self.current_direction = Some(direction.into());
        self
    }

    pub fn with_initial_inquiry_time(mut self, time: NaiveDateTime) -> Self {
        self.initial_inquiry_time = Some(time);
        self
    }

    /// 添加次要人物
    pub fn with_person(mut self, person: PersonBirthInfo) -> Self {
        self.additional_persons.push(person);
        self
    }

    /// 字段是否存在
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::QuestionType => !self.question_type.trim().is_empty(),
            Field::QuestionDescription => !self.question_description.trim().is_empty(),
            Field::CurrentTime => true,
            Field::InitialInquiryTime => self.initial_inquiry_time.is_some(),
            Field::BirthYear => self.birth_year.is_some(),
            Field::BirthMonth => self.birth_month.is_some(),
            Field::BirthDay => self.birth_day.is_some(),
            Field::BirthHour => self.birth_hour.is_some(),
            Field::BirthPlaceLng => self.birth_place_lng.is_some(),
            Field::CalendarType => self.calendar_type.is_some(),
            Field::Gender => self.gender.is_some(),
            Field::MbtiType => self.mbti_type.as_deref().is_some_and(|s| !s.trim().is_empty()),
            Field::Numbers => self.numbers.as_ref().is_some_and(|n| !n.is_empty()),
            Field::Character => self.character.as_deref().is_some_and(|s| !s.trim().is_empty()),
            Field::FavoriteColor => self.favorite_color.is_some(),
            Field::CurrentDirection => self.current_direction.is_some(),
            Field::AdditionalPersons => !self.additional_persons.is_empty(),
        }
    }

    /// 缺失的字段
    pub fn missing<'a>(&self, fields: impl IntoIterator<Item = &'a Field>) -> Vec<Field> {
        fields.into_iter().copied().filter(|f| !self.has(*f)).collect()
    }

    /// 前三个起卦数字 (不足三个时返回 None)
    pub fn three_numbers(&self) -> Option<[i64; 3]> {
        match self.numbers.as_deref() {
            Some([a, b, c, ..]) => Some([*a, *b, *c]),
            _ => None,
        }
    }

    /// 起卦时间：优先首次问询时间
    pub fn divination_time(&self) -> NaiveDateTime {
        self.initial_inquiry_time.unwrap_or(self.current_time)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_absent_fields_are_not_errors() {
        let input = UserInput::at("决策", "要不要换工作", noon());
        assert!(input.has(Field::QuestionType));
        assert!(input.has(Field::CurrentTime));
        assert!(!input.has(Field::BirthYear));
        assert!(!input.has(Field::Numbers));
        assert_eq!(
            input.missing(&[Field::BirthYear, Field::QuestionType, Field::Character]),
            vec![Field::BirthYear, Field::Character]
        );
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let input = UserInput::at("事业", "   ", noon())
            .with_character(" ")
            .with_numbers(Vec::new());
        assert!(!input.has(Field::QuestionDescription));
        assert!(!input.has(Field::Character));
        assert!(!input.has(Field::Numbers));
    }

    #[test]
    fn test_three_numbers() {
        let input = UserInput::at("决策", "q", noon()).with_numbers(vec![3, 7]);
        assert!(input.three_numbers().is_none());
        let input = input.with_numbers(vec![3, 7, 5, 9]);
        assert_eq!(input.three_numbers(), Some([3, 7, 5]));
    }

    #[test]
    fn test_divination_time_prefers_initial_inquiry() {
        let earlier = noon() - chrono::Duration::hours(3);
        let input = UserInput::at("决策", "q", noon());
        assert_eq!(input.divination_time(), noon());
        let input = input.with_initial_inquiry_time(earlier);
        assert_eq!(input.divination_time(), earlier);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(Gender::parse("女"), Some(Gender::Female));
        assert_eq!(Gender::parse("MALE"), Some(Gender::Male));
        assert_eq!(Gender::parse("x"), None);
        assert_eq!(
            BirthTimeCertainty::parse("uncertain"),
            Some(BirthTimeCertainty::Uncertain)
        );
    }
}
