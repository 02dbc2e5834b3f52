//! 问询会话：逐项收集用户输入

use anyhow::{anyhow, bail, Context};
use chrono::{Local, NaiveDate};

use tj_core::{BirthTimeCertainty, Gender, PersonBirthInfo, UserInput};

/// `set` 支持的字段
pub const SETTABLE: &[(&str, &str)] = &[
    ("type", "<类别>               问题类别 (事业/财运/感情/婚姻/健康/学业/人际/择时/决策/性格)"),
    ("desc", "<描述...>            问题描述"),
    ("birth", "<年> <月> <日> [时]  出生日期 (公历)"),
    ("hour", "<0-23>               出生时辰"),
    ("gender", "<男|女>              性别"),
    ("numbers", "<n1> [n2] [n3] ...  起卦数字"),
    ("char", "<字>                 测字用的汉字"),
    ("mbti", "<类型>               MBTI 类型"),
    ("certainty", "<记得|大概|不记得>   出生时辰确定性"),
    ("color", "<颜色>               喜欢的颜色"),
    ("direction", "<方位>               当前所在方位"),
    ("person", "<名字> <年> <月> <日> [时]  添加相关人物"),
];

#[derive(Debug, Clone)]
pub struct Session {
    input: UserInput,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            input: UserInput::new("", ""),
        }
    }

    pub fn input(&self) -> &UserInput {
        &self.input
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// 以当前时间起卦的输入快照
    pub fn snapshot(&self) -> UserInput {
        let mut input = self.input.clone();
        input.current_time = Local::now().naive_local();
        input
    }

    /// 设置单个字段
    pub fn set(&mut self, field: &str, args: &[&str]) -> anyhow::Result<()> {
        if args.is_empty() {
            bail!("set {field} 缺少取值");
        }
        match field {
            "type" => self.input.question_type = args.join(""),
            "desc" => self.input.question_description = args.join(" "),
            "birth" => {
                let (year, month, day, hour) = parse_date(args)?;
                self.input.birth_year = Some(year);
                self.input.birth_month = Some(month);
                self.input.birth_day = Some(day);
                if hour.is_some() {
                    self.input.birth_hour = hour;
                }
            }
            "hour" => {
                self.input.birth_hour = Some(parse_hour(args[0])?);
            }
            "gender" => {
                let gender =
                    Gender::parse(args[0]).ok_or_else(|| anyhow!("无法识别的性别: {}", args[0]))?;
                self.input.gender = Some(gender);
            }
            "numbers" => {
                let numbers = args
                    .iter()
                    .map(|n| n.parse::<i64>().with_context(|| format!("不是整数: {n}")))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                self.input.numbers = Some(numbers);
            }
            "char" => {
                let ch = args[0]
                    .chars()
                    .next()
                    .ok_or_else(|| anyhow!("请输入一个汉字"))?;
                self.input.character = Some(ch.to_string());
            }
            "mbti" => {
                if tj_theory::mbti_index(args[0]).is_none() {
                    bail!("无效的 MBTI 类型: {}", args[0]);
                }
                self.input.mbti_type = Some(args[0].to_uppercase());
            }
            "certainty" => {
                let certainty = BirthTimeCertainty::parse(args[0])
                    .ok_or_else(|| anyhow!("应为 记得/大概/不记得: {}", args[0]))?;
                self.input.birth_time_certainty = certainty;
            }
            "color" => self.input.favorite_color = Some(args.join("")),
            "direction" => self.input.current_direction = Some(args.join("")),
            "person" => {
                let (name, rest) = args
                    .split_first()
                    .ok_or_else(|| anyhow!("缺少人物名字"))?;
                let (year, month, day, hour) = parse_date(rest)?;
                let mut person = PersonBirthInfo::new(*name, year, month, day);
                if let Some(hour) = hour {
                    person = person.with_hour(hour);
                }
                self.input.additional_persons.push(person);
            }
            other => bail!("未知字段: {other}"),
        }
        Ok(())
    }

    /// 已填写字段的可读摘要
    pub fn summary(&self) -> Vec<String> {
        let input = &self.input;
        let mut lines = vec![
            format!("问题类别: {}", or_dash(&input.question_type)),
            format!("问题描述: {}", or_dash(&input.question_description)),
        ];
        if let (Some(y), Some(m), Some(d)) = (input.birth_year, input.birth_month, input.birth_day)
        {
            let hour = input
                .birth_hour
                .map(|h| format!(" {h} 时"))
                .unwrap_or_default();
            lines.push(format!(
                "出生: {y}-{m:02}-{d:02}{hour} ({:?})",
                input.birth_time_certainty
            ));
        }
        if let Some(gender) = input.gender {
            lines.push(format!("性别: {gender:?}"));
        }
        if let Some(numbers) = &input.numbers {
            lines.push(format!("数字: {numbers:?}"));
        }
        if let Some(ch) = &input.character {
            lines.push(format!("测字: {ch}"));
        }
        if let Some(mbti) = &input.mbti_type {
            lines.push(format!("MBTI: {mbti}"));
        }
        if let Some(color) = &input.favorite_color {
            lines.push(format!("颜色: {color}"));
        }
        if let Some(direction) = &input.current_direction {
            lines.push(format!("方位: {direction}"));
        }
        for person in &input.additional_persons {
            lines.push(format!(
                "相关人物: {} {}-{:02}-{:02}",
                person.name, person.birth_year, person.birth_month, person.birth_day
            ));
        }
        lines
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

fn parse_hour(raw: &str) -> anyhow::Result<u32> {
    let hour: u32 = raw.parse().with_context(|| format!("不是有效的时辰: {raw}"))?;
    if hour > 23 {
        bail!("时辰应在 0-23 之间: {hour}");
    }
    Ok(hour)
}

fn parse_date(args: &[&str]) -> anyhow::Result<(i32, u32, u32, Option<u32>)> {
    let [year, month, day, rest @ ..] = args else {
        bail!("日期格式: <年> <月> <日> [时]");
    };
    let year: i32 = year.parse().with_context(|| format!("年份无效: {year}"))?;
    let month: u32 = month.parse().with_context(|| format!("月份无效: {month}"))?;
    let day: u32 = day.parse().with_context(|| format!("日期无效: {day}"))?;
    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        bail!("不存在的日期: {year}-{month}-{day}");
    }
    let hour = rest.first().map(|h| parse_hour(h)).transpose()?;
    Ok((year, month, day, hour))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_fields() {
        let mut session = Session::new();
        session.set("type", &["事业"]).unwrap();
        session.set("desc", &["要不要", "换工作"]).unwrap();
        session.set("birth", &["1990", "5", "15", "8"]).unwrap();
        session.set("numbers", &["3", "7", "5"]).unwrap();
        session.set("mbti", &["intj"]).unwrap();
        session.set("certainty", &["大概"]).unwrap();

        let input = session.input();
        assert_eq!(input.question_type, "事业");
        assert_eq!(input.question_description, "要不要 换工作");
        assert_eq!(input.birth_hour, Some(8));
        assert_eq!(input.numbers, Some(vec![3, 7, 5]));
        assert_eq!(input.mbti_type.as_deref(), Some("INTJ"));
        assert_eq!(input.birth_time_certainty, BirthTimeCertainty::Uncertain);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut session = Session::new();
        assert!(session.set("birth", &["1990", "2", "30"]).is_err());
        assert!(session.set("hour", &["24"]).is_err());
        assert!(session.set("numbers", &["3", "x"]).is_err());
        assert!(session.set("mbti", &["ABCD"]).is_err());
        assert!(session.set("gender", &["?"]).is_err());
        assert!(session.set("unknown", &["1"]).is_err());
        assert!(session.set("desc", &[]).is_err());
    }

    #[test]
    fn test_person_and_reset() {
        let mut session = Session::new();
        session.set("person", &["伴侣", "1991", "2", "2", "10"]).unwrap();
        assert_eq!(session.input().additional_persons.len(), 1);
        assert_eq!(session.input().additional_persons[0].birth_hour, Some(10));
        session.reset();
        assert!(session.input().additional_persons.is_empty());
    }
}
