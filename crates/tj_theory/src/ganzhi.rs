//! 天干地支与六十甲子

use chrono::{Datelike, NaiveDate};

use crate::wuxing::Element;

pub const STEMS: [&str; 10] = ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];

pub const BRANCHES: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];

const BRANCH_ELEMENTS: [Element; 12] = [
    Element::Water,
    Element::Earth,
    Element::Wood,
    Element::Wood,
    Element::Earth,
    Element::Fire,
    Element::Fire,
    Element::Earth,
    Element::Metal,
    Element::Metal,
    Element::Earth,
    Element::Water,
];

/// 2000-01-01 为戊午日
const EPOCH_CYCLE_INDEX: i64 = 54;

pub fn stem_element(stem: usize) -> Element {
    Element::from_index((stem % 10) / 2)
}

pub fn branch_element(branch: usize) -> Element {
    BRANCH_ELEMENTS[branch % 12]
}

/// 六十甲子序号对应的干支名
pub fn cycle_name(index: usize) -> String {
    format!("{}{}", STEMS[index % 10], BRANCHES[index % 12])
}

/// 日柱在六十甲子中的序号
pub fn day_cycle_index(date: NaiveDate) -> usize {
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN);
    let days = date.signed_duration_since(epoch).num_days();
    (EPOCH_CYCLE_INDEX + days).rem_euclid(60) as usize
}

/// 年柱在六十甲子中的序号 (1984 为甲子年)
pub fn year_cycle_index(year: i32) -> usize {
    (i64::from(year) - 4).rem_euclid(60) as usize
}

/// 时辰地支序号 (23-1 点为子时)
pub fn hour_branch(hour: u32) -> usize {
    (((hour % 24) + 1) / 2 % 12) as usize
}

/// 时辰对应的钟点区间
pub fn branch_hours(branch: usize) -> (u32, u32) {
    let start = (2 * (branch as u32 % 12) + 23) % 24;
    (start, (start + 2) % 24)
}

/// 从 `from` 开始 (含当日) 找到下一个指定地支日
pub fn next_branch_day(from: NaiveDate, branch: usize) -> NaiveDate {
    let current = day_cycle_index(from) % 12;
    let offset = (branch % 12 + 12 - current) % 12;
    from + chrono::Duration::days(offset as i64)
}

/// 日期格式化为 "YYYY年M月D日"
pub fn format_date(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_cycle_anchor() {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(cycle_name(day_cycle_index(epoch)), "戊午");
        let next = NaiveDate::from_ymd_opt(2000, 1, 2).unwrap();
        assert_eq!(cycle_name(day_cycle_index(next)), "己未");
        let before = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(cycle_name(day_cycle_index(before)), "丁巳");
    }

    #[test]
    fn test_year_cycle() {
        assert_eq!(cycle_name(year_cycle_index(1984)), "甲子");
        assert_eq!(cycle_name(year_cycle_index(2024)), "甲辰");
    }

    #[test]
    fn test_hour_branch() {
        assert_eq!(hour_branch(23), 0);
        assert_eq!(hour_branch(0), 0);
        assert_eq!(hour_branch(1), 1);
        assert_eq!(hour_branch(12), 6);
        assert_eq!(branch_hours(0), (23, 1));
        assert_eq!(branch_hours(6), (11, 13));
    }

    #[test]
    fn test_next_branch_day() {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(next_branch_day(epoch, 6), epoch);
        assert_eq!(day_cycle_index(next_branch_day(epoch, 0)) % 12, 0);
    }

    #[test]
    fn test_elements() {
        assert_eq!(stem_element(0), Element::Wood);
        assert_eq!(stem_element(9), Element::Water);
        assert_eq!(branch_element(6), Element::Fire);
    }
}
