// ==========================================
// 进度计划引擎 - 工作日历纯函数库
// ==========================================
// 约定: 所有日期均表示"当天开始时刻"的边界
//   ES 为工作日；EF 以"结束边界"（最后工作日的次日）参与计算
//   对外展示的完成日 = 结束边界之前的最后一个工作日
// 红线: 无状态、无副作用、无 I/O 操作
// ==========================================

use crate::domain::schedule::Calendar;
use chrono::{Datelike, NaiveDate};

/// 单次扫描的最大天数（防御空日历导致的死循环）
const MAX_SCAN_DAYS: i64 = 366 * 100;

// ==========================================
// CalendarCore - 纯函数工具类
// ==========================================
pub struct CalendarCore;

impl CalendarCore {
    /// 是否工作日（工作日位图 + 节假日）
    pub fn is_working_day(cal: &Calendar, date: NaiveDate) -> bool {
        let bit = 1u8 << date.weekday().num_days_from_monday();
        cal.working_days & bit != 0 && !cal.holidays.contains(&date)
    }

    /// 当天或之后的第一个工作日
    pub fn snap_forward(cal: &Calendar, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        for _ in 0..MAX_SCAN_DAYS {
            if Self::is_working_day(cal, d) {
                return d;
            }
            match d.succ_opt() {
                Some(next) => d = next,
                None => break,
            }
        }
        d
    }

    /// 当天或之前的最后一个工作日
    pub fn snap_backward(cal: &Calendar, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        for _ in 0..MAX_SCAN_DAYS {
            if Self::is_working_day(cal, d) {
                return d;
            }
            match d.pred_opt() {
                Some(prev) => d = prev,
                None => break,
            }
        }
        d
    }

    /// 从边界 from 起（含当天）数 n 个工作日，返回第 n 个工作日的次日
    ///
    /// n = 0 时原样返回（里程碑）
    pub fn forward(cal: &Calendar, from: NaiveDate, n: i64) -> NaiveDate {
        if n <= 0 {
            return from;
        }
        let mut d = from;
        let mut counted = 0;
        for _ in 0..MAX_SCAN_DAYS {
            if Self::is_working_day(cal, d) {
                counted += 1;
            }
            let Some(next) = d.succ_opt() else { break };
            d = next;
            if counted == n {
                break;
            }
        }
        d
    }

    /// 从边界 from 之前（不含当天）倒数 n 个工作日，返回第 n 个工作日
    pub fn backward(cal: &Calendar, from: NaiveDate, n: i64) -> NaiveDate {
        if n <= 0 {
            return from;
        }
        let mut d = from;
        let mut counted = 0;
        for _ in 0..MAX_SCAN_DAYS {
            let Some(prev) = d.pred_opt() else { break };
            d = prev;
            if Self::is_working_day(cal, d) {
                counted += 1;
                if counted == n {
                    break;
                }
            }
        }
        d
    }

    /// 按工作日平移（正数向后，负数向前）
    pub fn shift(cal: &Calendar, from: NaiveDate, n: i64) -> NaiveDate {
        if n >= 0 {
            Self::forward(cal, from, n)
        } else {
            Self::backward(cal, from, -n)
        }
    }

    /// [from, to) 区间内的工作日数；to < from 时为负
    pub fn working_days_between(cal: &Calendar, from: NaiveDate, to: NaiveDate) -> i64 {
        let (lo, hi, sign) = if from <= to {
            (from, to, 1)
        } else {
            (to, from, -1)
        };
        let count = lo
            .iter_days()
            .take_while(|d| *d < hi)
            .filter(|d| Self::is_working_day(cal, *d))
            .count() as i64;
        sign * count
    }

    /// 结束边界 → 展示用完成日
    ///
    /// 里程碑（工期 0）完成日 = 开始日
    pub fn display_finish(cal: &Calendar, start: NaiveDate, finish_boundary: NaiveDate, duration: i64) -> NaiveDate {
        if duration <= 0 {
            start
        } else {
            Self::backward(cal, finish_boundary, 1)
        }
    }

    /// 小时 → 工作日（四舍五入）
    pub fn hours_to_days(hours: f64, hours_per_day: f64) -> i64 {
        if hours_per_day <= 0.0 || !hours.is_finite() {
            return 0;
        }
        (hours / hours_per_day).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn five_day() -> Calendar {
        Calendar::default_five_day(8.0)
    }

    #[test]
    fn test_is_working_day() {
        let cal = five_day();
        assert!(CalendarCore::is_working_day(&cal, d(2024, 1, 8))); // 周一
        assert!(!CalendarCore::is_working_day(&cal, d(2024, 1, 13))); // 周六
    }

    #[test]
    fn test_forward_skips_weekend() {
        let cal = five_day();
        // 周一起 5 个工作日 → 周五的次日（周六）
        assert_eq!(CalendarCore::forward(&cal, d(2024, 1, 8), 5), d(2024, 1, 13));
        // 周四起 3 个工作日：周四、周五、周一 → 周二边界
        assert_eq!(CalendarCore::forward(&cal, d(2024, 1, 11), 3), d(2024, 1, 16));
        // 周六起 1 个工作日：周一 → 周二边界
        assert_eq!(CalendarCore::forward(&cal, d(2024, 1, 13), 1), d(2024, 1, 16));
        assert_eq!(CalendarCore::forward(&cal, d(2024, 1, 13), 0), d(2024, 1, 13));
    }

    #[test]
    fn test_backward_is_inverse_of_forward() {
        let cal = five_day();
        let start = d(2024, 1, 8);
        let boundary = CalendarCore::forward(&cal, start, 7);
        assert_eq!(CalendarCore::backward(&cal, boundary, 7), start);
        // 周一边界前 1 个工作日 = 上周五
        assert_eq!(CalendarCore::backward(&cal, d(2024, 1, 15), 1), d(2024, 1, 12));
    }

    #[test]
    fn test_holidays_are_skipped() {
        let mut cal = five_day();
        cal.holidays = BTreeSet::from([d(2024, 1, 9)]);
        assert_eq!(CalendarCore::forward(&cal, d(2024, 1, 8), 2), d(2024, 1, 11));
        assert_eq!(CalendarCore::snap_forward(&cal, d(2024, 1, 9)), d(2024, 1, 10));
        assert_eq!(CalendarCore::snap_backward(&cal, d(2024, 1, 9)), d(2024, 1, 8));
    }

    #[test]
    fn test_shift_negative_is_lead() {
        let cal = five_day();
        assert_eq!(CalendarCore::shift(&cal, d(2024, 1, 15), -1), d(2024, 1, 12));
        assert_eq!(CalendarCore::shift(&cal, d(2024, 1, 15), 2), d(2024, 1, 17));
    }

    #[test]
    fn test_working_days_between_is_signed() {
        let cal = five_day();
        assert_eq!(CalendarCore::working_days_between(&cal, d(2024, 1, 8), d(2024, 1, 15)), 5);
        assert_eq!(CalendarCore::working_days_between(&cal, d(2024, 1, 15), d(2024, 1, 8)), -5);
        assert_eq!(CalendarCore::working_days_between(&cal, d(2024, 1, 8), d(2024, 1, 8)), 0);
    }

    #[test]
    fn test_display_finish() {
        let cal = five_day();
        assert_eq!(
            CalendarCore::display_finish(&cal, d(2024, 1, 8), d(2024, 1, 13), 5),
            d(2024, 1, 12)
        );
        assert_eq!(
            CalendarCore::display_finish(&cal, d(2024, 1, 8), d(2024, 1, 8), 0),
            d(2024, 1, 8)
        );
    }

    #[test]
    fn test_hours_to_days_rounds() {
        assert_eq!(CalendarCore::hours_to_days(40.0, 8.0), 5);
        assert_eq!(CalendarCore::hours_to_days(36.0, 8.0), 5); // 4.5 → 5
        assert_eq!(CalendarCore::hours_to_days(-16.0, 8.0), -2);
        assert_eq!(CalendarCore::hours_to_days(10.0, 0.0), 0);
    }
}
