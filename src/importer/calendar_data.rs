// ==========================================
// 进度计划引擎 - 日历数据解析（clndr_data）
// ==========================================
// 结构: 嵌套括号 (0||key(params)(children))
//   DaysOfWeek: 1=周日 ... 7=周六，含 s|..|f|.. 班次即为工作日
//   Exceptions: d|<序列号> 且无班次 = 节假日（1899-12-30 起算）
// ==========================================

use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

/// 最大嵌套层数；P6 导出实际不超过 5 层
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    key: String,
    params: String,
    children: Vec<Node>,
}

impl Node {
    fn find(&self, key: &str) -> Option<&Node> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(key))
    }

    fn has_shift(&self) -> bool {
        self.params.contains("s|") || self.children.iter().any(Node::has_shift)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_whitespace() || self.bytes[self.pos] == 0x7F)
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, b: u8) -> Option<()> {
        self.skip_ws();
        if self.peek() == Some(b) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn take_until(&mut self, stop: u8) -> Option<String> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != stop {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return None;
        }
        Some(String::from_utf8_lossy(&self.bytes[start..self.pos]).trim().to_string())
    }

    fn node(&mut self, depth: usize) -> Option<Node> {
        if depth >= MAX_NESTING_DEPTH {
            return None;
        }
        self.expect(b'(')?;
        let header = self.take_until(b'(')?;
        self.expect(b'(')?;
        let params = self.take_until(b')')?;
        self.expect(b')')?;
        self.expect(b'(')?;
        let children = self.nodes(depth + 1)?;
        self.expect(b')')?;
        self.expect(b')')?;

        let key = header
            .split("||")
            .nth(1)
            .unwrap_or(header.as_str())
            .trim()
            .to_string();
        Some(Node {
            key,
            params,
            children,
        })
    }

    fn nodes(&mut self, depth: usize) -> Option<Vec<Node>> {
        let mut out = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'(') => out.push(self.node(depth)?),
                _ => return Some(out),
            }
        }
    }
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCalendarData {
    /// 工作日位图（bit0 = 周一），缺少 DaysOfWeek 时为 None
    pub working_days: Option<u8>,
    pub holidays: BTreeSet<NaiveDate>,
}

/// Excel 风格日期序列号 → 日期
fn serial_to_date(serial: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial))
}

/// 解析 clndr_data；结构无法识别时返回 None
pub fn parse_calendar_data(raw: &str) -> Option<ParsedCalendarData> {
    let mut cursor = Cursor {
        bytes: raw.as_bytes(),
        pos: 0,
    };
    let roots = cursor.nodes(0)?;
    if roots.is_empty() {
        return None;
    }

    let find = |key: &str| roots.iter().find_map(|r| r.find(key));

    let working_days = find("DaysOfWeek").map(|dow| {
        dow.children.iter().fold(0u8, |mask, day| {
            match day.key.parse::<u32>() {
                // 1=周日 → bit6, 2=周一 → bit0 ...
                Ok(n @ 1..=7) if day.has_shift() => mask | (1 << ((n + 5) % 7)),
                _ => mask,
            }
        })
    });

    let mut holidays = BTreeSet::new();
    if let Some(exceptions) = find("Exceptions") {
        for exc in &exceptions.children {
            if exc.has_shift() {
                continue; // 有班次的例外是加班日，不是节假日
            }
            let serial = exc
                .params
                .split('|')
                .collect::<Vec<_>>()
                .windows(2)
                .find(|w| w[0].trim() == "d")
                .and_then(|w| w[1].trim().parse::<i64>().ok());
            if let Some(date) = serial.and_then(serial_to_date) {
                holidays.insert(date);
            }
        }
    }

    Some(ParsedCalendarData {
        working_days,
        holidays,
    })
}
