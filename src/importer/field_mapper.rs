// ==========================================
// 进度计划引擎 - 字段映射器实现
// ==========================================
// 职责: XER 无类型行 → 强类型记录
// 方式: 表名 → 列契约（必填/可选）+ 解码函数 的静态注册表
// 约定: 未知列忽略；未知表跳过并记录警告
// ==========================================

use crate::domain::record::{
    ActivityRecord, CalendarRecord, MappedSchedule, ProjectHeader, RelationshipRecord, WbsRecord,
};
use crate::domain::schedule::{ImportWarning, MON_TO_FRI};
use crate::domain::types::{ActivityStatus, RelationshipType, WarningKind};
use crate::importer::calendar_data::parse_calendar_data;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{XerRow, XerTable};
use crate::importer::schedule_importer_trait::FieldMapper as FieldMapperTrait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};

// ==========================================
// 解码结果（带标签）
// ==========================================
#[derive(Debug, Clone)]
pub enum MappedRecord {
    Project(ProjectHeader),
    Activity(ActivityRecord),
    Relationship(RelationshipRecord),
    Wbs(WbsRecord),
    Calendar(CalendarRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// 必填列存在但该行取值为空
    MissingValue(&'static str),
}

type Decoder = fn(&mut RowView<'_>) -> Result<MappedRecord, RowError>;

/// 单表列契约
pub struct TableContract {
    pub table: &'static str,
    pub required: &'static [&'static str],
    decoder: Decoder,
}

static REGISTRY: &[TableContract] = &[
    TableContract {
        table: "PROJECT",
        required: &["proj_id"],
        decoder: decode_project,
    },
    TableContract {
        table: "TASK",
        required: &["task_id", "task_name"],
        decoder: decode_task,
    },
    TableContract {
        table: "TASKPRED",
        required: &["task_id", "pred_task_id"],
        decoder: decode_task_pred,
    },
    TableContract {
        table: "PROJWBS",
        required: &["wbs_id", "wbs_name"],
        decoder: decode_wbs,
    },
    TableContract {
        table: "CALENDAR",
        required: &["clndr_id"],
        decoder: decode_calendar,
    },
];

/// 按表名查找列契约
pub fn contract_for(table: &str) -> Option<&'static TableContract> {
    REGISTRY.iter().find(|c| c.table == table)
}

// ==========================================
// RowView - 单行字段访问
// ==========================================
pub struct RowView<'a> {
    table: &'a str,
    columns: &'a HashMap<&'a str, usize>,
    row: &'a XerRow,
    notes: Vec<String>,
}

impl<'a> RowView<'a> {
    fn line(&self) -> u64 {
        self.row.line_number
    }

    /// 提取字符串字段（去除首尾空白，空串视为 None）
    fn get_string(&self, column: &str) -> Option<String> {
        let idx = *self.columns.get(column)?;
        let trimmed = self.row.values.get(idx)?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn require(&self, column: &'static str) -> Result<String, RowError> {
        self.get_string(column).ok_or(RowError::MissingValue(column))
    }

    fn note(&mut self, column: &str, value: &str, expected: &str) {
        self.notes.push(format!(
            "表 {} 第 {} 行字段 {} 取值无效 ({:?})，期望{}，已使用默认值",
            self.table,
            self.line(),
            column,
            value,
            expected
        ));
    }

    /// 解析浮点数（与区域设置无关，仅接受 '.' 小数点）
    fn parse_f64(&mut self, column: &str) -> Option<f64> {
        let value = self.get_string(column)?;
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.note(column, &value, "数值");
                None
            }
        }
    }

    fn parse_i64(&mut self, column: &str) -> Option<i64> {
        let value = self.get_string(column)?;
        match value.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.note(column, &value, "整数");
                None
            }
        }
    }

    /// 解析日期（XER: yyyy-MM-dd HH:mm，兼容带秒与纯日期）
    fn parse_date(&mut self, column: &str) -> Option<NaiveDate> {
        let value = self.get_string(column)?;
        let parsed = NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S"))
            .map(|dt| dt.date())
            .or_else(|_| NaiveDate::parse_from_str(&value, "%Y-%m-%d"));
        match parsed {
            Ok(date) => Some(date),
            Err(_) => {
                self.note(column, &value, "日期 yyyy-MM-dd HH:mm");
                None
            }
        }
    }

    /// Y/N 标记
    fn parse_flag(&self, column: &str) -> bool {
        matches!(
            self.get_string(column).as_deref().map(str::to_uppercase).as_deref(),
            Some("Y")
        )
    }
}

// ==========================================
// 各表解码函数
// ==========================================

fn decode_project(row: &mut RowView<'_>) -> Result<MappedRecord, RowError> {
    let source_project_id = row.require("proj_id")?;
    Ok(MappedRecord::Project(ProjectHeader {
        short_name: row.get_string("proj_short_name").unwrap_or_default(),
        plan_start_date: row.parse_date("plan_start_date"),
        plan_end_date: row.parse_date("plan_end_date"),
        scd_end_date: row.parse_date("scd_end_date"),
        data_date: row.parse_date("last_recalc_date"),
        source_project_id,
    }))
}

fn decode_task(row: &mut RowView<'_>) -> Result<MappedRecord, RowError> {
    let task_id = row.require("task_id")?;
    let name = row.require("task_name")?;

    let status = match row.get_string("status_code") {
        None => ActivityStatus::NotStarted,
        Some(code) => ActivityStatus::from_xer(&code).unwrap_or_else(|| {
            row.note("status_code", &code, "TK_NotStart/TK_Active/TK_Complete");
            ActivityStatus::NotStarted
        }),
    };

    let percent_complete = match row.parse_f64("phys_complete_pct") {
        Some(pct) if (0.0..=100.0).contains(&pct) => pct,
        Some(pct) => {
            row.note("phys_complete_pct", &pct.to_string(), "0-100");
            pct.clamp(0.0, 100.0)
        }
        None if status == ActivityStatus::Completed => 100.0,
        None => 0.0,
    };

    let is_milestone = matches!(
        row.get_string("task_type").as_deref(),
        Some("TT_Mile") | Some("TT_FinMile")
    );

    let duration_hours = match row.parse_f64("target_drtn_hr_cnt") {
        Some(h) if h >= 0.0 => h,
        Some(h) => {
            row.note("target_drtn_hr_cnt", &h.to_string(), "非负工时");
            0.0
        }
        None => 0.0,
    };

    Ok(MappedRecord::Activity(ActivityRecord {
        code: row.get_string("task_code").unwrap_or_else(|| task_id.clone()),
        project_id: row.get_string("proj_id"),
        wbs_id: row.get_string("wbs_id"),
        calendar_id: row.get_string("clndr_id"),
        planned_start: row.parse_date("target_start_date"),
        planned_finish: row.parse_date("target_end_date"),
        actual_start: row.parse_date("act_start_date"),
        actual_finish: row.parse_date("act_end_date"),
        duration_hours: if is_milestone { 0.0 } else { duration_hours },
        line_number: row.line(),
        task_id,
        name,
        status,
        percent_complete,
        is_milestone,
    }))
}

fn decode_task_pred(row: &mut RowView<'_>) -> Result<MappedRecord, RowError> {
    let successor_id = row.require("task_id")?;
    let predecessor_id = row.require("pred_task_id")?;

    let rel_type = match row.get_string("pred_type") {
        None => RelationshipType::FinishToStart,
        Some(code) => RelationshipType::from_xer(&code).unwrap_or_else(|| {
            row.note("pred_type", &code, "PR_FS/PR_SS/PR_FF/PR_SF");
            RelationshipType::FinishToStart
        }),
    };

    Ok(MappedRecord::Relationship(RelationshipRecord {
        relationship_id: row.get_string("task_pred_id"),
        lag_hours: row.parse_f64("lag_hr_cnt").unwrap_or(0.0),
        line_number: row.line(),
        predecessor_id,
        successor_id,
        rel_type,
    }))
}

fn decode_wbs(row: &mut RowView<'_>) -> Result<MappedRecord, RowError> {
    let wbs_id = row.require("wbs_id")?;
    let name = row.require("wbs_name")?;
    Ok(MappedRecord::Wbs(WbsRecord {
        project_id: row.get_string("proj_id"),
        parent_id: row.get_string("parent_wbs_id"),
        short_name: row.get_string("wbs_short_name").unwrap_or_default(),
        sequence_number: row.parse_i64("seq_num").unwrap_or(0),
        is_project_node: row.parse_flag("proj_node_flag"),
        line_number: row.line(),
        wbs_id,
        name,
    }))
}

fn decode_calendar(row: &mut RowView<'_>) -> Result<MappedRecord, RowError> {
    let calendar_id = row.require("clndr_id")?;

    let hours_per_day = match row.parse_f64("day_hr_cnt") {
        Some(h) if h > 0.0 => Some(h),
        Some(h) => {
            row.note("day_hr_cnt", &h.to_string(), "正数");
            None
        }
        None => None,
    };

    let (working_days, holidays) = match row.get_string("clndr_data") {
        None => (MON_TO_FRI, BTreeSet::new()),
        Some(raw) => match parse_calendar_data(&raw) {
            Some(parsed) => match parsed.working_days {
                Some(mask) if mask != 0 => (mask, parsed.holidays),
                Some(_) => {
                    row.note("clndr_data", "<无工作日>", "至少一个工作日");
                    (MON_TO_FRI, parsed.holidays)
                }
                None => (MON_TO_FRI, parsed.holidays),
            },
            None => {
                row.note("clndr_data", "<无法解析>", "CalendarData 结构");
                (MON_TO_FRI, BTreeSet::new())
            }
        },
    };

    Ok(MappedRecord::Calendar(CalendarRecord {
        name: row.get_string("clndr_name").unwrap_or_else(|| calendar_id.clone()),
        is_default: row.parse_flag("default_flag"),
        line_number: row.line(),
        calendar_id,
        hours_per_day,
        working_days,
        holidays,
    }))
}

// ==========================================
// FieldMapper - 注册表驱动的映射器
// ==========================================
pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_table(
        &self,
        table: XerTable,
        out: &mut MappedSchedule,
        warnings: &mut Vec<ImportWarning>,
    ) -> ImportResult<usize> {
        let Some(contract) = contract_for(&table.name) else {
            warnings.push(ImportWarning::new(
                WarningKind::UnknownTable,
                format!("跳过未识别的表 {}（{} 行）", table.name, table.rows.len()),
            ));
            return Ok(0);
        };

        // 必填列缺失：整表不可用
        if let Some(missing) = contract
            .required
            .iter()
            .find(|col| !table.headers.iter().any(|h| h == *col))
        {
            return Err(ImportError::MissingRequiredField {
                table: table.name.clone(),
                column: missing.to_string(),
            });
        }

        // 未知列不进入索引（前向兼容）
        let columns: HashMap<&str, usize> = table
            .headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.as_str(), idx))
            .collect();

        let mut mapped = 0;
        for row in &table.rows {
            let mut view = RowView {
                table: contract.table,
                columns: &columns,
                row,
                notes: Vec::new(),
            };

            match (contract.decoder)(&mut view) {
                Ok(record) => {
                    warnings.extend(
                        view.notes
                            .drain(..)
                            .map(|n| ImportWarning::new(WarningKind::InvalidValue, n)),
                    );
                    mapped += 1;
                    match record {
                        MappedRecord::Project(p) => {
                            if let Some(first) = &out.project {
                                warnings.push(ImportWarning::new(
                                    WarningKind::ForeignProject,
                                    format!(
                                        "文件包含多个项目，仅导入 {}，忽略 {}",
                                        first.source_project_id, p.source_project_id
                                    ),
                                ));
                                mapped -= 1;
                            } else {
                                out.project = Some(p);
                            }
                        }
                        MappedRecord::Activity(a) => out.activities.push(a),
                        MappedRecord::Relationship(r) => out.relationships.push(r),
                        MappedRecord::Wbs(w) => out.wbs.push(w),
                        MappedRecord::Calendar(c) => out.calendars.push(c),
                    }
                }
                Err(RowError::MissingValue(column)) => {
                    warnings.push(ImportWarning::new(
                        WarningKind::MissingRequiredField,
                        format!(
                            "表 {} 第 {} 行缺少必填值 {}，已跳过",
                            contract.table, row.line_number, column
                        ),
                    ));
                }
            }
        }

        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> XerTable {
        XerTable {
            name: name.to_string(),
            line_number: 1,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, r)| XerRow {
                    line_number: i as u64 + 3,
                    values: r.iter().map(|v| v.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn map(t: XerTable) -> (ImportResult<usize>, MappedSchedule, Vec<ImportWarning>) {
        let mut out = MappedSchedule::default();
        let mut warnings = Vec::new();
        let result = FieldMapper.map_table(t, &mut out, &mut warnings);
        (result, out, warnings)
    }

    #[test]
    fn test_map_task_basic() {
        let t = table(
            "TASK",
            &[
                "task_id", "wbs_id", "task_code", "task_name", "status_code",
                "target_start_date", "target_drtn_hr_cnt", "phys_complete_pct", "future_col",
            ],
            &[&["10", "W1", "A1000", "Excavate", "TK_Active", "2024-01-08 08:00", "40", "25.5", "x"]],
        );
        let (result, out, warnings) = map(t);

        assert_eq!(result.unwrap(), 1);
        assert!(warnings.is_empty());
        let a = &out.activities[0];
        assert_eq!(a.task_id, "10");
        assert_eq!(a.code, "A1000");
        assert_eq!(a.status, ActivityStatus::InProgress);
        assert_eq!(a.duration_hours, 40.0);
        assert_eq!(a.percent_complete, 25.5);
        assert_eq!(a.planned_start, Some(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()));
        assert_eq!(a.wbs_id.as_deref(), Some("W1"));
        assert_eq!(a.calendar_id, None);
    }

    #[test]
    fn test_missing_required_column_fails_table() {
        let t = table("TASKPRED", &["task_id", "pred_type"], &[&["10", "PR_FS"]]);
        let (result, _, _) = map(t);
        match result {
            Err(ImportError::MissingRequiredField { table, column }) => {
                assert_eq!(table, "TASKPRED");
                assert_eq!(column, "pred_task_id");
            }
            other => panic!("Expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_required_value_skips_row() {
        let t = table(
            "TASK",
            &["task_id", "task_name"],
            &[&["10", "Dig"], &["", "Orphan"], &["12", "Pour"]],
        );
        let (result, out, warnings) = map(t);
        assert_eq!(result.unwrap(), 2);
        assert_eq!(out.activities.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MissingRequiredField);
        assert!(warnings[0].message.contains("第 4 行"));
    }

    #[test]
    fn test_invalid_optional_value_defaults_with_warning() {
        let t = table(
            "TASK",
            &["task_id", "task_name", "target_drtn_hr_cnt", "target_start_date"],
            &[&["10", "Dig", "1,5", "08/01/2024"]],
        );
        let (_, out, warnings) = map(t);
        assert_eq!(out.activities[0].duration_hours, 0.0);
        assert_eq!(out.activities[0].planned_start, None);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::InvalidValue));
    }

    #[test]
    fn test_completed_without_percent_defaults_to_100() {
        let t = table(
            "TASK",
            &["task_id", "task_name", "status_code"],
            &[&["10", "Dig", "TK_Complete"]],
        );
        let (_, out, _) = map(t);
        assert_eq!(out.activities[0].percent_complete, 100.0);
    }

    #[test]
    fn test_milestone_has_zero_duration() {
        let t = table(
            "TASK",
            &["task_id", "task_name", "task_type", "target_drtn_hr_cnt"],
            &[&["10", "Start", "TT_Mile", "8"]],
        );
        let (_, out, _) = map(t);
        assert!(out.activities[0].is_milestone);
        assert_eq!(out.activities[0].duration_hours, 0.0);
    }

    #[test]
    fn test_map_relationship_defaults() {
        let t = table(
            "TASKPRED",
            &["task_pred_id", "task_id", "pred_task_id", "pred_type", "lag_hr_cnt"],
            &[&["1", "11", "10", "PR_SS", "-16"], &["2", "12", "11", "", ""]],
        );
        let (_, out, _) = map(t);
        assert_eq!(out.relationships[0].rel_type, RelationshipType::StartToStart);
        assert_eq!(out.relationships[0].lag_hours, -16.0);
        assert_eq!(out.relationships[1].rel_type, RelationshipType::FinishToStart);
        assert_eq!(out.relationships[1].lag_hours, 0.0);
    }

    #[test]
    fn test_unknown_table_is_warning() {
        let t = table("RSRC", &["rsrc_id"], &[&["1"]]);
        let (result, _, warnings) = map(t);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(warnings[0].kind, WarningKind::UnknownTable);
    }

    #[test]
    fn test_second_project_is_ignored() {
        let t = table(
            "PROJECT",
            &["proj_id", "proj_short_name", "plan_start_date"],
            &[&["1", "MAIN", "2024-01-08 00:00"], &["2", "OTHER", ""]],
        );
        let (result, out, warnings) = map(t);
        assert_eq!(result.unwrap(), 1);
        let project = out.project.unwrap();
        assert_eq!(project.short_name, "MAIN");
        assert_eq!(project.plan_start_date, NaiveDate::from_ymd_opt(2024, 1, 8));
        assert_eq!(warnings[0].kind, WarningKind::ForeignProject);
    }

    #[test]
    fn test_calendar_without_data_is_five_day() {
        let t = table(
            "CALENDAR",
            &["clndr_id", "clndr_name", "default_flag", "day_hr_cnt"],
            &[&["5", "Standard", "Y", "8"]],
        );
        let (_, out, _) = map(t);
        let c = &out.calendars[0];
        assert_eq!(c.working_days, MON_TO_FRI);
        assert!(c.is_default);
        assert_eq!(c.hours_per_day, Some(8.0));
    }

    #[test]
    fn test_wbs_flags() {
        let t = table(
            "PROJWBS",
            &["wbs_id", "parent_wbs_id", "wbs_short_name", "wbs_name", "seq_num", "proj_node_flag"],
            &[&["100", "", "ROOT", "Project", "0", "Y"], &["101", "100", "CIV", "Civil", "abc", "N"]],
        );
        let (_, out, warnings) = map(t);
        assert!(out.wbs[0].is_project_node);
        assert_eq!(out.wbs[0].parent_id, None);
        assert_eq!(out.wbs[1].parent_id.as_deref(), Some("100"));
        assert_eq!(out.wbs[1].sequence_number, 0);
        assert_eq!(warnings.len(), 1);
    }
}
