// ==========================================
// 进度计划引擎 - 计划数据仓储
// ==========================================
// 职责: 导入批次及其子表（日历/WBS/作业/关系）的原子替换与读取
// 红线: Repository 不含业务逻辑，只做数据读写
// ==========================================
// 替换语义（单个 BEGIN IMMEDIATE 事务）:
//   1. 确保 project 行存在
//   2. 删除项目旧导入（子表级联删除，指针置空）
//   3. 写入新导入及全部子表
//   4. 更新 project.current_import_id
// 任一步失败整体回滚，旧计划保持可见
// ==========================================

use crate::domain::schedule::{
    Activity, Calendar, Relationship, ScheduleImport, ScheduleImportData, WbsNode, WbsProgress,
};
use crate::domain::types::{ActivityStatus, RelationshipType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::project_lock::ProjectLockRegistry;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

// ==========================================
// ScheduleRepository - 计划仓储
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
    locks: Arc<ProjectLockRegistry>,
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn rel_type_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<RelationshipType> {
    let raw: String = row.get(idx)?;
    RelationshipType::from_code(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(RepositoryError::CorruptColumn {
                column: "rel_type".to_string(),
                message: format!("未知关系类型: {}", raw),
            }),
        )
    })
}

impl ScheduleRepository {
    /// 创建新的 ScheduleRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>, locks: Arc<ProjectLockRegistry>) -> Self {
        Self { conn, locks }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 原子替换项目的当前计划
    ///
    /// # 返回
    /// - `Ok(import_id)`: 新导入 ID
    /// - `Err`: 事务已回滚，旧计划不变
    pub fn replace_schedule(&self, data: &ScheduleImportData) -> RepositoryResult<String> {
        let project_id = data.import.project_id.as_str();
        let project_lock = self.locks.lock_for(project_id)?;
        let _project_guard = project_lock
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))?;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            "INSERT INTO project (project_id) VALUES (?1) ON CONFLICT(project_id) DO NOTHING",
            params![project_id],
        )?;

        let removed = tx.execute(
            "DELETE FROM schedule_import WHERE project_id = ?1",
            params![project_id],
        )?;

        Self::insert_import_tx(&tx, &data.import)?;
        Self::insert_calendars_tx(&tx, &data.import.import_id, &data.calendars)?;
        Self::insert_wbs_tx(&tx, &data.import.import_id, &data.wbs_nodes, &data.wbs_progress)?;
        Self::insert_activities_tx(&tx, &data.import.import_id, &data.activities)?;
        Self::insert_relationships_tx(&tx, &data.import.import_id, &data.relationships)?;

        tx.execute(
            r#"UPDATE project
               SET current_import_id = ?1, updated_at = datetime('now')
               WHERE project_id = ?2"#,
            params![&data.import.import_id, project_id],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            project_id = %project_id,
            import_id = %data.import.import_id,
            replaced = removed > 0,
            activities = data.activities.len(),
            "计划已替换"
        );
        Ok(data.import.import_id.clone())
    }

    /// 删除项目的当前计划
    ///
    /// # 返回
    /// - `Ok(true)`: 已删除
    /// - `Ok(false)`: 项目没有计划
    pub fn delete_schedule(&self, project_id: &str) -> RepositoryResult<bool> {
        let project_lock = self.locks.lock_for(project_id)?;
        let _project_guard = project_lock
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))?;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        // 子表级联删除；project.current_import_id 由外键置空
        let removed = tx.execute(
            "DELETE FROM schedule_import WHERE project_id = ?1",
            params![project_id],
        )?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(project_id = %project_id, removed, "计划删除");
        Ok(removed > 0)
    }

    fn insert_import_tx(tx: &Transaction, import: &ScheduleImport) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO schedule_import (
                import_id, project_id, source_file_name, source_project_name, imported_at,
                activities_count, relationships_count, wbs_count, warnings_json,
                project_start, project_finish, critical_path_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                &import.import_id,
                &import.project_id,
                &import.source_file_name,
                &import.source_project_name,
                &import.imported_at,
                import.activities_count as i64,
                import.relationships_count as i64,
                import.wbs_count as i64,
                serde_json::to_string(&import.warnings)?,
                &import.project_start,
                &import.project_finish,
                serde_json::to_string(&import.critical_path)?,
            ],
        )?;
        Ok(())
    }

    fn insert_calendars_tx(tx: &Transaction, import_id: &str, calendars: &[Calendar]) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"INSERT INTO schedule_calendar (
                row_id, import_id, calendar_id, name, hours_per_day,
                working_days, holidays_json, is_default
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )?;
        for cal in calendars {
            let holidays: Vec<String> = cal.holidays.iter().map(|d| d.to_string()).collect();
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                import_id,
                &cal.calendar_id,
                &cal.name,
                cal.hours_per_day,
                cal.working_days as i64,
                serde_json::to_string(&holidays)?,
                cal.is_default,
            ])?;
        }
        Ok(calendars.len())
    }

    fn insert_wbs_tx(
        tx: &Transaction,
        import_id: &str,
        nodes: &[WbsNode],
        progress: &[WbsProgress],
    ) -> RepositoryResult<usize> {
        let by_id: HashMap<&str, &WbsProgress> =
            progress.iter().map(|p| (p.wbs_id.as_str(), p)).collect();

        let mut stmt = tx.prepare(
            r#"INSERT INTO schedule_wbs_node (
                row_id, import_id, wbs_id, parent_wbs_id, short_name, name, sequence_number,
                percent_complete, total_weight, activity_count, no_activities
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
        )?;
        for node in nodes {
            let p = by_id.get(node.wbs_id.as_str());
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                import_id,
                &node.wbs_id,
                &node.parent_id,
                &node.short_name,
                &node.name,
                node.sequence_number,
                p.map_or(0.0, |p| p.percent_complete),
                p.map_or(0, |p| p.total_weight),
                p.map_or(0, |p| p.activity_count as i64),
                p.map_or(true, |p| p.no_activities),
            ])?;
        }
        Ok(nodes.len())
    }

    fn insert_activities_tx(tx: &Transaction, import_id: &str, activities: &[Activity]) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"INSERT INTO schedule_activity (
                row_id, import_id, activity_id, code, wbs_id, name, calendar_id,
                planned_start, planned_finish, actual_start, actual_finish,
                duration_working_days, percent_complete, status, is_milestone,
                early_start, early_finish, late_start, late_finish, total_float, is_critical
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21)"#,
        )?;
        for a in activities {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                import_id,
                &a.activity_id,
                &a.code,
                &a.wbs_id,
                &a.name,
                &a.calendar_id,
                &a.planned_start,
                &a.planned_finish,
                &a.actual_start,
                &a.actual_finish,
                a.duration_working_days,
                a.percent_complete,
                a.status.as_db_str(),
                a.is_milestone,
                &a.early_start,
                &a.early_finish,
                &a.late_start,
                &a.late_finish,
                &a.total_float,
                a.is_critical,
            ])?;
        }
        Ok(activities.len())
    }

    fn insert_relationships_tx(
        tx: &Transaction,
        import_id: &str,
        relationships: &[Relationship],
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"INSERT INTO schedule_relationship (
                row_id, import_id, predecessor_id, successor_id, rel_type, lag_working_days
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )?;
        for r in relationships {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                import_id,
                &r.predecessor_id,
                &r.successor_id,
                r.rel_type.code(),
                r.lag_working_days,
            ])?;
        }
        Ok(relationships.len())
    }

    // ==========================================
    // 读取
    // ==========================================

    /// 项目当前导入（无计划返回 None）
    pub fn find_current_import(&self, project_id: &str) -> RepositoryResult<Option<ScheduleImport>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT i.import_id, i.project_id, i.source_file_name, i.source_project_name,
                      i.imported_at, i.activities_count, i.relationships_count, i.wbs_count,
                      i.warnings_json, i.project_start, i.project_finish, i.critical_path_json
               FROM project p
               JOIN schedule_import i ON i.import_id = p.current_import_id
               WHERE p.project_id = ?1"#,
            params![project_id],
            Self::map_import_row,
        ) {
            Ok(import) => Ok(Some(import)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 导入下的全部作业（按 activity_id 排序）
    pub fn list_activities(&self, import_id: &str) -> RepositoryResult<Vec<Activity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT activity_id, code, wbs_id, name, calendar_id,
                      planned_start, planned_finish, actual_start, actual_finish,
                      duration_working_days, percent_complete, status, is_milestone,
                      early_start, early_finish, late_start, late_finish, total_float, is_critical
               FROM schedule_activity
               WHERE import_id = ?1
               ORDER BY activity_id"#,
        )?;

        let activities = stmt
            .query_map(params![import_id], |row| {
                let status: String = row.get(11)?;
                Ok(Activity {
                    activity_id: row.get(0)?,
                    code: row.get(1)?,
                    wbs_id: row.get(2)?,
                    name: row.get(3)?,
                    calendar_id: row.get(4)?,
                    planned_start: row.get(5)?,
                    planned_finish: row.get(6)?,
                    actual_start: row.get(7)?,
                    actual_finish: row.get(8)?,
                    duration_working_days: row.get(9)?,
                    percent_complete: row.get(10)?,
                    status: ActivityStatus::from_db_str(&status),
                    is_milestone: row.get(12)?,
                    early_start: row.get(13)?,
                    early_finish: row.get(14)?,
                    late_start: row.get(15)?,
                    late_finish: row.get(16)?,
                    total_float: row.get(17)?,
                    is_critical: row.get(18)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(activities)
    }

    /// 导入下的全部关系
    pub fn list_relationships(&self, import_id: &str) -> RepositoryResult<Vec<Relationship>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT predecessor_id, successor_id, rel_type, lag_working_days
               FROM schedule_relationship
               WHERE import_id = ?1
               ORDER BY predecessor_id, successor_id, rel_type"#,
        )?;

        let relationships = stmt
            .query_map(params![import_id], |row| {
                Ok(Relationship {
                    predecessor_id: row.get(0)?,
                    successor_id: row.get(1)?,
                    rel_type: rel_type_column(row, 2)?,
                    lag_working_days: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(relationships)
    }

    /// 导入下的 WBS 汇总行（按 wbs_id 排序）
    pub fn list_wbs_progress(&self, import_id: &str) -> RepositoryResult<Vec<WbsProgress>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT wbs_id, parent_wbs_id, name, percent_complete,
                      total_weight, activity_count, no_activities
               FROM schedule_wbs_node
               WHERE import_id = ?1
               ORDER BY wbs_id"#,
        )?;

        let rows = stmt
            .query_map(params![import_id], |row| {
                let count: i64 = row.get(5)?;
                Ok(WbsProgress {
                    wbs_id: row.get(0)?,
                    parent_id: row.get(1)?,
                    name: row.get(2)?,
                    percent_complete: row.get(3)?,
                    total_weight: row.get(4)?,
                    activity_count: count.max(0) as usize,
                    no_activities: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn map_import_row(row: &Row<'_>) -> rusqlite::Result<ScheduleImport> {
        let activities: i64 = row.get(5)?;
        let relationships: i64 = row.get(6)?;
        let wbs: i64 = row.get(7)?;
        Ok(ScheduleImport {
            import_id: row.get(0)?,
            project_id: row.get(1)?,
            source_file_name: row.get(2)?,
            source_project_name: row.get(3)?,
            imported_at: row.get(4)?,
            activities_count: activities.max(0) as usize,
            relationships_count: relationships.max(0) as usize,
            wbs_count: wbs.max(0) as usize,
            warnings: json_column(row, 8)?,
            project_start: row.get(9)?,
            project_finish: row.get(10)?,
            critical_path: json_column(row, 11)?,
        })
    }
}
