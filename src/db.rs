// ==========================================
// 进度计划引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 所有 Connection::open 共用同一组 PRAGMA（外键、busy_timeout）
// - 建表幂等，可在每次启动时执行
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启（级联删除依赖它）
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id   TEXT NOT NULL DEFAULT 'global',
    key        TEXT NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- 项目：仅保存"当前计划"指针，其余字段属于外部 CRUD
CREATE TABLE IF NOT EXISTS project (
    project_id        TEXT PRIMARY KEY,
    current_import_id TEXT REFERENCES schedule_import(import_id) ON DELETE SET NULL,
    updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS schedule_import (
    import_id           TEXT PRIMARY KEY,
    project_id          TEXT NOT NULL REFERENCES project(project_id) ON DELETE CASCADE,
    source_file_name    TEXT NOT NULL,
    source_project_name TEXT NOT NULL,
    imported_at         TEXT NOT NULL,
    activities_count    INTEGER NOT NULL,
    relationships_count INTEGER NOT NULL,
    wbs_count           INTEGER NOT NULL,
    warnings_json       TEXT NOT NULL DEFAULT '[]',
    project_start       TEXT,
    project_finish      TEXT,
    critical_path_json  TEXT NOT NULL DEFAULT '[]'
);
-- 每个项目至多一个导入
CREATE UNIQUE INDEX IF NOT EXISTS ux_schedule_import_project ON schedule_import(project_id);

CREATE TABLE IF NOT EXISTS schedule_calendar (
    row_id        TEXT PRIMARY KEY,
    import_id     TEXT NOT NULL REFERENCES schedule_import(import_id) ON DELETE CASCADE,
    calendar_id   TEXT NOT NULL,
    name          TEXT NOT NULL,
    hours_per_day REAL NOT NULL,
    working_days  INTEGER NOT NULL,
    holidays_json TEXT NOT NULL DEFAULT '[]',
    is_default    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (import_id, calendar_id)
);

CREATE TABLE IF NOT EXISTS schedule_wbs_node (
    row_id           TEXT PRIMARY KEY,
    import_id        TEXT NOT NULL REFERENCES schedule_import(import_id) ON DELETE CASCADE,
    wbs_id           TEXT NOT NULL,
    parent_wbs_id    TEXT,
    short_name       TEXT NOT NULL,
    name             TEXT NOT NULL,
    sequence_number  INTEGER NOT NULL DEFAULT 0,
    percent_complete REAL NOT NULL DEFAULT 0,
    total_weight     INTEGER NOT NULL DEFAULT 0,
    activity_count   INTEGER NOT NULL DEFAULT 0,
    no_activities    INTEGER NOT NULL DEFAULT 1,
    UNIQUE (import_id, wbs_id)
);

CREATE TABLE IF NOT EXISTS schedule_activity (
    row_id                TEXT PRIMARY KEY,
    import_id             TEXT NOT NULL REFERENCES schedule_import(import_id) ON DELETE CASCADE,
    activity_id           TEXT NOT NULL,
    code                  TEXT NOT NULL,
    wbs_id                TEXT,
    name                  TEXT NOT NULL,
    calendar_id           TEXT NOT NULL,
    planned_start         TEXT,
    planned_finish        TEXT,
    actual_start          TEXT,
    actual_finish         TEXT,
    duration_working_days INTEGER NOT NULL,
    percent_complete      REAL NOT NULL,
    status                TEXT NOT NULL,
    is_milestone          INTEGER NOT NULL DEFAULT 0,
    early_start           TEXT,
    early_finish          TEXT,
    late_start            TEXT,
    late_finish           TEXT,
    total_float           INTEGER,
    is_critical           INTEGER NOT NULL DEFAULT 0,
    UNIQUE (import_id, activity_id)
);

CREATE TABLE IF NOT EXISTS schedule_relationship (
    row_id           TEXT PRIMARY KEY,
    import_id        TEXT NOT NULL REFERENCES schedule_import(import_id) ON DELETE CASCADE,
    predecessor_id   TEXT NOT NULL,
    successor_id     TEXT NOT NULL,
    rel_type         TEXT NOT NULL,
    lag_working_days INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS ix_schedule_activity_import ON schedule_activity(import_id);
CREATE INDEX IF NOT EXISTS ix_schedule_relationship_import ON schedule_relationship(import_id);
CREATE INDEX IF NOT EXISTS ix_schedule_wbs_node_import ON schedule_wbs_node(import_id);
"#;

/// 幂等建表，并记录 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}
