// ==========================================
// 进度计划引擎 - 计划导入器实现
// ==========================================
// 职责: 整合导入流程，从上传内容到数据库
// 流程: 校验 → 分表 → 映射 → 建网 → CPM → 汇总 → 落库
// 红线: 落库前任一致命错误直接返回，不产生任何写入
// ==========================================

use crate::config::{ScheduleConfigReader, ScheduleEngineConfig};
use crate::domain::record::MappedSchedule;
use crate::domain::schedule::{ImportOutcome, ImportWarning, ScheduleImport, ScheduleImportData};
use crate::domain::types::WarningKind;
use crate::engine::{CpmCalculator, NetworkBuilder, ProgressAggregator};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::validate_file_name;
use crate::importer::schedule_importer_trait::{FieldMapper, FileParser, ScheduleImporter};
use crate::repository::ScheduleRepository;
use chrono::{Local, NaiveDate, Utc};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 缺失必填列即整体失败的核心表（PROJECT 缺失时按文件名/最早计划开始回退）
const CORE_TABLES: [&str; 1] = ["TASK"];

// ==========================================
// ScheduleImporterImpl - 计划导入器实现
// ==========================================
pub struct ScheduleImporterImpl<C>
where
    C: ScheduleConfigReader,
{
    // 数据访问层
    schedule_repo: Arc<ScheduleRepository>,

    // 配置读取器
    config: Arc<C>,

    // 导入组件（计算阶段移入阻塞线程池，需共享所有权）
    file_parser: Arc<dyn FileParser>,
    field_mapper: Arc<dyn FieldMapper>,

    // 固定“今天”（测试用），None 时取本地日期
    today: Option<NaiveDate>,
}

impl<C> ScheduleImporterImpl<C>
where
    C: ScheduleConfigReader,
{
    /// 创建新的 ScheduleImporter 实例
    ///
    /// # 参数
    /// - schedule_repo: 计划仓储
    /// - config: 配置读取器
    /// - file_parser: 文件解析器
    /// - field_mapper: 字段映射器
    pub fn new(
        schedule_repo: Arc<ScheduleRepository>,
        config: Arc<C>,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
    ) -> Self {
        Self {
            schedule_repo,
            config,
            file_parser: Arc::from(file_parser),
            field_mapper: Arc::from(field_mapper),
            today: None,
        }
    }

    /// 固定“今天”（影响项目开始日期的最终回退值）
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn pipeline(&self) -> ImportPipeline {
        ImportPipeline {
            file_parser: Arc::clone(&self.file_parser),
            field_mapper: Arc::clone(&self.field_mapper),
            today: self.today.unwrap_or_else(|| Local::now().date_naive()),
        }
    }
}

// ==========================================
// ImportPipeline - 同步计算阶段（运行于阻塞线程池）
// ==========================================
struct ImportPipeline {
    file_parser: Arc<dyn FileParser>,
    field_mapper: Arc<dyn FieldMapper>,
    today: NaiveDate,
}

impl ImportPipeline {
    /// 分表读取 + 字段映射
    fn read_tables(
        &self,
        content: Vec<u8>,
        warnings: &mut Vec<ImportWarning>,
    ) -> ImportResult<MappedSchedule> {
        let source: Box<dyn Read + Send> = Box::new(Cursor::new(content));
        let reader = self.file_parser.open(source)?;

        let mut mapped = MappedSchedule::default();
        for table in reader {
            let table = table?;
            let name = table.name.clone();
            let rows = table.rows.len();

            match self.field_mapper.map_table(table, &mut mapped, warnings) {
                Ok(count) => {
                    debug!(table = %name, rows, mapped = count, "表映射完成");
                }
                Err(ImportError::MissingRequiredField { table, column })
                    if !CORE_TABLES.contains(&table.as_str()) =>
                {
                    warn!(table = %table, column = %column, "表缺少必填列，整表跳过");
                    warnings.push(ImportWarning::new(
                        WarningKind::MissingRequiredField,
                        format!("表 {} 缺少必填列 {}，整表跳过", table, column),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(mapped)
    }

    /// 同步计算阶段：映射 → 建网 → CPM → 汇总
    ///
    /// # 返回
    /// - 可直接落库的数据（导入 ID 已生成）
    fn build_import_data(
        &self,
        project_id: &str,
        file_name: &str,
        content: Vec<u8>,
        config: &ScheduleEngineConfig,
        warnings: &mut Vec<ImportWarning>,
    ) -> ImportResult<ScheduleImportData> {
        // === 步骤 3: 分表 + 字段映射 ===
        debug!("步骤 3: 分表读取与字段映射");
        let mapped = self.read_tables(content, warnings)?;
        info!(
            activities = mapped.activities.len(),
            relationships = mapped.relationships.len(),
            wbs = mapped.wbs.len(),
            calendars = mapped.calendars.len(),
            "字段映射完成"
        );

        // === 步骤 4: 网络构建 ===
        debug!("步骤 4: 网络构建");
        let built = NetworkBuilder::new(config.default_day_hours).build(mapped, self.today, warnings)?;
        let mut network = built.network;

        // === 步骤 5: CPM 计算 ===
        debug!("步骤 5: CPM 计算");
        let target_finish = if config.honor_project_target_finish {
            built.project.as_ref().and_then(|p| p.target_finish())
        } else {
            None
        };
        let cpm = CpmCalculator::new(config.critical_float_threshold).calculate(
            &mut network,
            built.project_start,
            target_finish,
            warnings,
        )?;
        info!(
            project_start = %cpm.project_start,
            project_finish = %cpm.project_finish,
            critical = cpm.critical_count,
            "CPM 计算完成"
        );

        // === 步骤 6: WBS 进度汇总 ===
        debug!("步骤 6: WBS 进度汇总");
        let wbs_progress = ProgressAggregator::roll_up(&network.activities, &built.wbs);

        // === 步骤 7: 组装导入批次 ===
        let source_project_name = built
            .project
            .as_ref()
            .map(|p| p.short_name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                Path::new(file_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(file_name)
                    .to_string()
            });

        let relationships = network.relationships();
        let import = ScheduleImport {
            import_id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            source_file_name: file_name.to_string(),
            source_project_name,
            imported_at: Utc::now(),
            activities_count: network.activities.len(),
            relationships_count: relationships.len(),
            wbs_count: built.wbs.nodes.len(),
            warnings: warnings.iter().map(ToString::to_string).collect(),
            project_start: Some(cpm.project_start),
            project_finish: Some(cpm.project_finish),
            critical_path: cpm.critical_path,
        };

        Ok(ScheduleImportData {
            import,
            activities: network.activities,
            relationships,
            wbs_nodes: built.wbs.nodes,
            calendars: network.calendars,
            wbs_progress,
        })
    }
}

#[async_trait::async_trait]
impl<C> ScheduleImporter for ScheduleImporterImpl<C>
where
    C: ScheduleConfigReader + 'static,
{
    #[instrument(skip(self, content), fields(size = content.len(), import_id))]
    async fn import_schedule(
        &self,
        project_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> ImportResult<ImportOutcome> {
        let start_time = Instant::now();
        info!(project_id = %project_id, file_name = %file_name, "开始导入计划");

        // === 步骤 1: 文件名校验 ===
        debug!("步骤 1: 文件名校验");
        validate_file_name(file_name)?;

        // === 步骤 2: 读取配置 ===
        debug!("步骤 2: 读取配置");
        let config = self
            .config
            .load_engine_config()
            .await
            .map_err(|e| ImportError::ConfigReadError {
                key: "engine".to_string(),
                message: e.to_string(),
            })?;

        let size = content.len() as u64;
        if size > config.max_upload_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                limit: config.max_upload_bytes,
            });
        }

        // === 步骤 3-7: 同步计算（阻塞线程池） ===
        let pipeline = self.pipeline();
        let span = tracing::Span::current();
        let (project, name) = (project_id.to_string(), file_name.to_string());
        let (data, warnings) = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                let mut warnings: Vec<ImportWarning> = Vec::new();
                pipeline
                    .build_import_data(&project, &name, content, &config, &mut warnings)
                    .map(|data| (data, warnings))
            })
        })
        .await
        .map_err(|e| ImportError::InternalError(format!("计算任务异常: {}", e)))?
        .map_err(|e| {
            error!(error = %e, "导入计算失败，未写入任何数据");
            e
        })?;
        tracing::Span::current().record("import_id", data.import.import_id.as_str());

        let outcome_base = (
            data.import.activities_count,
            data.import.relationships_count,
            data.import.wbs_count,
            data.import.source_project_name.clone(),
        );

        // === 步骤 8: 落库（事务化替换） ===
        debug!("步骤 8: 落库");
        let repo = Arc::clone(&self.schedule_repo);
        let import_id = tokio::task::spawn_blocking(move || repo.replace_schedule(&data))
            .await
            .map_err(|e| ImportError::InternalError(format!("落库任务异常: {}", e)))?
            .map_err(|e| {
                error!(error = %e, "计划落库失败");
                ImportError::from(e)
            })?;

        let (activities_count, relationships_count, wbs_count, source_project_name) = outcome_base;
        let elapsed_ms = start_time.elapsed().as_millis();
        info!(
            import_id = %import_id,
            activities = activities_count,
            relationships = relationships_count,
            wbs = wbs_count,
            warnings = warnings.len(),
            elapsed_ms = elapsed_ms as u64,
            "计划导入完成"
        );

        Ok(ImportOutcome {
            import_id,
            activities_count,
            relationships_count,
            wbs_count,
            source_project_name,
            warnings,
            elapsed_ms,
        })
    }

    #[instrument(skip(self))]
    async fn delete_schedule(&self, project_id: &str) -> ImportResult<bool> {
        let repo = Arc::clone(&self.schedule_repo);
        let project = project_id.to_string();
        let deleted = tokio::task::spawn_blocking(move || repo.delete_schedule(&project))
            .await
            .map_err(|e| ImportError::InternalError(format!("删除任务异常: {}", e)))??;

        info!(project_id = %project_id, deleted, "删除计划");
        Ok(deleted)
    }
}
