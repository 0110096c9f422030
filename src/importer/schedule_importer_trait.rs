// ==========================================
// 进度计划引擎 - 计划导入 Trait
// ==========================================
// 职责: 定义计划导入接口（不包含实现）
// ==========================================

use crate::domain::record::MappedSchedule;
use crate::domain::schedule::{ImportOutcome, ImportWarning};
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{XerReader, XerTable};
use async_trait::async_trait;
use std::io::{BufReader, Read};

// ==========================================
// ScheduleImporter Trait
// ==========================================
// 用途: 计划导入主接口
// 实现者: ScheduleImporterImpl
#[async_trait]
pub trait ScheduleImporter: Send + Sync {
    /// 导入 XER 文件并原子替换项目的当前计划
    ///
    /// # 参数
    /// - project_id: 目标项目
    /// - file_name: 上传文件名（用于扩展名校验与审计）
    /// - content: 文件内容
    ///
    /// # 导入流程
    /// 1. 文件名 + 签名校验
    /// 2. 分表读取 + 字段映射
    /// 3. 网络构建（引用解析、环检测）
    /// 4. CPM 计算
    /// 5. 进度汇总
    /// 6. 落库（事务化替换）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 计数 + 警告
    /// - Err: 致命错误，已有计划保持不变
    async fn import_schedule(
        &self,
        project_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> ImportResult<ImportOutcome>;

    /// 删除项目的当前计划（无计划时返回 false）
    async fn delete_schedule(&self, project_id: &str) -> ImportResult<bool>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 签名校验 + 惰性分表
// 实现者: XerParser
pub trait FileParser: Send + Sync {
    fn open<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> ImportResult<XerReader<BufReader<Box<dyn Read + Send + 'a>>>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 单表映射为强类型记录
// 实现者: FieldMapper (field_mapper.rs)
pub trait FieldMapper: Send + Sync {
    /// 映射一张表，返回成功映射的行数
    ///
    /// # 返回
    /// - Err(MissingRequiredField): 表缺少必填列，由调用方决定是否致命
    fn map_table(
        &self,
        table: XerTable,
        out: &mut MappedSchedule,
        warnings: &mut Vec<ImportWarning>,
    ) -> ImportResult<usize>;
}
