// ==========================================
// 进度计划引擎 - XER 文件解析器（流式分表读取）
// ==========================================
// 格式: 制表符分隔，逐行标记
//   ERMHDR  文件头
//   %T      表开始（表名）
//   %F      字段列表
//   %R      数据行
//   %E      数据结束
// 职责: 只做分表与列数校验，不理解业务字段
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::schedule_importer_trait::FileParser;
use csv::{ByteRecord, Reader, ReaderBuilder};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// XER 文件签名
pub const XER_SIGNATURE: &str = "ERMHDR";

// ==========================================
// XerRow / XerTable - 无类型行分组
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XerRow {
    pub line_number: u64,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XerTable {
    pub name: String,
    pub line_number: u64,
    pub headers: Vec<String>,
    pub rows: Vec<XerRow>,
}

impl XerTable {
    fn new(name: String, line_number: u64) -> Self {
        Self {
            name,
            line_number,
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// 列名 → 列下标
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

// ==========================================
// XerReader - 惰性表迭代器
// ==========================================
// 一次只持有一张表，峰值内存与最大表相关而非整个文件
// 不可回退：重新读取需在新的流上重新构造
pub struct XerReader<R: Read> {
    reader: Reader<R>,
    record: ByteRecord,
    pending: Option<XerTable>,
    finished: bool,
}

impl<R: Read> XerReader<R> {
    pub fn new(source: R) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true) // 列数校验由本模块按表头完成
            .quoting(false) // XER 不使用引号转义
            .from_reader(source);

        Self {
            reader,
            record: ByteRecord::new(),
            pending: None,
            finished: false,
        }
    }

    fn field(&self, idx: usize) -> String {
        self.record
            .get(idx)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    fn rest_fields(&self) -> Vec<String> {
        self.record
            .iter()
            .skip(1)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    fn malformed(table: &str, line_number: u64, expected: usize, actual: usize) -> ImportError {
        ImportError::MalformedRow {
            table: table.to_string(),
            line_number,
            expected_fields: expected,
            actual_fields: actual,
        }
    }

    fn fail(&mut self, err: ImportError) -> Option<ImportResult<XerTable>> {
        self.finished = true;
        self.pending = None;
        Some(Err(err))
    }
}

impl<R: Read> Iterator for XerReader<R> {
    type Item = ImportResult<XerTable>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut current = self.pending.take();

        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Err(e) => return self.fail(e.into()),
                Ok(false) => {
                    // 缺少 %E 时按 EOF 收尾
                    self.finished = true;
                    return current.map(Ok);
                }
                Ok(true) => {}
            }

            let line_number = self.record.position().map(|p| p.line()).unwrap_or(0);
            let marker = self.field(0);

            match marker.trim() {
                "%T" => {
                    let table = XerTable::new(self.field(1).trim().to_string(), line_number);
                    if let Some(done) = current.take() {
                        self.pending = Some(table);
                        return Some(Ok(done));
                    }
                    current = Some(table);
                }
                "%F" => {
                    let headers: Vec<String> =
                        self.rest_fields().iter().map(|h| h.trim().to_string()).collect();
                    match current.as_mut() {
                        Some(table) => table.headers = headers,
                        None => {
                            let actual = headers.len();
                            return self.fail(Self::malformed("<none>", line_number, 0, actual));
                        }
                    }
                }
                "%R" => {
                    let values = self.rest_fields();
                    let Some(table) = current.as_mut() else {
                        return self.fail(Self::malformed("<none>", line_number, 0, values.len()));
                    };
                    if values.len() != table.headers.len() {
                        let err = Self::malformed(
                            &table.name,
                            line_number,
                            table.headers.len(),
                            values.len(),
                        );
                        return self.fail(err);
                    }
                    table.rows.push(XerRow {
                        line_number,
                        values,
                    });
                }
                "%E" => {
                    self.finished = true;
                    return current.map(Ok);
                }
                // ERMHDR 与其他非标记行不参与分表
                _ => {}
            }
        }
    }
}

// ==========================================
// 上传校验：扩展名 + 文件签名
// ==========================================

/// 校验文件扩展名（.xer，大小写不敏感）
pub fn validate_file_name(file_name: &str) -> ImportResult<()> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if ext != "xer" {
        return Err(ImportError::UnsupportedFormat(if ext.is_empty() {
            file_name.to_string()
        } else {
            ext
        }));
    }
    Ok(())
}

/// 校验文件签名（首个非空内容须以 ERMHDR 开头），不消费缓冲区
pub fn check_signature<R: BufRead>(reader: &mut R) -> ImportResult<()> {
    let head = reader.fill_buf()?;
    let head = head.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let head = &head[start..];

    if head.starts_with(XER_SIGNATURE.as_bytes()) {
        Ok(())
    } else {
        let preview: String = String::from_utf8_lossy(&head[..head.len().min(16)]).into_owned();
        Err(ImportError::InvalidSignature(format!(
            "期望以 {} 开头，实际为 {:?}",
            XER_SIGNATURE, preview
        )))
    }
}

// ==========================================
// XerParser - FileParser 实现
// ==========================================
pub struct XerParser;

impl FileParser for XerParser {
    fn open<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> ImportResult<XerReader<BufReader<Box<dyn Read + Send + 'a>>>> {
        let mut buffered = BufReader::new(source);
        check_signature(&mut buffered)?;
        Ok(XerReader::new(buffered))
    }
}
