// ==========================================
// 进度计划引擎 - 项目级互斥锁注册表
// ==========================================
// 用途: 同一项目的替换/删除事务串行执行
// 约束: 不同项目互不阻塞；锁顺序固定为 项目锁 → 连接锁
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct ProjectLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProjectLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（必要时创建）项目对应的互斥锁
    ///
    /// 顺带清理无人持有的条目：注册表大小以同时在途的项目数为上界
    pub fn lock_for(&self, project_id: &str) -> RepositoryResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| RepositoryError::LockPoisoned(e.to_string()))?;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 已登记的项目数
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
