// ==========================================
// 进度计划引擎 - 网络构建器
// ==========================================
// 输入: 映射阶段的强类型记录
// 输出: 作业有向图（下标邻接表）+ WBS 森林
// 红线: 图中不存在悬空边；存在环则整体失败
// ==========================================
// 引用处理:
//   关系端点缺失 → 警告 + 丢弃该关系
//   WBS 父节点缺失/成环 → 警告 + 挂到根
//   作业 WBS 缺失 → 警告 + 挂到根
//   作业日历缺失 → 警告 + 默认五天日历
// ==========================================

use crate::domain::record::{MappedSchedule, ProjectHeader};
use crate::domain::schedule::{
    Activity, Calendar, ImportWarning, Relationship, WbsNode, DEFAULT_CALENDAR_ID,
};
use crate::domain::types::{RelationshipType, WarningKind};
use crate::engine::calendar::CalendarCore;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, instrument};

// ==========================================
// ScheduleNetwork - 作业网络（arena + 邻接表）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkEdge {
    pub from: usize,
    pub to: usize,
    pub rel_type: RelationshipType,
    pub lag: i64,
}

#[derive(Debug, Clone)]
pub struct ScheduleNetwork {
    /// 按 activity_id 升序排列
    pub activities: Vec<Activity>,
    pub calendars: Vec<Calendar>,
    /// 作业下标 → 日历下标
    pub calendar_of: Vec<usize>,
    pub edges: Vec<NetworkEdge>,
    /// 作业下标 → 出边下标（按后继 id 升序）
    pub successors: Vec<Vec<usize>>,
    /// 作业下标 → 入边下标（按前驱 id 升序）
    pub predecessors: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
}

impl ScheduleNetwork {
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn index_of(&self, activity_id: &str) -> Option<usize> {
        self.index.get(activity_id).copied()
    }

    pub fn calendar(&self, activity_idx: usize) -> &Calendar {
        &self.calendars[self.calendar_of[activity_idx]]
    }

    /// 导出为领域关系列表（落库用）
    pub fn relationships(&self) -> Vec<Relationship> {
        self.edges
            .iter()
            .map(|e| Relationship {
                predecessor_id: self.activities[e.from].activity_id.clone(),
                successor_id: self.activities[e.to].activity_id.clone(),
                rel_type: e.rel_type,
                lag_working_days: e.lag,
            })
            .collect()
    }
}

// ==========================================
// WbsForest - WBS 森林
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct WbsForest {
    /// 按 wbs_id 升序排列
    pub nodes: Vec<WbsNode>,
    pub children: Vec<Vec<usize>>,
    pub roots: Vec<usize>,
    index: HashMap<String, usize>,
}

impl WbsForest {
    pub fn index_of(&self, wbs_id: &str) -> Option<usize> {
        self.index.get(wbs_id).copied()
    }

    /// 后序遍历（子节点先于父节点），显式栈
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, bool)> = self.roots.iter().rev().map(|&r| (r, false)).collect();
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            stack.push((node, true));
            for &child in self.children[node].iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }
}

// ==========================================
// BuiltSchedule - 构建结果
// ==========================================
#[derive(Debug, Clone)]
pub struct BuiltSchedule {
    pub project: Option<ProjectHeader>,
    pub project_start: NaiveDate,
    pub network: ScheduleNetwork,
    pub wbs: WbsForest,
}

// ==========================================
// NetworkBuilder - 网络构建器
// ==========================================
pub struct NetworkBuilder {
    default_day_hours: f64,
}

impl NetworkBuilder {
    pub fn new(default_day_hours: f64) -> Self {
        Self { default_day_hours }
    }

    /// 构建网络并校验无环
    ///
    /// # 参数
    /// - mapped: 映射阶段输出
    /// - today: 项目开始日期的最终回退值
    /// - warnings: 非致命问题（追加）
    ///
    /// # 返回
    /// - Err(EmptySchedule): 无有效作业
    /// - Err(CyclicDependency): 逻辑关系成环
    #[instrument(skip_all, fields(
        activities = mapped.activities.len(),
        relationships = mapped.relationships.len(),
        wbs = mapped.wbs.len()
    ))]
    pub fn build(
        &self,
        mapped: MappedSchedule,
        today: NaiveDate,
        warnings: &mut Vec<ImportWarning>,
    ) -> ImportResult<BuiltSchedule> {
        let MappedSchedule {
            project,
            activities,
            relationships,
            wbs,
            calendars,
        } = mapped;
        let target_project = project.as_ref().map(|p| p.source_project_id.clone());

        // === 日历 ===
        let mut calendar_list: Vec<Calendar> = Vec::new();
        let mut calendar_index: HashMap<String, usize> = HashMap::new();
        for rec in calendars {
            if calendar_index.contains_key(&rec.calendar_id) {
                warnings.push(ImportWarning::new(
                    WarningKind::DuplicateRecord,
                    format!("日历 {} 重复（行 {}），保留首次出现", rec.calendar_id, rec.line_number),
                ));
                continue;
            }
            calendar_index.insert(rec.calendar_id.clone(), calendar_list.len());
            calendar_list.push(Calendar {
                calendar_id: rec.calendar_id,
                name: rec.name,
                hours_per_day: rec.hours_per_day.unwrap_or(self.default_day_hours),
                working_days: rec.working_days,
                holidays: rec.holidays,
                is_default: rec.is_default,
            });
        }
        let flagged_default = calendar_list.iter().position(|c| c.is_default);
        let mut fallback_idx: Option<usize> = None;

        // === 作业（过滤其他项目、去重、解析日历）===
        let mut foreign_tasks = 0usize;
        let mut by_id: BTreeMap<String, (Activity, usize)> = BTreeMap::new();
        for rec in activities {
            if let (Some(target), Some(owner)) = (&target_project, &rec.project_id) {
                if owner != target {
                    foreign_tasks += 1;
                    continue;
                }
            }
            if by_id.contains_key(&rec.task_id) {
                warnings.push(ImportWarning::new(
                    WarningKind::DuplicateRecord,
                    format!("作业 {} 重复（行 {}），保留首次出现", rec.task_id, rec.line_number),
                ));
                continue;
            }

            let cal_idx = match rec.calendar_id.as_deref() {
                Some(id) => match calendar_index.get(id) {
                    Some(&idx) => idx,
                    None => {
                        warnings.push(ImportWarning::new(
                            WarningKind::CalendarResolution,
                            format!("作业 {} 引用的日历 {} 不存在，使用默认五天日历", rec.task_id, id),
                        ));
                        self.fallback_calendar(&mut calendar_list, &mut fallback_idx)
                    }
                },
                None => match flagged_default {
                    Some(idx) => idx,
                    None => self.fallback_calendar(&mut calendar_list, &mut fallback_idx),
                },
            };

            let duration = if rec.is_milestone {
                0
            } else {
                CalendarCore::hours_to_days(rec.duration_hours, calendar_list[cal_idx].hours_per_day)
                    .max(0)
            };

            let activity = Activity {
                activity_id: rec.task_id.clone(),
                code: rec.code,
                wbs_id: rec.wbs_id,
                name: rec.name,
                calendar_id: calendar_list[cal_idx].calendar_id.clone(),
                planned_start: rec.planned_start,
                planned_finish: rec.planned_finish,
                actual_start: rec.actual_start,
                actual_finish: rec.actual_finish,
                duration_working_days: duration,
                percent_complete: rec.percent_complete,
                status: rec.status,
                is_milestone: rec.is_milestone,
                early_start: None,
                early_finish: None,
                late_start: None,
                late_finish: None,
                total_float: None,
                is_critical: false,
            };
            by_id.insert(rec.task_id, (activity, cal_idx));
        }
        if foreign_tasks > 0 {
            warnings.push(ImportWarning::new(
                WarningKind::ForeignProject,
                format!("TASK 表中 {} 行属于其他项目，已跳过", foreign_tasks),
            ));
        }

        if by_id.is_empty() {
            return Err(ImportError::EmptySchedule("文件中没有属于目标项目的作业".to_string()));
        }

        // === WBS 森林 ===
        let forest = Self::build_wbs(wbs, target_project.as_deref(), warnings);

        // === arena ===
        let mut arena = Vec::with_capacity(by_id.len());
        let mut calendar_of = Vec::with_capacity(by_id.len());
        let mut index = HashMap::with_capacity(by_id.len());
        for (id, (mut activity, cal_idx)) in by_id {
            if let Some(wbs_id) = activity.wbs_id.as_deref() {
                if forest.index_of(wbs_id).is_none() {
                    warnings.push(ImportWarning::new(
                        WarningKind::UnresolvedReference,
                        format!("作业 {} 引用的 WBS {} 不存在，挂到根节点", id, wbs_id),
                    ));
                    activity.wbs_id = None;
                }
            }
            index.insert(id, arena.len());
            arena.push(activity);
            calendar_of.push(cal_idx);
        }

        // === 关系 ===
        let mut edges = Vec::new();
        let mut seen: HashSet<(usize, usize, RelationshipType)> = HashSet::new();
        for rel in relationships {
            let pred = index.get(&rel.predecessor_id).copied();
            let succ = index.get(&rel.successor_id).copied();
            let (Some(from), Some(to)) = (pred, succ) else {
                let missing = if pred.is_none() {
                    &rel.predecessor_id
                } else {
                    &rel.successor_id
                };
                warnings.push(ImportWarning::new(
                    WarningKind::UnresolvedReference,
                    format!(
                        "关系 {} → {}（行 {}）引用的作业 {} 不存在，已丢弃",
                        rel.predecessor_id, rel.successor_id, rel.line_number, missing
                    ),
                ));
                continue;
            };
            if !seen.insert((from, to, rel.rel_type)) {
                warnings.push(ImportWarning::new(
                    WarningKind::DuplicateRecord,
                    format!(
                        "关系 {} → {} ({}) 重复（行 {}），已丢弃",
                        rel.predecessor_id, rel.successor_id, rel.rel_type, rel.line_number
                    ),
                ));
                continue;
            }
            // 搭接按后继作业日历换算
            let lag = CalendarCore::hours_to_days(
                rel.lag_hours,
                calendar_list[calendar_of[to]].hours_per_day,
            );
            edges.push(NetworkEdge {
                from,
                to,
                rel_type: rel.rel_type,
                lag,
            });
        }
        edges.sort_by_key(|e| (e.from, e.to, e.rel_type));

        let mut successors = vec![Vec::new(); arena.len()];
        let mut predecessors = vec![Vec::new(); arena.len()];
        for (i, e) in edges.iter().enumerate() {
            successors[e.from].push(i);
            predecessors[e.to].push(i);
        }
        for list in predecessors.iter_mut() {
            list.sort_by_key(|&i| edges[i].from);
        }

        let network = ScheduleNetwork {
            activities: arena,
            calendars: calendar_list,
            calendar_of,
            edges,
            successors,
            predecessors,
            index,
        };

        // === 环检测 ===
        Self::detect_cycle(&network)?;

        let project_start = Self::resolve_project_start(project.as_ref(), &network, today, warnings);

        debug!(
            activities = network.len(),
            edges = network.edges.len(),
            wbs = forest.nodes.len(),
            project_start = %project_start,
            "网络构建完成"
        );

        Ok(BuiltSchedule {
            project,
            project_start,
            network,
            wbs: forest,
        })
    }

    fn fallback_calendar(&self, list: &mut Vec<Calendar>, slot: &mut Option<usize>) -> usize {
        *slot.get_or_insert_with(|| {
            list.push(Calendar::default_five_day(self.default_day_hours));
            list.len() - 1
        })
    }

    // ==========================================
    // WBS 构建：去重、父节点解析、断环
    // ==========================================
    fn build_wbs(
        records: Vec<crate::domain::record::WbsRecord>,
        target_project: Option<&str>,
        warnings: &mut Vec<ImportWarning>,
    ) -> WbsForest {
        let mut foreign = 0usize;
        let mut by_id: BTreeMap<String, WbsNode> = BTreeMap::new();
        for rec in records {
            if let (Some(target), Some(owner)) = (target_project, rec.project_id.as_deref()) {
                if owner != target {
                    foreign += 1;
                    continue;
                }
            }
            if by_id.contains_key(&rec.wbs_id) {
                warnings.push(ImportWarning::new(
                    WarningKind::DuplicateRecord,
                    format!("WBS {} 重复（行 {}），保留首次出现", rec.wbs_id, rec.line_number),
                ));
                continue;
            }
            // 项目节点本身即为根
            let parent_id = if rec.is_project_node { None } else { rec.parent_id };
            by_id.insert(
                rec.wbs_id.clone(),
                WbsNode {
                    wbs_id: rec.wbs_id,
                    parent_id,
                    short_name: rec.short_name,
                    name: rec.name,
                    sequence_number: rec.sequence_number,
                },
            );
        }
        if foreign > 0 {
            warnings.push(ImportWarning::new(
                WarningKind::ForeignProject,
                format!("PROJWBS 表中 {} 行属于其他项目，已跳过", foreign),
            ));
        }

        let mut nodes: Vec<WbsNode> = by_id.into_values().collect();
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.wbs_id.clone(), i))
            .collect();

        // 父节点解析
        let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
        for (i, node) in nodes.iter_mut().enumerate() {
            let Some(pid) = node.parent_id.clone() else { continue };
            match index.get(&pid) {
                Some(&p) if p != i => parent[i] = Some(p),
                Some(_) => {
                    warnings.push(ImportWarning::new(
                        WarningKind::WbsCycle,
                        format!("WBS {} 的父节点指向自身，挂到根节点", node.wbs_id),
                    ));
                    node.parent_id = None;
                }
                None => {
                    warnings.push(ImportWarning::new(
                        WarningKind::UnresolvedReference,
                        format!("WBS {} 的父节点 {} 不存在，挂到根节点", node.wbs_id, pid),
                    ));
                    node.parent_id = None;
                }
            }
        }

        // 断环：沿父链上溯，回到本次路径上的节点即成环
        let mut state = vec![0u8; nodes.len()]; // 0=未访问 1=本次路径 2=已确认
        for start in 0..nodes.len() {
            let mut path = Vec::new();
            let mut cur = Some(start);
            while let Some(i) = cur {
                match state[i] {
                    2 => break,
                    1 => {
                        // i 在当前路径上：在环中 id 最大的节点处断开（确定性）
                        let pos = path.iter().position(|&p| p == i).unwrap_or(0);
                        let cut = path[pos..].iter().copied().max().unwrap_or(i);
                        warnings.push(ImportWarning::new(
                            WarningKind::WbsCycle,
                            format!("WBS {} 的父子关系成环，已挂到根节点", nodes[cut].wbs_id),
                        ));
                        parent[cut] = None;
                        nodes[cut].parent_id = None;
                        break;
                    }
                    _ => {
                        state[i] = 1;
                        path.push(i);
                        cur = parent[i];
                    }
                }
            }
            for i in path {
                state[i] = 2;
            }
        }

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (i, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[*p].push(i),
                None => roots.push(i),
            }
        }
        let order_key = |i: &usize| (nodes[*i].sequence_number, nodes[*i].wbs_id.clone());
        roots.sort_by_key(order_key);
        for list in children.iter_mut() {
            list.sort_by_key(order_key);
        }

        WbsForest {
            nodes,
            children,
            roots,
            index,
        }
    }

    // ==========================================
    // 环检测：三色迭代 DFS（显式栈）
    // ==========================================
    /// 按作业 id 顺序遍历；发现回边时返回环上全部作业
    pub fn detect_cycle(network: &ScheduleNetwork) -> ImportResult<()> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let n = network.len();
        let mut color = vec![WHITE; n];
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..n {
            if color[start] != WHITE {
                continue;
            }
            color[start] = GRAY;
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                let out = &network.successors[node];
                if next < out.len() {
                    top.1 += 1;
                    let target = network.edges[out[next]].to;
                    match color[target] {
                        WHITE => {
                            color[target] = GRAY;
                            stack.push((target, 0));
                        }
                        GRAY => {
                            let pos = stack.iter().position(|(v, _)| *v == target).unwrap_or(0);
                            let activity_ids = stack[pos..]
                                .iter()
                                .map(|(v, _)| network.activities[*v].activity_id.clone())
                                .collect();
                            return Err(ImportError::CyclicDependency { activity_ids });
                        }
                        _ => {}
                    }
                } else {
                    color[node] = BLACK;
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    /// 项目开始日期：PROJECT.plan_start_date → 最早计划开始 → today
    fn resolve_project_start(
        project: Option<&ProjectHeader>,
        network: &ScheduleNetwork,
        today: NaiveDate,
        warnings: &mut Vec<ImportWarning>,
    ) -> NaiveDate {
        if let Some(start) = project.and_then(|p| p.plan_start_date) {
            return start;
        }
        if let Some(earliest) = network
            .activities
            .iter()
            .filter_map(|a| a.actual_start.or(a.planned_start))
            .min()
        {
            warnings.push(ImportWarning::new(
                WarningKind::ProjectDateFallback,
                format!("项目缺少计划开始日期，使用最早作业开始日期 {}", earliest),
            ));
            return earliest;
        }
        warnings.push(ImportWarning::new(
            WarningKind::ProjectDateFallback,
            format!("项目与作业均无开始日期，使用当天 {}", today),
        ));
        today
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{ActivityRecord, CalendarRecord, RelationshipRecord, WbsRecord};
    use crate::domain::schedule::MON_TO_FRI;
    use crate::domain::types::ActivityStatus;
    use std::collections::BTreeSet;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    fn task(id: &str, hours: f64) -> ActivityRecord {
        ActivityRecord {
            task_id: id.to_string(),
            project_id: Some("P1".to_string()),
            wbs_id: None,
            calendar_id: None,
            code: id.to_string(),
            name: format!("Task {}", id),
            status: ActivityStatus::NotStarted,
            planned_start: None,
            planned_finish: None,
            actual_start: None,
            actual_finish: None,
            duration_hours: hours,
            percent_complete: 0.0,
            is_milestone: false,
            line_number: 0,
        }
    }

    fn fs(pred: &str, succ: &str) -> RelationshipRecord {
        RelationshipRecord {
            relationship_id: None,
            predecessor_id: pred.to_string(),
            successor_id: succ.to_string(),
            rel_type: RelationshipType::FinishToStart,
            lag_hours: 0.0,
            line_number: 0,
        }
    }

    fn wbs(id: &str, parent: Option<&str>) -> WbsRecord {
        WbsRecord {
            wbs_id: id.to_string(),
            project_id: Some("P1".to_string()),
            parent_id: parent.map(str::to_string),
            short_name: id.to_string(),
            name: id.to_string(),
            sequence_number: 0,
            is_project_node: false,
            line_number: 0,
        }
    }

    fn project() -> ProjectHeader {
        ProjectHeader {
            source_project_id: "P1".to_string(),
            short_name: "DEMO".to_string(),
            plan_start_date: Some(today()),
            plan_end_date: None,
            scd_end_date: None,
            data_date: None,
        }
    }

    fn build(mapped: MappedSchedule) -> (ImportResult<BuiltSchedule>, Vec<ImportWarning>) {
        let mut warnings = Vec::new();
        let result = NetworkBuilder::new(8.0).build(mapped, today(), &mut warnings);
        (result, warnings)
    }

    #[test]
    fn test_build_resolves_edges_and_converts_hours() {
        let mut mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![task("B", 24.0), task("A", 40.0)],
            relationships: vec![fs("A", "B")],
            ..Default::default()
        };
        mapped.relationships[0].lag_hours = 16.0;

        let (result, warnings) = build(mapped);
        let built = result.unwrap();
        assert!(warnings.is_empty());

        let net = &built.network;
        // arena 按 id 排序
        assert_eq!(net.activities[0].activity_id, "A");
        assert_eq!(net.activities[0].duration_working_days, 5);
        assert_eq!(net.activities[1].duration_working_days, 3);
        assert_eq!(net.edges.len(), 1);
        assert_eq!(net.edges[0].lag, 2);
        assert_eq!(net.calendar(0).calendar_id, DEFAULT_CALENDAR_ID);
        assert_eq!(built.project_start, today());
    }

    #[test]
    fn test_unresolved_relationship_is_dropped_with_warning() {
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![task("A", 8.0)],
            relationships: vec![fs("A", "Z")],
            ..Default::default()
        };
        let (result, warnings) = build(mapped);
        assert!(result.unwrap().network.edges.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnresolvedReference);
        assert!(warnings[0].message.contains('Z'));
    }

    #[test]
    fn test_cycle_lists_all_members() {
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![task("A", 8.0), task("B", 8.0), task("C", 8.0), task("D", 8.0)],
            relationships: vec![fs("A", "B"), fs("B", "C"), fs("C", "A"), fs("D", "A")],
            ..Default::default()
        };
        let (result, _) = build(mapped);
        match result {
            Err(ImportError::CyclicDependency { activity_ids }) => {
                let mut ids = activity_ids.clone();
                ids.sort();
                assert_eq!(ids, vec!["A", "B", "C"]);
            }
            other => panic!("Expected CyclicDependency, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_self_loop_is_cycle_of_one() {
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![task("A", 8.0)],
            relationships: vec![fs("A", "A")],
            ..Default::default()
        };
        let (result, _) = build(mapped);
        assert!(matches!(
            result,
            Err(ImportError::CyclicDependency { ref activity_ids }) if activity_ids == &vec!["A".to_string()]
        ));
    }

    #[test]
    fn test_empty_schedule_is_fatal() {
        let (result, _) = build(MappedSchedule {
            project: Some(project()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ImportError::EmptySchedule(_))));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let mut second = task("A", 80.0);
        second.name = "Second".to_string();
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![task("A", 8.0), second, task("B", 8.0)],
            relationships: vec![fs("A", "B"), fs("A", "B")],
            ..Default::default()
        };
        let (result, warnings) = build(mapped);
        let built = result.unwrap();
        assert_eq!(built.network.len(), 2);
        assert_eq!(built.network.activities[0].name, "Task A");
        assert_eq!(built.network.edges.len(), 1);
        assert_eq!(
            warnings.iter().filter(|w| w.kind == WarningKind::DuplicateRecord).count(),
            2
        );
    }

    #[test]
    fn test_foreign_project_rows_skipped_once() {
        let mut other1 = task("X", 8.0);
        other1.project_id = Some("P2".to_string());
        let mut other2 = task("Y", 8.0);
        other2.project_id = Some("P2".to_string());
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![task("A", 8.0), other1, other2],
            ..Default::default()
        };
        let (result, warnings) = build(mapped);
        assert_eq!(result.unwrap().network.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::ForeignProject);
    }

    #[test]
    fn test_calendar_fallback_warning() {
        let mut a = task("A", 20.0);
        a.calendar_id = Some("missing".to_string());
        let mut b = task("B", 20.0);
        b.calendar_id = Some("C10".to_string());
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![a, b],
            calendars: vec![CalendarRecord {
                calendar_id: "C10".to_string(),
                name: "Ten hour".to_string(),
                is_default: false,
                hours_per_day: Some(10.0),
                working_days: MON_TO_FRI,
                holidays: BTreeSet::new(),
                line_number: 0,
            }],
            ..Default::default()
        };
        let (result, warnings) = build(mapped);
        let net = result.unwrap().network;
        assert_eq!(net.activities[0].calendar_id, DEFAULT_CALENDAR_ID);
        assert_eq!(net.activities[0].duration_working_days, 3); // 20/8 = 2.5 → 3
        assert_eq!(net.activities[1].calendar_id, "C10");
        assert_eq!(net.activities[1].duration_working_days, 2);
        assert_eq!(warnings[0].kind, WarningKind::CalendarResolution);
    }

    #[test]
    fn test_wbs_orphan_and_cycle_reparented() {
        let mut a = task("A", 8.0);
        a.wbs_id = Some("GHOST".to_string());
        let mapped = MappedSchedule {
            project: Some(project()),
            activities: vec![a],
            wbs: vec![
                wbs("ROOT", None),
                wbs("W1", Some("ROOT")),
                wbs("W2", Some("MISSING")),
                wbs("C1", Some("C2")),
                wbs("C2", Some("C1")),
            ],
            ..Default::default()
        };
        let (result, warnings) = build(mapped);
        let built = result.unwrap();
        let forest = &built.wbs;

        let w2 = forest.index_of("W2").unwrap();
        assert!(forest.roots.contains(&w2));
        assert_eq!(forest.nodes[w2].parent_id, None);

        // C1/C2 成环：在 id 较大的 C2 处断开
        let c2 = forest.index_of("C2").unwrap();
        let c1 = forest.index_of("C1").unwrap();
        assert!(forest.roots.contains(&c2));
        assert_eq!(forest.nodes[c1].parent_id.as_deref(), Some("C2"));

        assert_eq!(built.network.activities[0].wbs_id, None);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::WbsCycle));
        assert_eq!(
            warnings.iter().filter(|w| w.kind == WarningKind::UnresolvedReference).count(),
            2
        );

        // 后序：子节点先于父节点
        let order = forest.post_order();
        let root = forest.index_of("ROOT").unwrap();
        let w1 = forest.index_of("W1").unwrap();
        let pos = |i| order.iter().position(|&x| x == i).unwrap();
        assert!(pos(w1) < pos(root));
        assert_eq!(order.len(), forest.nodes.len());
    }

    #[test]
    fn test_project_start_fallback_to_earliest_planned() {
        let mut a = task("A", 8.0);
        a.planned_start = NaiveDate::from_ymd_opt(2024, 2, 5);
        let mut header = project();
        header.plan_start_date = None;
        let (result, warnings) = build(MappedSchedule {
            project: Some(header),
            activities: vec![a],
            ..Default::default()
        });
        assert_eq!(result.unwrap().project_start, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
        assert_eq!(warnings[0].kind, WarningKind::ProjectDateFallback);
    }
}
