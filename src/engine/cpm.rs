// ==========================================
// 进度计划引擎 - 关键路径计算器 (CPM)
// ==========================================
// 输入: 已校验无环的作业网络 + 日历 + 项目开始日期
// 输出: ES/EF/LS/LF、总浮时、关键标记、关键路径
// ==========================================
// 日期约定（见 calendar.rs）:
//   ES/LS 为工作日；EF/LF 内部以结束边界参与计算
//   搭接一律按后继作业的日历换算
// 顺推:
//   FS: ES ≥ snap(shift(EF_p, L))
//   SS: ES ≥ shift(ES_p, L)
//   FF: EF ≥ shift(EF_p, L)
//   SF: EF ≥ shift(ES_p, L)
// 逆推对称，锚定于项目完成日（或目标完成日）
// ==========================================

use crate::domain::schedule::ImportWarning;
use crate::domain::types::{RelationshipType, WarningKind};
use crate::engine::calendar::CalendarCore;
use crate::engine::network::ScheduleNetwork;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, instrument};

// ==========================================
// CpmResult - 计算结果（作业字段已回写网络）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpmResult {
    pub project_start: NaiveDate,
    pub project_finish: NaiveDate,
    /// 有序关键路径（作业 ID）
    pub critical_path: Vec<String>,
    pub critical_count: usize,
    pub negative_float_count: usize,
}

// ==========================================
// CpmCalculator - 关键路径计算器
// ==========================================
pub struct CpmCalculator {
    /// 关键判定阈值（工作日）
    critical_float_threshold: i64,
}

impl CpmCalculator {
    pub fn new(critical_float_threshold: i64) -> Self {
        Self {
            critical_float_threshold,
        }
    }

    // ==========================================
    // 拓扑排序：Kahn + 最小堆（id 小者优先）
    // ==========================================
    pub fn topological_order(network: &ScheduleNetwork) -> ImportResult<Vec<usize>> {
        let n = network.len();
        let mut in_degree: Vec<usize> = network.predecessors.iter().map(Vec::len).collect();
        // arena 已按 id 排序，下标序即 id 序
        let mut heap: BinaryHeap<Reverse<usize>> =
            (0..n).filter(|&i| in_degree[i] == 0).map(Reverse).collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(v)) = heap.pop() {
            order.push(v);
            for &e in &network.successors[v] {
                let to = network.edges[e].to;
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    heap.push(Reverse(to));
                }
            }
        }

        if order.len() != n {
            return Err(ImportError::InternalError(format!(
                "拓扑排序未覆盖全部作业 ({}/{})，网络未通过环检测",
                order.len(),
                n
            )));
        }
        Ok(order)
    }

    /// 执行顺推 + 逆推，结果回写 network.activities
    ///
    /// # 参数
    /// - project_start: 无前驱作业的最早开始下限
    /// - target_finish: 目标完成日（Some 时逆推锚定于其次日）
    /// - warnings: 负浮时警告（追加）
    #[instrument(skip_all, fields(activities = network.len(), edges = network.edges.len()))]
    pub fn calculate(
        &self,
        network: &mut ScheduleNetwork,
        project_start: NaiveDate,
        target_finish: Option<NaiveDate>,
        warnings: &mut Vec<ImportWarning>,
    ) -> ImportResult<CpmResult> {
        let order = Self::topological_order(network)?;
        let n = network.len();

        // === 顺推 ===
        let mut es = vec![project_start; n];
        let mut ef = vec![project_start; n]; // 结束边界
        for &v in &order {
            let cal = network.calendar(v);
            let dur = network.activities[v].duration_working_days;

            let mut start = CalendarCore::snap_forward(cal, project_start);
            for &e in &network.predecessors[v] {
                let edge = network.edges[e];
                let p = edge.from;
                let candidate = match edge.rel_type {
                    RelationshipType::FinishToStart => CalendarCore::shift(cal, ef[p], edge.lag),
                    RelationshipType::StartToStart => CalendarCore::shift(cal, es[p], edge.lag),
                    RelationshipType::FinishToFinish => {
                        CalendarCore::backward(cal, CalendarCore::shift(cal, ef[p], edge.lag), dur)
                    }
                    RelationshipType::StartToFinish => {
                        CalendarCore::backward(cal, CalendarCore::shift(cal, es[p], edge.lag), dur)
                    }
                };
                start = start.max(candidate);
            }
            es[v] = CalendarCore::snap_forward(cal, start);
            ef[v] = CalendarCore::forward(cal, es[v], dur);
        }

        // === 锚点 ===
        let early_finish_boundary = ef.iter().copied().max().unwrap_or(project_start);
        let anchor = match target_finish.and_then(|d| d.succ_opt()) {
            Some(target) => target,
            None => early_finish_boundary,
        };

        // === 逆推 ===
        let mut ls = vec![anchor; n];
        let mut lf = vec![anchor; n];
        for &v in order.iter().rev() {
            let cal = network.calendar(v);
            let dur = network.activities[v].duration_working_days;

            let mut finish = anchor;
            let mut start_cap: Option<NaiveDate> = None;
            for &e in &network.successors[v] {
                let edge = network.edges[e];
                let s = edge.to;
                let succ_cal = network.calendar(s);
                match edge.rel_type {
                    RelationshipType::FinishToStart => {
                        finish = finish.min(CalendarCore::shift(succ_cal, ls[s], -edge.lag));
                    }
                    RelationshipType::FinishToFinish => {
                        finish = finish.min(CalendarCore::shift(succ_cal, lf[s], -edge.lag));
                    }
                    RelationshipType::StartToStart => {
                        let c = CalendarCore::shift(succ_cal, ls[s], -edge.lag);
                        start_cap = Some(start_cap.map_or(c, |cur| cur.min(c)));
                    }
                    RelationshipType::StartToFinish => {
                        let c = CalendarCore::shift(succ_cal, lf[s], -edge.lag);
                        start_cap = Some(start_cap.map_or(c, |cur| cur.min(c)));
                    }
                }
            }

            let mut start = if dur == 0 {
                CalendarCore::snap_forward(cal, finish)
            } else {
                CalendarCore::backward(cal, finish, dur)
            };
            if let Some(cap) = start_cap {
                let cap = if dur == 0 {
                    CalendarCore::snap_forward(cal, cap)
                } else {
                    CalendarCore::snap_backward(cal, cap)
                };
                start = start.min(cap);
            }
            ls[v] = start;
            lf[v] = CalendarCore::forward(cal, start, dur);
        }

        // === 浮时与关键标记 ===
        let mut critical_count = 0;
        let mut negative: Vec<(i64, usize)> = Vec::new();
        for v in 0..n {
            let cal = network.calendar(v).clone();
            let activity = &mut network.activities[v];
            let dur = activity.duration_working_days;
            let float = CalendarCore::working_days_between(&cal, es[v], ls[v]);

            activity.early_start = Some(es[v]);
            activity.early_finish = Some(CalendarCore::display_finish(&cal, es[v], ef[v], dur));
            activity.late_start = Some(ls[v]);
            activity.late_finish = Some(CalendarCore::display_finish(&cal, ls[v], lf[v], dur));
            activity.total_float = Some(float);
            activity.is_critical = float <= self.critical_float_threshold;

            if activity.is_critical {
                critical_count += 1;
            }
            if float < 0 {
                negative.push((float, v));
            }
        }

        if let Some(&(min_float, worst)) = negative.iter().min() {
            warnings.push(ImportWarning::new(
                WarningKind::NegativeFloat,
                format!(
                    "{} 个作业总浮时为负，最小 {} 个工作日（作业 {}），计划晚于目标完成日",
                    negative.len(),
                    min_float,
                    network.activities[worst].activity_id
                ),
            ));
        }

        let critical_path = Self::critical_path(network, &order);
        let project_finish = network
            .activities
            .iter()
            .filter_map(|a| a.early_finish)
            .max()
            .unwrap_or(project_start);

        debug!(
            project_finish = %project_finish,
            critical = critical_count,
            negative_float = negative.len(),
            path_len = critical_path.len(),
            "CPM 计算完成"
        );

        Ok(CpmResult {
            project_start: es.iter().copied().min().unwrap_or(project_start),
            project_finish,
            critical_path,
            critical_count,
            negative_float_count: negative.len(),
        })
    }

    // ==========================================
    // 关键路径：关键作业间的最长链
    // ==========================================
    /// 以拓扑序做 DP；同长时取 id 较小的前驱/终点
    fn critical_path(network: &ScheduleNetwork, order: &[usize]) -> Vec<String> {
        let n = network.len();
        let mut length = vec![0usize; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];

        for &v in order {
            if !network.activities[v].is_critical {
                continue;
            }
            length[v] = 1;
            for &e in &network.predecessors[v] {
                let p = network.edges[e].from;
                if !network.activities[p].is_critical {
                    continue;
                }
                let better = length[p] + 1 > length[v]
                    || (length[p] + 1 == length[v] && prev[v].map_or(false, |cur| p < cur));
                if better {
                    length[v] = length[p] + 1;
                    prev[v] = Some(p);
                }
            }
        }

        // 终点：链最长者，其次 id 最小
        let Some(end) = (0..n)
            .filter(|&v| length[v] > 0)
            .max_by_key(|&v| (length[v], Reverse(v)))
        else {
            return Vec::new();
        };

        let mut path = vec![end];
        let mut cur = end;
        while let Some(p) = prev[cur] {
            path.push(p);
            cur = p;
        }
        path.reverse();
        path.into_iter()
            .map(|v| network.activities[v].activity_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{ActivityRecord, MappedSchedule, ProjectHeader, RelationshipRecord};
    use crate::domain::types::ActivityStatus;
    use crate::engine::network::NetworkBuilder;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// 2024-01-08 为周一
    fn monday() -> NaiveDate {
        d(2024, 1, 8)
    }

    fn task(id: &str, days: f64) -> ActivityRecord {
        ActivityRecord {
            task_id: id.to_string(),
            project_id: None,
            wbs_id: None,
            calendar_id: None,
            code: id.to_string(),
            name: id.to_string(),
            status: ActivityStatus::NotStarted,
            planned_start: None,
            planned_finish: None,
            actual_start: None,
            actual_finish: None,
            duration_hours: days * 8.0,
            percent_complete: 0.0,
            is_milestone: days == 0.0,
            line_number: 0,
        }
    }

    fn rel(pred: &str, succ: &str, rel_type: RelationshipType, lag_days: f64) -> RelationshipRecord {
        RelationshipRecord {
            relationship_id: None,
            predecessor_id: pred.to_string(),
            successor_id: succ.to_string(),
            rel_type,
            lag_hours: lag_days * 8.0,
            line_number: 0,
        }
    }

    fn network(activities: Vec<ActivityRecord>, relationships: Vec<RelationshipRecord>) -> ScheduleNetwork {
        let mapped = MappedSchedule {
            project: Some(ProjectHeader {
                source_project_id: "P".to_string(),
                short_name: "P".to_string(),
                plan_start_date: Some(monday()),
                plan_end_date: None,
                scd_end_date: None,
                data_date: None,
            }),
            activities,
            relationships,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        NetworkBuilder::new(8.0)
            .build(mapped, monday(), &mut warnings)
            .unwrap()
            .network
    }

    fn run(net: &mut ScheduleNetwork, target: Option<NaiveDate>) -> (CpmResult, Vec<ImportWarning>) {
        let mut warnings = Vec::new();
        let result = CpmCalculator::new(0)
            .calculate(net, monday(), target, &mut warnings)
            .unwrap();
        (result, warnings)
    }

    fn get<'a>(net: &'a ScheduleNetwork, id: &str) -> &'a crate::domain::schedule::Activity {
        &net.activities[net.index_of(id).unwrap()]
    }

    #[test]
    fn test_three_activity_chain_scenario() {
        use RelationshipType::FinishToStart as FS;
        let mut net = network(
            vec![task("A", 5.0), task("B", 3.0), task("C", 4.0)],
            vec![rel("A", "B", FS, 0.0), rel("B", "C", FS, 2.0)],
        );
        let (result, warnings) = run(&mut net, None);
        assert!(warnings.is_empty());

        let a = get(&net, "A");
        assert_eq!(a.early_start, Some(d(2024, 1, 8))); // 周一
        assert_eq!(a.early_finish, Some(d(2024, 1, 12))); // 周五

        let b = get(&net, "B");
        assert_eq!(b.early_start, Some(d(2024, 1, 15))); // 下周一
        assert_eq!(b.early_finish, Some(d(2024, 1, 17))); // 周三

        // 搭接 2 个工作日（周四、周五）后于第三周周一开始
        let c = get(&net, "C");
        assert_eq!(c.early_start, Some(d(2024, 1, 22)));
        assert_eq!(c.early_finish, Some(d(2024, 1, 25)));

        for id in ["A", "B", "C"] {
            let act = get(&net, id);
            assert_eq!(act.total_float, Some(0), "{}", id);
            assert!(act.is_critical);
            assert_eq!(act.late_start, act.early_start);
            assert_eq!(act.late_finish, act.early_finish);
        }
        assert_eq!(result.critical_path, vec!["A", "B", "C"]);
        assert_eq!(result.project_finish, d(2024, 1, 25));
    }

    #[test]
    fn test_parallel_branch_has_float() {
        use RelationshipType::FinishToStart as FS;
        let mut net = network(
            vec![task("A", 5.0), task("B", 10.0), task("C", 2.0), task("D", 1.0)],
            vec![
                rel("A", "B", FS, 0.0),
                rel("A", "C", FS, 0.0),
                rel("B", "D", FS, 0.0),
                rel("C", "D", FS, 0.0),
            ],
        );
        let (result, _) = run(&mut net, None);

        assert_eq!(get(&net, "C").total_float, Some(8));
        assert!(!get(&net, "C").is_critical);
        assert_eq!(result.critical_path, vec!["A", "B", "D"]);
        assert_eq!(result.critical_count, 3);
    }

    #[test]
    fn test_float_identity_holds_for_all() {
        use RelationshipType::*;
        let mut net = network(
            vec![task("A", 4.0), task("B", 6.0), task("C", 3.0), task("D", 0.0), task("E", 2.0)],
            vec![
                rel("A", "B", StartToStart, 2.0),
                rel("A", "C", FinishToFinish, 1.0),
                rel("B", "D", FinishToStart, 0.0),
                rel("C", "E", StartToFinish, 3.0),
                rel("E", "D", FinishToStart, -1.0),
            ],
        );
        run(&mut net, None);

        for act in &net.activities {
            let cal = &net.calendars[0];
            let (es, ls) = (act.early_start.unwrap(), act.late_start.unwrap());
            assert_eq!(
                act.total_float.unwrap(),
                CalendarCore::working_days_between(cal, es, ls),
                "{}",
                act.activity_id
            );
            assert!(act.total_float.unwrap() >= 0);
        }
    }

    #[test]
    fn test_start_to_start_with_lag() {
        let mut net = network(
            vec![task("A", 5.0), task("B", 5.0)],
            vec![rel("A", "B", RelationshipType::StartToStart, 2.0)],
        );
        run(&mut net, None);
        assert_eq!(get(&net, "B").early_start, Some(d(2024, 1, 10)));
        assert_eq!(get(&net, "B").early_finish, Some(d(2024, 1, 16)));
        // A 的开始驱动 B，A 同为关键
        assert_eq!(get(&net, "A").total_float, Some(0));
        assert_eq!(get(&net, "B").total_float, Some(0));
    }

    #[test]
    fn test_finish_to_finish() {
        let mut net = network(
            vec![task("A", 5.0), task("B", 2.0)],
            vec![rel("A", "B", RelationshipType::FinishToFinish, 0.0)],
        );
        run(&mut net, None);
        let b = get(&net, "B");
        assert_eq!(b.early_finish, Some(d(2024, 1, 12)));
        assert_eq!(b.early_start, Some(d(2024, 1, 11)));
    }

    #[test]
    fn test_start_to_finish_with_lag() {
        // A(3d) -SF+5d-> B(2d)：B 的完成不早于 A 开始后第 5 个工作日结束
        let mut net = network(
            vec![task("A", 3.0), task("B", 2.0)],
            vec![rel("A", "B", RelationshipType::StartToFinish, 5.0)],
        );
        let (result, _) = run(&mut net, None);
        let b = get(&net, "B");
        assert_eq!(b.early_start, Some(d(2024, 1, 11)));
        assert_eq!(b.early_finish, Some(d(2024, 1, 12)));
        assert_eq!(b.total_float, Some(0));
        assert_eq!(get(&net, "A").total_float, Some(0));
        assert_eq!(result.project_finish, d(2024, 1, 12));
    }

    #[test]
    fn test_start_to_finish_backward_pass() {
        // 独立的 C(10d) 决定完工，逆推时 SF 滞后约束 A 的最迟开始
        let mut net = network(
            vec![task("A", 3.0), task("B", 2.0), task("C", 10.0)],
            vec![rel("A", "B", RelationshipType::StartToFinish, 5.0)],
        );
        let (result, _) = run(&mut net, None);
        assert_eq!(result.project_finish, d(2024, 1, 19));

        let b = get(&net, "B");
        assert_eq!(b.late_start, Some(d(2024, 1, 18)));
        assert_eq!(b.late_finish, Some(d(2024, 1, 19)));
        assert_eq!(b.total_float, Some(5));

        // 完工锚点允许 A 晚至 1/17 开始，SF+5 收紧为 1/15
        let a = get(&net, "A");
        assert_eq!(a.late_start, Some(d(2024, 1, 15)));
        assert_eq!(a.late_finish, Some(d(2024, 1, 17)));
        assert_eq!(a.total_float, Some(5));
        assert_eq!(result.critical_path, vec!["C"]);
    }

    #[test]
    fn test_negative_lag_overlaps() {
        let mut net = network(
            vec![task("A", 5.0), task("B", 2.0)],
            vec![rel("A", "B", RelationshipType::FinishToStart, -1.0)],
        );
        run(&mut net, None);
        assert_eq!(get(&net, "B").early_start, Some(d(2024, 1, 12)));
    }

    #[test]
    fn test_milestone_finish() {
        let mut net = network(
            vec![task("A", 5.0), task("M", 0.0)],
            vec![rel("A", "M", RelationshipType::FinishToStart, 0.0)],
        );
        let (result, _) = run(&mut net, None);
        let m = get(&net, "M");
        assert_eq!(m.early_start, Some(d(2024, 1, 15)));
        assert_eq!(m.early_finish, m.early_start);
        assert_eq!(m.total_float, Some(0));
        assert_eq!(result.critical_path, vec!["A", "M"]);
    }

    #[test]
    fn test_target_finish_before_early_finish_gives_negative_float() {
        let mut net = network(vec![task("A", 5.0)], vec![]);
        // 目标完成日提前到周三
        let (result, warnings) = run(&mut net, Some(d(2024, 1, 10)));
        assert_eq!(get(&net, "A").total_float, Some(-2));
        assert!(get(&net, "A").is_critical);
        assert_eq!(result.negative_float_count, 1);
        assert_eq!(warnings[0].kind, WarningKind::NegativeFloat);
    }

    #[test]
    fn test_target_finish_later_gives_positive_float() {
        let mut net = network(vec![task("A", 5.0)], vec![]);
        let (result, _) = run(&mut net, Some(d(2024, 1, 19)));
        assert_eq!(get(&net, "A").total_float, Some(5));
        assert!(result.critical_path.is_empty());
    }

    #[test]
    fn test_topological_order_ties_by_id() {
        let net = network(
            vec![task("C", 1.0), task("A", 1.0), task("B", 1.0), task("D", 1.0)],
            vec![rel("C", "D", RelationshipType::FinishToStart, 0.0)],
        );
        let order: Vec<&str> = CpmCalculator::topological_order(&net)
            .unwrap()
            .into_iter()
            .map(|i| net.activities[i].activity_id.as_str())
            .collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_critical_path_tie_prefers_smaller_id() {
        use RelationshipType::FinishToStart as FS;
        let mut net = network(
            vec![task("S", 1.0), task("X", 3.0), task("Y", 3.0), task("E", 1.0)],
            vec![rel("S", "X", FS, 0.0), rel("S", "Y", FS, 0.0), rel("X", "E", FS, 0.0), rel("Y", "E", FS, 0.0)],
        );
        let (result, _) = run(&mut net, None);
        assert_eq!(result.critical_count, 4);
        assert_eq!(result.critical_path, vec!["S", "X", "E"]);
    }
}
