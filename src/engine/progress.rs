// ==========================================
// 进度计划引擎 - 进度汇总器
// ==========================================
// 规则:
//   WBS 完成率 = 下属作业完成率按工期（工作日）加权平均
//   总权重为 0 的节点记 0% 并标记 no_activities
//   项目完成率 = 全部作业加权平均（含挂在根上的作业）
//   逾期 = 无实际完成 且 计划完成 < today 且 状态非已完成
// ==========================================

use crate::domain::schedule::{Activity, ProgressSummary, WbsProgress};
use crate::domain::types::ActivityStatus;
use crate::engine::network::WbsForest;
use chrono::NaiveDate;

pub struct ProgressAggregator;

impl ProgressAggregator {
    /// 加权完成率（总权重为 0 返回 0）
    fn weighted_percent(weighted_sum: f64, total_weight: i64) -> f64 {
        if total_weight <= 0 {
            0.0
        } else {
            weighted_sum / total_weight as f64
        }
    }

    fn weight(activity: &Activity) -> i64 {
        activity.duration_working_days.max(0)
    }

    pub fn is_overdue(activity: &Activity, today: NaiveDate) -> bool {
        activity.actual_finish.is_none()
            && activity.status != ActivityStatus::Completed
            && activity.planned_finish.map_or(false, |f| f < today)
    }

    /// 项目级统计
    pub fn summarize(activities: &[Activity], today: NaiveDate) -> ProgressSummary {
        let mut summary = ProgressSummary {
            total: activities.len(),
            ..Default::default()
        };
        let mut weighted = 0.0;
        let mut total_weight = 0;

        for a in activities {
            match a.status {
                ActivityStatus::Completed => summary.completed += 1,
                ActivityStatus::InProgress => summary.in_progress += 1,
                ActivityStatus::NotStarted => summary.not_started += 1,
            }
            if Self::is_overdue(a, today) {
                summary.overdue += 1;
            }
            if a.is_critical {
                summary.critical += 1;
            }
            let w = Self::weight(a);
            weighted += a.percent_complete * w as f64;
            total_weight += w;
        }

        summary.percent_complete = Self::weighted_percent(weighted, total_weight);
        summary
    }

    /// WBS 逐级汇总（子节点先于父节点累加）
    pub fn roll_up(activities: &[Activity], forest: &WbsForest) -> Vec<WbsProgress> {
        let n = forest.nodes.len();
        let mut weight = vec![0i64; n];
        let mut weighted = vec![0.0f64; n];
        let mut count = vec![0usize; n];

        for a in activities {
            let Some(idx) = a.wbs_id.as_deref().and_then(|id| forest.index_of(id)) else {
                continue;
            };
            let w = Self::weight(a);
            weight[idx] += w;
            weighted[idx] += a.percent_complete * w as f64;
            count[idx] += 1;
        }

        for node in forest.post_order() {
            for &child in &forest.children[node] {
                weight[node] += weight[child];
                weighted[node] += weighted[child];
                count[node] += count[child];
            }
        }

        forest
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| WbsProgress {
                wbs_id: node.wbs_id.clone(),
                parent_id: node.parent_id.clone(),
                name: node.name.clone(),
                percent_complete: Self::weighted_percent(weighted[i], weight[i]),
                total_weight: weight[i],
                activity_count: count[i],
                no_activities: weight[i] == 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{ActivityRecord, MappedSchedule, ProjectHeader, WbsRecord};
    use crate::engine::network::NetworkBuilder;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn task(id: &str, wbs: &str, days: f64, pct: f64, status: ActivityStatus) -> ActivityRecord {
        ActivityRecord {
            task_id: id.to_string(),
            project_id: None,
            wbs_id: Some(wbs.to_string()),
            calendar_id: None,
            code: id.to_string(),
            name: id.to_string(),
            status,
            planned_start: None,
            planned_finish: None,
            actual_start: None,
            actual_finish: None,
            duration_hours: days * 8.0,
            percent_complete: pct,
            is_milestone: false,
            line_number: 0,
        }
    }

    fn wbs(id: &str, parent: Option<&str>) -> WbsRecord {
        WbsRecord {
            wbs_id: id.to_string(),
            project_id: None,
            parent_id: parent.map(str::to_string),
            short_name: id.to_string(),
            name: id.to_string(),
            sequence_number: 0,
            is_project_node: false,
            line_number: 0,
        }
    }

    fn build(activities: Vec<ActivityRecord>, nodes: Vec<WbsRecord>) -> (Vec<Activity>, WbsForest) {
        let mapped = MappedSchedule {
            project: Some(ProjectHeader {
                source_project_id: "P".to_string(),
                short_name: "P".to_string(),
                plan_start_date: Some(d(2024, 1, 8)),
                plan_end_date: None,
                scd_end_date: None,
                data_date: None,
            }),
            activities,
            wbs: nodes,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let built = NetworkBuilder::new(8.0)
            .build(mapped, d(2024, 1, 8), &mut warnings)
            .unwrap();
        (built.network.activities, built.wbs)
    }

    fn row<'a>(rows: &'a [WbsProgress], id: &str) -> &'a WbsProgress {
        rows.iter().find(|r| r.wbs_id == id).unwrap()
    }

    #[test]
    fn test_duration_weighted_roll_up() {
        let (acts, forest) = build(
            vec![
                task("A", "W1", 10.0, 100.0, ActivityStatus::Completed),
                task("B", "W1", 20.0, 0.0, ActivityStatus::NotStarted),
            ],
            vec![wbs("W1", None)],
        );
        let rows = ProgressAggregator::roll_up(&acts, &forest);
        let w1 = row(&rows, "W1");
        assert!((w1.percent_complete - 33.333).abs() < 0.01);
        assert_eq!(w1.total_weight, 30);
        assert_eq!(w1.activity_count, 2);
        assert!(!w1.no_activities);
    }

    #[test]
    fn test_empty_leaf_excluded_from_parent() {
        let (acts, forest) = build(
            vec![task("A", "CHILD", 5.0, 40.0, ActivityStatus::InProgress)],
            vec![wbs("ROOT", None), wbs("CHILD", Some("ROOT")), wbs("EMPTY", Some("ROOT"))],
        );
        let rows = ProgressAggregator::roll_up(&acts, &forest);

        let empty = row(&rows, "EMPTY");
        assert_eq!(empty.percent_complete, 0.0);
        assert!(empty.no_activities);

        let root = row(&rows, "ROOT");
        assert!((root.percent_complete - 40.0).abs() < 1e-9);
        assert_eq!(root.activity_count, 1);
    }

    #[test]
    fn test_summary_counts_and_overdue() {
        let today = d(2024, 3, 1);
        let mut late = task("A", "W", 5.0, 50.0, ActivityStatus::InProgress);
        late.planned_finish = Some(d(2024, 2, 1));
        let mut done_late = task("B", "W", 5.0, 100.0, ActivityStatus::Completed);
        done_late.planned_finish = Some(d(2024, 2, 1));
        let mut future = task("C", "W", 10.0, 0.0, ActivityStatus::NotStarted);
        future.planned_finish = Some(d(2024, 4, 1));
        let mut finished_late = task("D", "W", 0.0, 0.0, ActivityStatus::InProgress);
        finished_late.planned_finish = Some(d(2024, 2, 1));
        finished_late.actual_finish = Some(d(2024, 2, 20));

        let (mut acts, _) = build(vec![late, done_late, future, finished_late], vec![wbs("W", None)]);
        acts[0].is_critical = true;

        let summary = ProgressAggregator::summarize(&acts, today);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.not_started, 1);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.critical, 1);
        // (5*50 + 5*100 + 10*0) / 20
        assert!((summary.percent_complete - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_summary_zero_weight() {
        let summary = ProgressAggregator::summarize(&[], d(2024, 1, 1));
        assert_eq!(summary.total, 0);
        assert_eq!(summary.percent_complete, 0.0);
    }
}
