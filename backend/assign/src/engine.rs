use serde::Serialize;
use thiserror::Error;

use crate::models::{Priority, Task, User, UserId};

pub const SKILL_MATCH_POINTS: i64 = 10;
pub const WORKLOAD_CAPACITY: usize = 5;
pub const HIGH_PRIORITY_BONUS: i64 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    #[error("No eligible candidates")]
    NoEligibleCandidates,
}

/// One candidate's score for a single decision, with each term kept separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub user_id: UserId,
    pub score: i64,
    pub skill: i64,
    pub workload: i64,
    pub priority: i64,
    pub open_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub user: &'a User,
    pub score: CandidateScore,
}

fn score_one(
    title: &str,
    priority: Option<Priority>,
    user: &User,
    tasks: &[Task],
) -> CandidateScore {
    // substring containment, so a tag like "ui" also matches "build"
    let matches = user
        .skills
        .iter()
        .filter(|skill| title.contains(skill.to_lowercase().as_str()))
        .count() as i64;
    let skill = matches * SKILL_MATCH_POINTS;

    let open_tasks = tasks
        .iter()
        .filter(|task| {
            task.assignee_id.as_deref() == Some(user.id.as_str()) && task.status.is_open()
        })
        .count();
    let workload = WORKLOAD_CAPACITY.saturating_sub(open_tasks) as i64;

    let priority = match priority {
        Some(Priority::High) => HIGH_PRIORITY_BONUS,
        _ => 0,
    };

    CandidateScore {
        user_id: user.id.clone(),
        score: skill + workload + priority,
        skill,
        workload,
        priority,
        open_tasks,
    }
}

/// Scores every candidate, in input order.
pub fn score_candidates(
    title: &str,
    priority: Option<Priority>,
    candidates: &[User],
    existing_tasks: &[Task],
) -> Vec<CandidateScore> {
    let title = title.to_lowercase();

    candidates
        .iter()
        .map(|user| score_one(&title, priority, user, existing_tasks))
        .collect()
}

/// Scores sorted by descending score. Equal scores keep input order.
pub fn rank(
    title: &str,
    priority: Option<Priority>,
    candidates: &[User],
    existing_tasks: &[Task],
) -> Vec<CandidateScore> {
    let mut scores = score_candidates(title, priority, candidates, existing_tasks);
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    scores
}

/// Picks the highest scoring candidate. The earliest candidate wins a tie.
pub fn select<'a>(
    title: &str,
    priority: Option<Priority>,
    candidates: &'a [User],
    existing_tasks: &[Task],
) -> Result<Assignment<'a>, AssignError> {
    let title = title.to_lowercase();

    candidates
        .iter()
        .map(|user| Assignment {
            user,
            score: score_one(&title, priority, user, existing_tasks),
        })
        .reduce(|best, next| if next.score.score > best.score.score { next } else { best })
        .ok_or(AssignError::NoEligibleCandidates)
}

pub fn select_assignee(
    title: &str,
    priority: Option<Priority>,
    candidates: &[User],
    existing_tasks: &[Task],
) -> Result<UserId, AssignError> {
    select(title, priority, candidates, existing_tasks).map(|assignment| assignment.user.id.clone())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{Role, TaskStatus};

    fn member(id: &str, skills: &[&str]) -> User {
        User {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: format!("{id}@example.com"),
            role: Role::Member,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            avatar: String::new(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
        }
    }

    fn tasks_for(assignee: &str, count: usize, status: TaskStatus) -> Vec<Task> {
        (0..count)
            .map(|i| Task {
                id: format!("{assignee}-{i}"),
                title: "existing".to_string(),
                project_id: "p1".to_string(),
                assignee_id: Some(assignee.to_string()),
                status,
                priority: None,
                due_date: None,
                estimated_hours: 8,
                completed_hours: 0,
                ai_score: None,
                created_at: Utc.with_ymd_and_hms(2026, 10, 2, 0, 0, 0).unwrap(),
            })
            .collect()
    }

    fn scenario_pool() -> (Vec<User>, Vec<Task>) {
        let users = vec![member("u1", &["backend"]), member("u2", &["frontend"])];
        let tasks = tasks_for("u2", 3, TaskStatus::Pending);
        (users, tasks)
    }

    #[test]
    fn test_skill_match_wins() {
        let (users, tasks) = scenario_pool();

        let scores = score_candidates("Fix backend bug", Some(Priority::Low), &users, &tasks);
        assert_eq!(scores[0].score, 15);
        assert_eq!(scores[1].score, 2);

        let picked = select_assignee("Fix backend bug", Some(Priority::Low), &users, &tasks);
        assert_eq!(picked, Ok("u1".to_string()));
    }

    #[test]
    fn test_workload_decides_without_skill_match() {
        let (users, tasks) = scenario_pool();

        let scores = score_candidates("Update UI", Some(Priority::High), &users, &tasks);
        assert_eq!(scores[0].score, 10);
        assert_eq!(scores[1].score, 7);
        assert_eq!(
            select_assignee("Update UI", Some(Priority::High), &users, &tasks),
            Ok("u1".to_string())
        );
    }

    #[test]
    fn test_single_overloaded_candidate_still_selected() {
        let users = vec![member("u1", &[])];
        let tasks = tasks_for("u1", 6, TaskStatus::InProgress);

        let assignment = select("Anything", None, &users, &tasks).unwrap();
        assert_eq!(assignment.user.id, "u1");
        assert_eq!(assignment.score.score, 0);
        assert_eq!(assignment.score.open_tasks, 6);
    }

    #[test]
    fn test_empty_pool() {
        assert_eq!(
            select_assignee("Fix backend bug", Some(Priority::High), &[], &[]),
            Err(AssignError::NoEligibleCandidates)
        );
    }

    #[test]
    fn test_completed_tasks_do_not_count() {
        let users = vec![member("u1", &[])];
        let mut tasks = tasks_for("u1", 4, TaskStatus::Completed);
        tasks.extend(tasks_for("u1", 1, TaskStatus::Pending));

        let scores = score_candidates("Anything", None, &users, &tasks);
        assert_eq!(scores[0].open_tasks, 1);
        assert_eq!(scores[0].workload, 4);
    }

    #[test]
    fn test_unassigned_tasks_count_for_nobody() {
        let users = vec![member("u1", &[])];
        let mut tasks = tasks_for("u1", 2, TaskStatus::Pending);
        tasks[0].assignee_id = None;

        let scores = score_candidates("Anything", None, &users, &tasks);
        assert_eq!(scores[0].open_tasks, 1);
    }

    #[test]
    fn test_skill_match_is_case_insensitive_substring() {
        let users = vec![member("u1", &["API", "end"])];

        let scores = score_candidates("Document the api backend", None, &users, &[]);
        assert_eq!(scores[0].skill, 20);
    }

    #[test]
    fn test_each_matching_skill_adds_ten() {
        let users = vec![member("u1", &["backend"])];
        let before = score_candidates("Fix backend database", None, &users, &[]);

        let users = vec![member("u1", &["backend", "database"])];
        let after = score_candidates("Fix backend database", None, &users, &[]);

        assert_eq!(after[0].score - before[0].score, SKILL_MATCH_POINTS);
    }

    #[test]
    fn test_workload_never_increases_with_more_tasks() {
        let users = vec![member("u1", &[])];
        let mut previous = i64::MAX;

        for open in 0..8 {
            let tasks = tasks_for("u1", open, TaskStatus::Pending);
            let workload = score_candidates("x", None, &users, &tasks)[0].workload;

            assert!(workload <= previous);
            if open < WORKLOAD_CAPACITY {
                assert_eq!(workload, (WORKLOAD_CAPACITY - open) as i64);
            } else {
                assert_eq!(workload, 0);
            }
            previous = workload;
        }
    }

    #[test]
    fn test_high_priority_is_uniform() {
        let (users, tasks) = scenario_pool();

        let low = rank("Fix frontend bug", Some(Priority::Medium), &users, &tasks);
        let high = rank("Fix frontend bug", Some(Priority::High), &users, &tasks);

        let low_order: Vec<_> = low.iter().map(|s| s.user_id.clone()).collect();
        let high_order: Vec<_> = high.iter().map(|s| s.user_id.clone()).collect();
        assert_eq!(low_order, high_order);

        for (l, h) in low.iter().zip(high.iter()) {
            assert_eq!(h.score - l.score, HIGH_PRIORITY_BONUS);
        }
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let users = vec![member("u1", &[]), member("u2", &[]), member("u3", &[])];

        assert_eq!(select_assignee("x", None, &users, &[]), Ok("u1".to_string()));

        let reversed: Vec<User> = users.iter().rev().cloned().collect();
        assert_eq!(select_assignee("x", None, &reversed, &[]), Ok("u3".to_string()));
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let users = vec![
            member("u1", &[]),
            member("u2", &["deploy"]),
            member("u3", &[]),
        ];

        let ranked = rank("Deploy service", None, &users, &[]);
        let order: Vec<_> = ranked.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(order, vec!["u2", "u1", "u3"]);
    }

    #[test]
    fn test_repeated_calls_agree() {
        let (users, tasks) = scenario_pool();

        let first = select_assignee("Refactor frontend", None, &users, &tasks);
        for _ in 0..10 {
            assert_eq!(select_assignee("Refactor frontend", None, &users, &tasks), first);
        }
    }

    #[test]
    fn test_result_comes_from_pool() {
        let users = vec![member("a", &["x"]), member("b", &["y"]), member("c", &[])];
        let titles = ["x marks", "why y", "nothing", ""];

        for title in titles {
            let picked = select_assignee(title, None, &users, &[]).unwrap();
            assert!(users.iter().any(|u| u.id == picked));
        }
    }
}
