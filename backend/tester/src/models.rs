use assign::{Role, Task, TaskStatus, User, UserId, initials};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Offline snapshot of a board, enough to replay one assignment decision.
#[derive(Deserialize)]
pub struct Fixture {
    pub title: String,
    pub priority: Option<String>,
    pub members: Vec<FixtureMember>,
    #[serde(default)]
    pub tasks: Vec<FixtureTask>,
}

#[derive(Deserialize)]
pub struct FixtureMember {
    pub id: UserId,
    pub name: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureTask {
    pub assignee_id: Option<UserId>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Fixture {
    pub fn users(&self, at: DateTime<Utc>) -> Vec<User> {
        self.members
            .iter()
            .map(|member| {
                let name = member.name.clone().unwrap_or_else(|| member.id.clone());

                User {
                    id: member.id.clone(),
                    avatar: initials(&name),
                    name,
                    email: String::new(),
                    role: Role::Member,
                    skills: member.skills.clone(),
                    created_at: at,
                }
            })
            .collect()
    }

    pub fn tasks(&self, at: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, task)| Task {
                id: format!("fixture-{i}"),
                title: String::new(),
                project_id: String::new(),
                assignee_id: task.assignee_id.clone(),
                status: task.status,
                priority: None,
                due_date: None,
                estimated_hours: 0,
                completed_hours: 0,
                ai_score: None,
                created_at: at,
            })
            .collect()
    }
}
