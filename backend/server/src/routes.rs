use std::sync::Arc;

use assign::{
    CandidateScore, Project, ProjectStatus, Role, Task, TaskStatus, User, initials, rank, select,
};
use axum::{Json, extract::State as AxumState, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use rand::random_range;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, hash_password, verify_password},
    database::StoredUser,
    error::AppError,
    state::State,
    utils::{Payload, optional, parse_date, parse_priority, required},
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: User,
    token: String,
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    name: String,
    description: Option<String>,
    deadline: Option<String>,
    priority: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    title: String,
    project_id: String,
    assignee_id: Option<String>,
    priority: Option<String>,
    due_date: Option<String>,
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    title: String,
    priority: Option<String>,
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn register_handler(
    AxumState(state): AxumState<Arc<State>>,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let name = required("name", &payload.name)?;
    let email = required("email", &payload.email)?.to_lowercase();
    if payload.password.is_empty() {
        return Err(AppError::MalformedPayload("password is required".to_string()));
    }

    let role = match optional(payload.role) {
        Some(role) => role.parse::<Role>()?,
        None => Role::Member,
    };

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::EmailTaken);
    }

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        avatar: initials(&name),
        skills: role.default_skills(),
        name,
        email,
        role,
        created_at: Utc::now(),
    };

    state
        .store
        .insert_user(StoredUser {
            user: user.clone(),
            password_hash,
        })
        .await?;

    let token = state.keys.issue(&user)?;
    info!(user_id = %user.id, role = %user.role, "Registered user");

    state.notifier.welcome(&user);

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login_handler(
    AxumState(state): AxumState<Arc<State>>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let stored = state
        .store
        .find_user_by_email(payload.email.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(payload.password, stored.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.keys.issue(&stored.user)?;

    Ok(Json(AuthResponse {
        user: stored.user,
        token,
    }))
}

pub async fn create_project_handler(
    AxumState(state): AxumState<Arc<State>>,
    AuthUser(claims): AuthUser,
    Payload(payload): Payload<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: required("name", &payload.name)?,
        description: optional(payload.description),
        status: ProjectStatus::Active,
        progress: 0,
        deadline: parse_date("deadline", payload.deadline)?,
        priority: parse_priority(payload.priority)?,
        manager_id: claims.sub,
        created_at: Utc::now(),
    };

    state.store.insert_project(&project).await?;
    info!(project_id = %project.id, manager_id = %project.manager_id, "Created project");

    let members = state.store.users_by_role(Role::Member).await?;
    state.notifier.project_created(&project, &members);

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects_handler(
    AxumState(state): AxumState<Arc<State>>,
    _: AuthUser,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.store.all_projects().await?))
}

pub async fn create_task_handler(
    AxumState(state): AxumState<Arc<State>>,
    _: AuthUser,
    Payload(payload): Payload<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let title = required("title", &payload.title)?;
    let priority = parse_priority(payload.priority)?;
    let due_date = parse_date("dueDate", payload.due_date)?;

    let project = state
        .store
        .find_project(&payload.project_id)
        .await?
        .ok_or(AppError::NotFound("project"))?;

    let (assignee, ai_score) = match optional(payload.assignee_id) {
        Some(id) => {
            let assignee = state
                .store
                .find_user(&id)
                .await?
                .ok_or(AppError::NotFound("assignee"))?;

            (assignee, None)
        }
        None => {
            // fresh reads on every request; concurrent requests may see the same workload
            let members = state.store.users_by_role(Role::Member).await?;
            let tasks = state.store.all_tasks().await?;

            let assignment = select(&title, priority, &members, &tasks)?;
            info!(
                user_id = %assignment.user.id,
                score = assignment.score.score,
                "Auto-assigned task"
            );

            (assignment.user.clone(), Some(assignment.score.score))
        }
    };

    let task = Task {
        id: Uuid::new_v4().to_string(),
        title,
        project_id: project.id,
        assignee_id: Some(assignee.id.clone()),
        status: TaskStatus::Pending,
        priority,
        due_date,
        estimated_hours: random_range(5..=24),
        completed_hours: 0,
        ai_score,
        created_at: Utc::now(),
    };

    state.store.insert_task(&task).await?;
    info!(task_id = %task.id, assignee_id = %assignee.id, "Created task");

    state.notifier.task_assigned(&task, &assignee);

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks_handler(
    AxumState(state): AxumState<Arc<State>>,
    _: AuthUser,
) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(state.store.all_tasks().await?))
}

pub async fn suggest_handler(
    AxumState(state): AxumState<Arc<State>>,
    _: AuthUser,
    Payload(payload): Payload<SuggestRequest>,
) -> Result<Json<Vec<CandidateScore>>, AppError> {
    let title = required("title", &payload.title)?;
    let priority = parse_priority(payload.priority)?;

    let members = state.store.users_by_role(Role::Member).await?;
    if members.is_empty() {
        return Err(AppError::NoEligibleCandidates);
    }

    let tasks = state.store.all_tasks().await?;

    Ok(Json(rank(&title, priority, &members, &tasks)))
}

pub async fn list_users_handler(
    AxumState(state): AxumState<Arc<State>>,
    _: AuthUser,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.store.all_users().await?))
}
