//! # Assignment
//!
//! Entities shared by the server and the tester, plus the task assignment heuristic.
//!
//! ## Scoring
//!
//! Every eligible member gets a score for one decision:
//! - **Skills**: +10 for each skill tag contained in the lower-cased task title (substring, not word match)
//! - **Workload**: +`max(0, 5 - open tasks)`, where open means pending or in-progress
//! - **Priority**: +5 to everyone when the task is high priority
//!
//! Highest score wins. Ties go to the earliest candidate in input order.
//!
//! ## Notes
//!
//! The engine works on snapshots handed in by the caller. Two requests racing on the same
//! snapshot can both pick the same idle member, a transient imbalance we accept.

pub mod engine;
pub mod models;

pub use engine::{
    AssignError, Assignment, CandidateScore, rank, score_candidates, select, select_assignee,
};
pub use models::{
    ParseError, Priority, Project, ProjectStatus, Role, Task, TaskStatus, User, UserId, initials,
};
