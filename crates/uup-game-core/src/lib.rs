use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};

mod envelope;
mod lenient;
mod reconcile;
mod usage;

pub use envelope::{RawEnvelope, ServerResponse, UNSPECIFIED_FAILURE};
pub use reconcile::{
    apply_unlock_gate, merge_assignment_details, reconcile_student_data, total_points,
    DependentLookup,
};
pub use usage::{
    resolve_unused, resolve_used, PowerupCatalog, HINT_POWERUP, SECOND_CHANCE_POWERUP,
};

/// Progress status string the backend reports for a fully completed assignment.
pub const COMPLETED_STATUS: &str = "Completed";

/// `previousPoints` value meaning no second-chance rollback is active.
pub const NO_PREVIOUS_POINTS: i64 = -1;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum GameError {
    #[error("{0}")]
    Provider(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct AssignmentId(pub i64);

impl<'de> Deserialize<'de> for AssignmentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        lenient::int(deserializer).map(Self)
    }
}

impl Display for AssignmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Assignment {
    pub id: AssignmentId,
    pub name: String,
    pub path: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub active: bool,
    #[serde(default, deserialize_with = "lenient::int")]
    pub points: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub challenge_pts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PowerupType {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCategory {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::float")]
    pub points_percent: f64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub tokens: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub tasks_per_category: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeConfig {
    #[serde(default, deserialize_with = "lenient::int")]
    pub enough_points: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub no_powerups: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub max_points: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub max_points_no_powerups: i64,
    #[serde(deserialize_with = "lenient::count")]
    pub tasks_required: u32,
}

/// One entry of the powerup log. Unused powerups carry no assignment or task.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct PowerupUsage {
    #[serde(deserialize_with = "lenient::int")]
    pub type_id: i64,
    #[serde(deserialize_with = "lenient::flag")]
    pub used: bool,
    #[serde(default)]
    pub assignment_id: Option<AssignmentId>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub task_number: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AssignmentPointsRecord {
    pub assignment_id: AssignmentId,
    #[serde(default, deserialize_with = "lenient::int")]
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ProgressRecord {
    pub assignment_id: AssignmentId,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CurrentTaskRecord {
    pub assignment_id: AssignmentId,
    #[serde(deserialize_with = "lenient::int")]
    pub task_number: i64,
    #[serde(default)]
    pub task_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CompletedTasksRecord {
    pub assignment_id: AssignmentId,
    #[serde(deserialize_with = "lenient::count")]
    pub completed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TurnedInTasksRecord {
    pub assignment_id: AssignmentId,
    #[serde(deserialize_with = "lenient::count")]
    pub turned_in: u32,
}

/// The `data` payload of `getStudentData`: independent record lists joined by assignment id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawStudentData {
    #[serde(default, deserialize_with = "lenient::text")]
    pub student: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub tokens: i64,
    #[serde(default)]
    pub assignment_points: Vec<AssignmentPointsRecord>,
    #[serde(default)]
    pub powerups: Vec<PowerupUsage>,
    #[serde(default)]
    pub assignment_progress: Vec<ProgressRecord>,
    #[serde(default)]
    pub current_tasks: Vec<CurrentTaskRecord>,
    #[serde(default)]
    pub completed_tasks: Vec<CompletedTasksRecord>,
    #[serde(default)]
    pub turned_in_tasks: Vec<TurnedInTasksRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_number: i64,
    pub name: String,
}

impl Task {
    pub const LOADING_NUMBER: i64 = -1;
    pub const LOADING_NAME: &'static str = "Loading";

    #[must_use]
    pub fn loading() -> Self {
        Self { task_number: Self::LOADING_NUMBER, name: Self::LOADING_NAME.to_string() }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.task_number == Self::LOADING_NUMBER
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsedPowerup {
    pub name: String,
    pub task_number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UnusedPowerupTally {
    pub name: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDetails {
    pub id: AssignmentId,
    pub name: String,
    pub path: String,
    pub unlocked: bool,
    pub started: bool,
    pub finished: bool,
    pub tasks_fully_finished: u32,
    pub tasks_turned_in: u32,
    pub previous_points: i64,
    pub points: i64,
    pub current_task: Task,
    pub task_hint: String,
    pub buying_power_up: bool,
    pub powerups_used: Vec<UsedPowerup>,
    pub collapsed: bool,
}

impl AssignmentDetails {
    /// Details for a catalog assignment the student has no progress record for.
    #[must_use]
    pub fn not_started(assignment: &Assignment) -> Self {
        Self {
            id: assignment.id,
            name: assignment.name.clone(),
            path: assignment.path.clone(),
            unlocked: false,
            started: false,
            finished: false,
            tasks_fully_finished: 0,
            tasks_turned_in: 0,
            previous_points: NO_PREVIOUS_POINTS,
            points: 0,
            current_task: Task::loading(),
            task_hint: String::new(),
            buying_power_up: false,
            powerups_used: Vec::new(),
            collapsed: false,
        }
    }

    #[must_use]
    pub fn has_rollback(&self) -> bool {
        self.previous_points != NO_PREVIOUS_POINTS
    }

    #[must_use]
    pub fn has_hint(&self) -> bool {
        !self.task_hint.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentData {
    pub student: String,
    pub tokens: i64,
    pub points: i64,
    pub unused_powerups: Vec<UnusedPowerupTally>,
    pub assignments_data: Vec<AssignmentDetails>,
}
