use std::collections::HashMap;
use std::future::Future;

use futures::future::try_join_all;
use serde_json::Value;

use crate::usage::{used_at, used_powerups};
use crate::{
    lenient, resolve_unused, Assignment, AssignmentDetails, AssignmentId, AssignmentPointsRecord,
    CompletedTasksRecord, CurrentTaskRecord, GameError, PowerupCatalog, PowerupType,
    PowerupUsage, ProgressRecord, RawStudentData, ServerResponse, StudentData, Task,
    TurnedInTasksRecord, COMPLETED_STATUS, HINT_POWERUP, NO_PREVIOUS_POINTS,
    SECOND_CHANCE_POWERUP,
};

/// The two provider lookups the merger depends on when a powerup was consumed on an
/// assignment's current task.
pub trait DependentLookup {
    /// `getUsedHint`: the hint text revealed for a task.
    fn used_hint(
        &self,
        assignment_id: AssignmentId,
        task_number: i64,
    ) -> impl Future<Output = Result<ServerResponse, GameError>> + Send;

    /// `getTaskPreviousPoints`: the points held before a second-chance retry.
    fn previous_points(
        &self,
        assignment_id: AssignmentId,
        task_number: i64,
    ) -> impl Future<Output = Result<ServerResponse, GameError>> + Send;
}

fn first_by_assignment<T>(
    records: &[T],
    key: impl Fn(&T) -> AssignmentId,
) -> HashMap<AssignmentId, &T> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        index.entry(key(record)).or_insert(record);
    }
    index
}

/// Record lists keyed by assignment id, built once per reconciliation.
struct RecordIndex<'a> {
    progress: HashMap<AssignmentId, &'a ProgressRecord>,
    current_tasks: HashMap<AssignmentId, &'a CurrentTaskRecord>,
    points: HashMap<AssignmentId, &'a AssignmentPointsRecord>,
    completed: HashMap<AssignmentId, &'a CompletedTasksRecord>,
    turned_in: HashMap<AssignmentId, &'a TurnedInTasksRecord>,
    powerups: HashMap<AssignmentId, Vec<&'a PowerupUsage>>,
}

impl<'a> RecordIndex<'a> {
    fn build(raw: &'a RawStudentData) -> Self {
        let mut powerups: HashMap<AssignmentId, Vec<&'a PowerupUsage>> = HashMap::new();
        for record in &raw.powerups {
            if let Some(assignment_id) = record.assignment_id {
                powerups.entry(assignment_id).or_default().push(record);
            }
        }

        Self {
            progress: first_by_assignment(&raw.assignment_progress, |record| record.assignment_id),
            current_tasks: first_by_assignment(&raw.current_tasks, |record| record.assignment_id),
            points: first_by_assignment(&raw.assignment_points, |record| record.assignment_id),
            completed: first_by_assignment(&raw.completed_tasks, |record| record.assignment_id),
            turned_in: first_by_assignment(&raw.turned_in_tasks, |record| record.assignment_id),
            powerups,
        }
    }

    fn powerups_for(&self, assignment_id: AssignmentId) -> impl Iterator<Item = &'a PowerupUsage> + '_ {
        self.powerups.get(&assignment_id).into_iter().flatten().copied()
    }
}

fn hint_from(data: &Value) -> Result<String, GameError> {
    data.get("hint")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GameError::Malformed("used hint response has no `hint` text".to_string()))
}

fn points_from(data: &Value) -> Result<i64, GameError> {
    data.get("points").and_then(lenient::int_from_value).ok_or_else(|| {
        GameError::Malformed("previous points response has no numeric `points`".to_string())
    })
}

fn provider_failure(
    assignment_id: AssignmentId,
    task_number: i64,
    lookup: &str,
) -> impl FnOnce(GameError) -> GameError + '_ {
    move |err| {
        tracing::warn!(%assignment_id, task_number, lookup, error = %err, "dependent lookup failed");
        err
    }
}

async fn merge_assignment<P>(
    assignment: &Assignment,
    index: &RecordIndex<'_>,
    catalog: &PowerupCatalog<'_>,
    provider: &P,
) -> Result<AssignmentDetails, GameError>
where
    P: DependentLookup,
{
    let Some(progress) = index.progress.get(&assignment.id) else {
        return Ok(AssignmentDetails::not_started(assignment));
    };

    let powerups_used = used_powerups(index.powerups_for(assignment.id), catalog);
    let current = index.current_tasks.get(&assignment.id).copied();
    let mut task_hint = String::new();
    let mut previous_points = NO_PREVIOUS_POINTS;

    if let Some(current) = current {
        let task_number = current.task_number;

        if used_at(&powerups_used, HINT_POWERUP, task_number) {
            tracing::debug!(assignment_id = %assignment.id, task_number, "fetching used hint");
            let data = provider
                .used_hint(assignment.id, task_number)
                .await
                .and_then(ServerResponse::into_data)
                .map_err(provider_failure(assignment.id, task_number, "used_hint"))?;
            task_hint = hint_from(&data)?;
        }

        if used_at(&powerups_used, SECOND_CHANCE_POWERUP, task_number) {
            tracing::debug!(assignment_id = %assignment.id, task_number, "fetching previous points");
            let data = provider
                .previous_points(assignment.id, task_number)
                .await
                .and_then(ServerResponse::into_data)
                .map_err(provider_failure(assignment.id, task_number, "previous_points"))?;
            previous_points = points_from(&data)?;
        }
    }

    Ok(AssignmentDetails {
        id: assignment.id,
        name: assignment.name.clone(),
        path: assignment.path.clone(),
        unlocked: true,
        started: true,
        finished: progress.status == COMPLETED_STATUS,
        tasks_fully_finished: index.completed.get(&assignment.id).map_or(0, |record| record.completed),
        tasks_turned_in: index.turned_in.get(&assignment.id).map_or(0, |record| record.turned_in),
        previous_points,
        points: index.points.get(&assignment.id).map_or(0, |record| record.points),
        current_task: current.map_or_else(Task::loading, |record| Task {
            task_number: record.task_number,
            name: record.task_name.clone(),
        }),
        task_hint,
        buying_power_up: false,
        powerups_used,
        collapsed: false,
    })
}

/// Join the raw record lists onto every active catalog assignment.
///
/// Dependent lookups of different assignments run concurrently. The result is in catalog
/// order with provisional `unlocked` flags; pass it through [`apply_unlock_gate`].
///
/// # Errors
/// Returns the first [`GameError`] raised by a dependent lookup; no partial list is returned.
pub async fn merge_assignment_details<P>(
    assignments: &[Assignment],
    raw: &RawStudentData,
    powerup_types: &[PowerupType],
    provider: &P,
) -> Result<Vec<AssignmentDetails>, GameError>
where
    P: DependentLookup,
{
    let index = RecordIndex::build(raw);
    let catalog = PowerupCatalog::new(powerup_types);
    let merges = assignments
        .iter()
        .filter(|assignment| assignment.active)
        .map(|assignment| merge_assignment(assignment, &index, &catalog, provider));
    try_join_all(merges).await
}

/// Sort by assignment id and unlock each assignment whose predecessor has at least
/// `task_requirement` fully finished tasks. The first assignment is always unlocked.
#[must_use]
pub fn apply_unlock_gate(
    mut details: Vec<AssignmentDetails>,
    task_requirement: u32,
) -> Vec<AssignmentDetails> {
    details.sort_by_key(|entry| entry.id);
    let mut previous_finished: Option<u32> = None;
    for entry in &mut details {
        entry.unlocked =
            !matches!(previous_finished, Some(finished) if finished < task_requirement);
        previous_finished = Some(entry.tasks_fully_finished);
    }
    details
}

/// Sum of every raw points record, inactive assignments included. Saturates at the `i64` bounds.
#[must_use]
pub fn total_points(raw: &RawStudentData) -> i64 {
    raw.assignment_points.iter().map(|record| record.points).fold(0, i64::saturating_add)
}

/// Build the full student view from one `getStudentData` payload.
///
/// # Errors
/// Returns a [`GameError`] when any dependent hint or previous-points lookup fails.
pub async fn reconcile_student_data<P>(
    raw: &RawStudentData,
    assignments: &[Assignment],
    powerup_types: &[PowerupType],
    task_requirement: u32,
    provider: &P,
) -> Result<StudentData, GameError>
where
    P: DependentLookup,
{
    let merged = merge_assignment_details(assignments, raw, powerup_types, provider).await?;
    let catalog = PowerupCatalog::new(powerup_types);

    Ok(StudentData {
        student: raw.student.clone(),
        tokens: raw.tokens,
        points: total_points(raw),
        unused_powerups: resolve_unused(&raw.powerups, &catalog),
        assignments_data: apply_unlock_gate(merged, task_requirement),
    })
}
