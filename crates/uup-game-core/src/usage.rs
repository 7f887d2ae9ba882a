use std::collections::HashMap;

use crate::{AssignmentId, PowerupType, PowerupUsage, UnusedPowerupTally, UsedPowerup};

pub const HINT_POWERUP: &str = "Hint";
pub const SECOND_CHANCE_POWERUP: &str = "Second Chance";

/// Powerup type names keyed by type id. The first catalog entry for an id wins.
#[derive(Debug, Clone, Default)]
pub struct PowerupCatalog<'a> {
    names: HashMap<i64, &'a str>,
}

impl<'a> PowerupCatalog<'a> {
    #[must_use]
    pub fn new(powerup_types: &'a [PowerupType]) -> Self {
        let mut names = HashMap::with_capacity(powerup_types.len());
        for powerup_type in powerup_types {
            names.entry(powerup_type.id).or_insert(powerup_type.name.as_str());
        }
        Self { names }
    }

    #[must_use]
    pub fn name_of(&self, type_id: i64) -> Option<&'a str> {
        self.names.get(&type_id).copied()
    }
}

pub(crate) fn used_powerups<'r, I>(records: I, catalog: &PowerupCatalog<'_>) -> Vec<UsedPowerup>
where
    I: IntoIterator<Item = &'r PowerupUsage>,
{
    records
        .into_iter()
        .filter(|record| record.used)
        .filter_map(|record| {
            let Some(name) = catalog.name_of(record.type_id) else {
                tracing::debug!(type_id = record.type_id, "dropping used powerup of unknown type");
                return None;
            };
            let Some(task_number) = record.task_number else {
                tracing::debug!(type_id = record.type_id, "dropping used powerup without a task");
                return None;
            };
            Some(UsedPowerup { name: name.to_string(), task_number })
        })
        .collect()
}

pub(crate) fn used_at(used: &[UsedPowerup], name: &str, task_number: i64) -> bool {
    used.iter().any(|powerup| powerup.name == name && powerup.task_number == task_number)
}

/// Powerups consumed on tasks of one assignment, in log order.
#[must_use]
pub fn resolve_used(
    log: &[PowerupUsage],
    catalog: &PowerupCatalog<'_>,
    assignment_id: AssignmentId,
) -> Vec<UsedPowerup> {
    used_powerups(log.iter().filter(|record| record.assignment_id == Some(assignment_id)), catalog)
}

/// Unused powerups across the whole student, tallied by name in first-seen order.
#[must_use]
pub fn resolve_unused(log: &[PowerupUsage], catalog: &PowerupCatalog<'_>) -> Vec<UnusedPowerupTally> {
    let mut tallies: Vec<UnusedPowerupTally> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for record in log.iter().filter(|record| !record.used) {
        let Some(name) = catalog.name_of(record.type_id) else {
            tracing::debug!(type_id = record.type_id, "dropping unused powerup of unknown type");
            continue;
        };
        if let Some(&position) = positions.get(name) {
            tallies[position].amount += 1;
        } else {
            positions.insert(name, tallies.len());
            tallies.push(UnusedPowerupTally { name: name.to_string(), amount: 1 });
        }
    }

    tallies
}
