//! Multiple-instance patterns.
//!
//! Four variants differing on when the instance count is known and
//! whether completion is synchronized. Every spawn records the parent,
//! instance number and triggering data; completion is idempotent per
//! instance and bumps the parent's completed counter at most once.

use crate::context::{ExecutionContext, ExecutionResult};
use crate::error::{PatternError, PatternResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of one spawned instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Running,
    Completed,
    Terminated,
}

/// The four MI flavours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum MiVariant {
    /// Spawn and proceed immediately, no completion tracking
    WithoutSync { count: u64 },
    /// Count fixed when the workflow was designed
    DesignTime { required: u64 },
    /// Count read from a context variable at spawn time
    RunTimeKnown { count_variable: String },
    /// Unbounded, event-driven spawning with an optional termination
    /// condition evaluated against the context
    Dynamic {
        spawn_condition: String,
        #[serde(default)]
        termination_condition: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstanceRecord {
    instance_id: String,
    parent_id: String,
    instance_number: u64,
    trigger: Value,
    state: InstanceState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParentRecord {
    parent_id: String,
    task_id: String,
    /// None for Dynamic parents
    required_instances: Option<u64>,
    completed_instances: u64,
    spawned_instances: u64,
    synchronized: bool,
    termination_condition: Option<String>,
}

/// Result of one spawn call
#[derive(Debug, Clone, PartialEq)]
pub struct MiSpawn {
    pub parent_id: String,
    pub instance_ids: Vec<String>,
    pub synchronized: bool,
}

/// Tracks every MI parent and instance for one workflow
#[derive(Debug, Default)]
pub struct MiTracker {
    instances: HashMap<String, InstanceRecord>,
    parents: HashMap<String, ParentRecord>,
}

impl MiTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn instances for `task_id` according to the variant
    pub fn spawn(
        &mut self,
        task_id: &str,
        variant: &MiVariant,
        ctx: &ExecutionContext,
    ) -> PatternResult<MiSpawn> {
        match variant {
            MiVariant::WithoutSync { count } => {
                if *count == 0 {
                    return Err(PatternError::InvalidInstanceCount(0));
                }
                self.spawn_batch(task_id, *count, None, false, None, |i| json!(i))
            }
            MiVariant::DesignTime { required } => self.spawn_batch(
                task_id,
                *required,
                Some(*required),
                true,
                None,
                |i| json!(i),
            ),
            MiVariant::RunTimeKnown { count_variable } => {
                let raw = ctx
                    .get_i64(count_variable)
                    .ok_or_else(|| PatternError::MissingVariable(count_variable.clone()))?;
                if raw <= 0 {
                    return Err(PatternError::InvalidInstanceCount(raw));
                }
                let count = raw as u64;
                self.spawn_batch(task_id, count, Some(count), true, None, |i| json!(i))
            }
            MiVariant::Dynamic {
                spawn_condition,
                termination_condition,
            } => {
                let events = ctx
                    .get("events")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let count = events.len() as u64;
                let spawn = self.spawn_batch(
                    task_id,
                    count,
                    None,
                    false,
                    termination_condition.clone(),
                    |i| events.get(i as usize).cloned().unwrap_or(Value::Null),
                )?;
                debug!(
                    task_id,
                    spawned = count,
                    condition = %spawn_condition,
                    "dynamic MI spawn"
                );
                Ok(spawn)
            }
        }
    }

    fn spawn_batch(
        &mut self,
        task_id: &str,
        count: u64,
        required: Option<u64>,
        synchronized: bool,
        termination_condition: Option<String>,
        trigger: impl Fn(u64) -> Value,
    ) -> PatternResult<MiSpawn> {
        if count == 0 && required.is_some() {
            return Err(PatternError::InvalidInstanceCount(0));
        }
        let parent_id = format!("{task_id}#mi-parent-{}", Uuid::new_v4());
        let mut instance_ids = Vec::with_capacity(count as usize);

        for number in 0..count {
            let instance_id = format!("{task_id}#instance-{}", Uuid::new_v4());
            self.instances.insert(
                instance_id.clone(),
                InstanceRecord {
                    instance_id: instance_id.clone(),
                    parent_id: parent_id.clone(),
                    instance_number: number,
                    trigger: trigger(number),
                    state: InstanceState::Running,
                },
            );
            instance_ids.push(instance_id);
        }

        self.parents.insert(
            parent_id.clone(),
            ParentRecord {
                parent_id: parent_id.clone(),
                task_id: task_id.to_string(),
                required_instances: required,
                completed_instances: 0,
                spawned_instances: count,
                synchronized,
                termination_condition,
            },
        );

        Ok(MiSpawn {
            parent_id,
            instance_ids,
            synchronized,
        })
    }

    /// Execute a variant and wrap the outcome
    pub fn execute(
        &mut self,
        task_id: &str,
        variant: &MiVariant,
        ctx: &ExecutionContext,
    ) -> ExecutionResult {
        match self.spawn(task_id, variant, ctx) {
            Ok(spawn) => {
                let mut output = Map::new();
                output.insert("parent_id".to_string(), json!(spawn.parent_id));
                output.insert("instance_ids".to_string(), json!(spawn.instance_ids));
                output.insert("requires_sync".to_string(), json!(spawn.synchronized));
                ExecutionResult::ok(output)
            }
            Err(e) => ExecutionResult::fail(&e.to_string()),
        }
    }

    /// Mark an instance complete. Idempotent: a second call on the same
    /// instance changes nothing and reports false.
    pub fn mark_instance_complete(&mut self, instance_id: &str) -> bool {
        let Some(instance) = self.instances.get_mut(instance_id) else {
            return false;
        };
        if instance.state != InstanceState::Running {
            return false;
        }
        instance.state = InstanceState::Completed;
        let parent_id = instance.parent_id.clone();
        if let Some(parent) = self.parents.get_mut(&parent_id) {
            parent.completed_instances += 1;
        }
        true
    }

    /// Completion check: completed >= required. Dynamic parents only
    /// complete through an explicit termination condition.
    pub fn check_completion(&self, parent_id: &str, ctx: &ExecutionContext) -> bool {
        let Some(parent) = self.parents.get(parent_id) else {
            return false;
        };
        match parent.required_instances {
            Some(required) => parent.completed_instances >= required,
            None => match &parent.termination_condition {
                Some(condition) => ctx.guard_holds(condition),
                None => false,
            },
        }
    }

    pub fn completed_count(&self, parent_id: &str) -> u64 {
        self.parents
            .get(parent_id)
            .map(|p| p.completed_instances)
            .unwrap_or(0)
    }

    pub fn spawned_count(&self, parent_id: &str) -> u64 {
        self.parents
            .get(parent_id)
            .map(|p| p.spawned_instances)
            .unwrap_or(0)
    }

    pub fn instance_state(&self, instance_id: &str) -> Option<InstanceState> {
        self.instances.get(instance_id).map(|i| i.state)
    }

    pub fn instance_trigger(&self, instance_id: &str) -> Option<&Value> {
        self.instances.get(instance_id).map(|i| &i.trigger)
    }

    /// Running instances spawned under tasks in `task_ids`
    pub fn running_instances_of(&self, task_ids: &[String]) -> Vec<String> {
        self.instances
            .values()
            .filter(|i| i.state == InstanceState::Running)
            .filter(|i| {
                self.parents
                    .get(&i.parent_id)
                    .map(|p| task_ids.contains(&p.task_id))
                    .unwrap_or(false)
            })
            .map(|i| i.instance_id.clone())
            .collect()
    }

    /// Terminate an instance (cancellation path). Terminated instances
    /// never count toward completion.
    pub fn terminate_instance(&mut self, instance_id: &str) -> bool {
        match self.instances.get_mut(instance_id) {
            Some(instance) if instance.state == InstanceState::Running => {
                instance.state = InstanceState::Terminated;
                true
            }
            _ => false,
        }
    }
}
