//! Key layout of the flat namespace.
//!
//! Records are keyed by an entity prefix plus id; indexes and counters use
//! fixed names.

/// Record prefixes.
pub const AGENT: &str = "agent:";
pub const TASK: &str = "task:";
pub const SWARM_TYPE: &str = "swarm_type:";
pub const OPT_IN: &str = "optin:";
pub const CONFIG: &str = "config:";

/// Set of every known soul id.
pub const AGENT_INDEX: &str = "agents";
/// Set of every task id.
pub const TASK_INDEX: &str = "tasks";
/// Set of task ids currently pending.
pub const PENDING_TASKS: &str = "tasks:pending";
/// Set of task ids currently assigned.
pub const ASSIGNED_TASKS: &str = "tasks:assigned";
/// Set of lease-expired task ids whose replica is not published yet.
pub const REQUEUE_BACKLOG: &str = "tasks:requeue_backlog";
/// Set of every swarm type id.
pub const SWARM_TYPE_INDEX: &str = "swarm_types";

/// Settlement counters.
pub const TASKS_COMPLETED: &str = "stats:tasks_completed";
pub const TASKS_FAILED: &str = "stats:tasks_failed";

/// Singleton record id for the public stats display config.
pub const PUBLIC_STATS_CONFIG: &str = "public_stats";

/// Set of task ids requested by one agent.
#[must_use]
pub fn tasks_requested_by(soul_id: &str) -> String {
    format!("tasks:requested_by:{soul_id}")
}

/// Set of swarm type ids an agent has an opt-in record for.
#[must_use]
pub fn opt_ins_of(soul_id: &str) -> String {
    format!("optins:{soul_id}")
}

/// Record id of an opt-in (used under the [`OPT_IN`] prefix).
#[must_use]
pub fn opt_in_id(soul_id: &str, swarm_type_id: &str) -> String {
    format!("{soul_id}:{swarm_type_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_keys() {
        assert_eq!(tasks_requested_by("a1"), "tasks:requested_by:a1");
        assert_eq!(opt_ins_of("a1"), "optins:a1");
        assert_eq!(opt_in_id("a1", "twitter-views"), "a1:twitter-views");
    }
}
