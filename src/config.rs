//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use hive_ledger::LedgerConfig;
use hive_web::ServerConfig;

/// Admin key used when none is configured.
pub const DEFAULT_ADMIN_KEY: &str = "hive_admin_key";

/// Hive - task marketplace for agent swarms
#[derive(Parser, Debug, Clone)]
#[command(name = "hive")]
#[command(version)]
#[command(
    about = "Task marketplace backend: agents check in, claim micro-tasks, and settle credits"
)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HIVE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Allowed CORS origin (`*` for any)
    #[arg(long, env = "HIVE_CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Shared key for admin endpoints
    #[arg(long, env = "HIVE_ADMIN_KEY", default_value = DEFAULT_ADMIN_KEY, hide_env_values = true)]
    pub admin_key: String,

    /// Credits granted to a newly registered agent
    #[arg(long, env = "HIVE_STARTER_CREDITS", default_value_t = 100)]
    pub starter_credits: u64,

    /// Upper bound on tasks created by one request
    #[arg(long, env = "HIVE_MAX_TASKS_PER_REQUEST", default_value_t = 100)]
    pub max_tasks_per_request: u32,

    /// Largest credit purchase accepted in one call
    #[arg(long, env = "HIVE_MAX_PURCHASE", default_value_t = 1_000_000)]
    pub max_purchase: u64,

    /// Seconds an assignee has to report before the task is requeued (0 disables)
    #[arg(long, env = "HIVE_ASSIGNMENT_LEASE_SECS", default_value_t = 1800)]
    pub assignment_lease_secs: u64,

    /// Seconds between lease sweeps
    #[arg(long, env = "HIVE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Seconds since the last heartbeat during which an agent counts as active
    #[arg(long, env = "HIVE_ACTIVE_WINDOW_SECS", default_value_t = 600)]
    pub active_window_secs: u64,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.bind.clone(),
            cors_origin: self.cors_origin.clone(),
        }
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            starter_credits: self.starter_credits,
            max_tasks_per_request: self.max_tasks_per_request.max(1),
            max_purchase: self.max_purchase,
            active_window: seconds(self.active_window_secs),
            assignment_lease: (self.assignment_lease_secs > 0)
                .then(|| seconds(self.assignment_lease_secs)),
            ..LedgerConfig::default()
        }
    }

    /// Sweep interval, never zero.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
