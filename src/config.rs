//! Service configuration from command-line flags and `NETSWEEP_*` variables.

use crate::manager::{IdCollisionPolicy, ManagerConfig, MAX_ID_DIGITS};
use crate::telemetry::{LogConfig, LogFormat};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "netsweep-server", about = "Network resilience analysis service")]
pub struct ServiceConfig {
    /// HTTP listen address
    #[arg(long, env = "NETSWEEP_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Worker tasks pulling jobs from the queue
    #[arg(long, env = "NETSWEEP_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Per-job execution timeout in seconds
    #[arg(long, env = "NETSWEEP_JOB_TIMEOUT_SECS", default_value_t = 180)]
    pub job_timeout_secs: u64,

    /// Digits in a public job id
    #[arg(
        long,
        env = "NETSWEEP_ID_DIGITS",
        default_value_t = 6,
        value_parser = clap::value_parser!(u32).range(1..=MAX_ID_DIGITS as i64)
    )]
    pub id_digits: u32,

    /// Maximum number of live public id mappings
    #[arg(long, env = "NETSWEEP_ID_CAPACITY", default_value_t = 100_000)]
    pub id_capacity: usize,

    /// Lifetime of a public id mapping in seconds
    #[arg(long, env = "NETSWEEP_ID_TTL_SECS", default_value_t = 86_400)]
    pub id_ttl_secs: u64,

    /// How long the queue keeps finished jobs, in seconds
    #[arg(long, env = "NETSWEEP_RESULT_TTL_SECS", default_value_t = 3_600)]
    pub result_ttl_secs: u64,

    /// Reuse a live public id instead of redrawing on collision
    #[arg(long, env = "NETSWEEP_OVERWRITE_COLLISIONS")]
    pub overwrite_collisions: bool,

    /// Stdout log format
    #[arg(long, env = "NETSWEEP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Directory for rotated log files
    #[arg(long, env = "NETSWEEP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            id_digits: self.id_digits,
            job_timeout: Duration::from_secs(self.job_timeout_secs),
            collision_policy: if self.overwrite_collisions {
                IdCollisionPolicy::Overwrite
            } else {
                IdCollisionPolicy::default()
            },
        }
    }

    pub fn id_ttl(&self) -> Duration {
        Duration::from_secs(self.id_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            directory: self.log_dir.clone(),
            ..LogConfig::default()
        }
    }
}
