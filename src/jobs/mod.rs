//! Maintenance pipelines (§4.8): nightly consolidation, weekly decay and
//! compression, monthly re-index. All three are driven by explicit admin
//! endpoints; nothing in this crate schedules them.

pub mod monthly;
pub mod nightly;
pub mod weekly;

pub use monthly::{run_monthly, MonthlyStats};
pub use nightly::{run_nightly, NightlyStats};
pub use weekly::{run_weekly, WeeklyStats};

use chrono::{DateTime, Utc};

/// Common shell every pipeline's stats struct embeds: start/end timestamps.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RunWindow {
    /// When the pipeline began.
    pub started_at: DateTime<Utc>,
    /// When the pipeline completed.
    pub completed_at: DateTime<Utc>,
}

impl RunWindow {
    #[must_use]
    fn open() -> DateTime<Utc> {
        Utc::now()
    }

    #[must_use]
    fn close(started_at: DateTime<Utc>) -> Self {
        Self { started_at, completed_at: Utc::now() }
    }
}
