pub mod reconciliation;

pub use reconciliation::{
    spawn_scheduler, ReconciliationJob, ReconciliationReport, RetentionPolicy,
};
