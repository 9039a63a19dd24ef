use fc_forms::workflows::dispatch::{
    FormDispatcher, InMemoryFormRepository, InMemoryJobDirectory, LocalObjectStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Dispatcher reading objects from disk and keeping forms in memory.
pub(crate) type LocalDispatcher =
    FormDispatcher<LocalObjectStore, InMemoryJobDirectory, InMemoryFormRepository>;

/// Parses `JOB_ID=FA_NUMBER`.
pub(crate) fn parse_fa_assignment(raw: &str) -> Result<(String, String), String> {
    let (job_id, fa_number) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected JOB_ID=FA_NUMBER, got '{raw}'"))?;
    let job_id = job_id.trim();
    let fa_number = fa_number.trim();
    if job_id.is_empty() || fa_number.is_empty() {
        return Err(format!("expected JOB_ID=FA_NUMBER, got '{raw}'"));
    }
    Ok((job_id.to_string(), fa_number.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fa_assignments_need_both_halves() {
        assert_eq!(
            parse_fa_assignment("job-1 = FA-001"),
            Ok(("job-1".to_string(), "FA-001".to_string()))
        );
        assert!(parse_fa_assignment("job-1").is_err());
        assert!(parse_fa_assignment("=FA-001").is_err());
        assert!(parse_fa_assignment("job-1=").is_err());
    }
}
