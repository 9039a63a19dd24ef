use super::event::{job_id_from_key, ObjectCreatedEvent};
use super::storage::{
    FormRepository, JobDirectory, ObjectStore, ObjectStoreError, RepositoryError, StoredForm,
};
use crate::config::DispatchConfig;
use crate::workflows::estimate::{render, EstimateError, EstimateFormBuilder, FormContext};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug)]
pub struct RecordFailure {
    pub key: String,
    pub error: DispatchError,
}

/// Raised after every record has been attempted when at least one failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to process {} record(s): {}", .failures.len(), failed_keys(.failures))]
pub struct BatchError {
    pub failures: Vec<RecordFailure>,
    pub summary: DispatchSummary,
}

fn failed_keys(failures: &[RecordFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Stored { job_id: String, template_id: u8 },
    Duplicate { job_id: String },
    Skipped { key: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub stored: Vec<String>,
    pub duplicates: Vec<String>,
    pub skipped: Vec<String>,
}

impl DispatchSummary {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Stored { job_id, .. } => self.stored.push(job_id),
            RecordOutcome::Duplicate { job_id } => self.duplicates.push(job_id),
            RecordOutcome::Skipped { key } => self.skipped.push(key),
        }
    }
}

/// Turns object-created notifications into stored forms.
pub struct FormDispatcher<S, D, R>
where
    S: ObjectStore,
    D: JobDirectory,
    R: FormRepository,
{
    objects: Arc<S>,
    directory: Arc<D>,
    repository: Arc<R>,
    output_suffix: String,
}

impl<S, D, R> FormDispatcher<S, D, R>
where
    S: ObjectStore,
    D: JobDirectory,
    R: FormRepository,
{
    pub fn new(objects: Arc<S>, directory: Arc<D>, repository: Arc<R>, config: &DispatchConfig) -> Self {
        Self {
            objects,
            directory,
            repository,
            output_suffix: config.output_suffix.clone(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn output_suffix(&self) -> &str {
        &self.output_suffix
    }

    /// Attempts every record; failures do not stop the remaining records.
    pub fn handle(&self, event: &ObjectCreatedEvent) -> Result<DispatchSummary, BatchError> {
        let mut summary = DispatchSummary::default();
        let mut failures = Vec::new();

        for record in &event.records {
            match self.process_record(record.bucket(), record.key()) {
                Ok(outcome) => summary.record(outcome),
                Err(err) => {
                    error!(bucket = record.bucket(), key = record.key(), error = %err, "record failed");
                    failures.push(RecordFailure {
                        key: record.key().to_string(),
                        error: err,
                    });
                }
            }
        }

        if failures.is_empty() {
            info!(
                stored = summary.stored.len(),
                duplicates = summary.duplicates.len(),
                skipped = summary.skipped.len(),
                "dispatch batch complete"
            );
            Ok(summary)
        } else {
            Err(BatchError { failures, summary })
        }
    }

    pub fn process_record(&self, bucket: &str, key: &str) -> Result<RecordOutcome, DispatchError> {
        if !key.ends_with(&self.output_suffix) {
            debug!(key, suffix = %self.output_suffix, "skipping non-output object");
            return Ok(RecordOutcome::Skipped {
                key: key.to_string(),
            });
        }

        let job_id = job_id_from_key(key, &self.output_suffix);
        info!(%job_id, bucket, key, "processing inference output");

        let body = self.objects.get(bucket, key)?;
        let fa_number = self.lookup_fa_number(&job_id);
        let context = FormContext::new(job_id.clone(), format!("{bucket}/{key}"))
            .with_fa_number(fa_number);
        let record = EstimateFormBuilder::from_slice(&body, &context)?;
        let form = render(&record);
        let template_id = form.template_id;

        let stored = StoredForm {
            form,
            processed_at: Utc::now(),
        };

        match self.repository.insert_new(stored) {
            Ok(()) => {
                info!(%job_id, template_id, "stored form");
                Ok(RecordOutcome::Stored {
                    job_id,
                    template_id,
                })
            }
            Err(RepositoryError::Conflict) => {
                info!(%job_id, "form already stored; leaving existing record");
                Ok(RecordOutcome::Duplicate { job_id })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn lookup_fa_number(&self, job_id: &str) -> Option<String> {
        match self.directory.fa_number(job_id) {
            Ok(Some(number)) => Some(number),
            Ok(None) => {
                warn!(job_id, "no financial assistance number registered for job");
                None
            }
            Err(err) => {
                warn!(job_id, error = %err, "financial assistance lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::dispatch::storage::{
        DirectoryError, InMemoryFormRepository, InMemoryJobDirectory, InMemoryObjectStore,
    };

    struct UnavailableDirectory;

    impl JobDirectory for UnavailableDirectory {
        fn fa_number(&self, _job_id: &str) -> Result<Option<String>, DirectoryError> {
            Err(DirectoryError::Unavailable("table offline".to_string()))
        }
    }

    const WARD_ONLY: &str = r#"{
        "ward_breakdown": [{"ward_type": "Single", "ward_unit_cost_first_block": 500,
                            "ward_charges": 1000, "ward_quantity_unit": "days",
                            "length_of_stay": 2}],
        "dtf": 200, "ancillary_charges_llm": 300
    }"#;

    fn dispatcher<D: JobDirectory>(
        objects: InMemoryObjectStore,
        directory: D,
    ) -> FormDispatcher<InMemoryObjectStore, D, InMemoryFormRepository> {
        FormDispatcher::new(
            Arc::new(objects),
            Arc::new(directory),
            Arc::new(InMemoryFormRepository::default()),
            &DispatchConfig::default(),
        )
    }

    #[test]
    fn stores_form_with_looked_up_fa_number() {
        let objects = InMemoryObjectStore::default();
        objects.put("bucket", "output/job-1.out", WARD_ONLY).expect("put");
        let directory = InMemoryJobDirectory::default();
        directory.register("job-1", "FA-001").expect("register");

        let dispatcher = dispatcher(objects, directory);
        let summary = dispatcher
            .handle(&ObjectCreatedEvent::single("bucket", "output/job-1.out"))
            .expect("batch succeeds");

        assert_eq!(summary.stored, vec!["job-1".to_string()]);
        let stored = dispatcher
            .repository()
            .fetch("job-1")
            .expect("fetch")
            .expect("stored form");
        assert_eq!(stored.form.fa_number.as_deref(), Some("FA-001"));
        assert_eq!(stored.form.template_id, 2);
        assert_eq!(stored.form.source_reference, "bucket/output/job-1.out");
    }

    #[test]
    fn directory_failure_leaves_fa_number_absent() {
        let objects = InMemoryObjectStore::default();
        objects.put("bucket", "job-2.out", WARD_ONLY).expect("put");

        let dispatcher = dispatcher(objects, UnavailableDirectory);
        dispatcher
            .handle(&ObjectCreatedEvent::single("bucket", "job-2.out"))
            .expect("batch succeeds");

        let stored = dispatcher
            .repository()
            .fetch("job-2")
            .expect("fetch")
            .expect("stored form");
        assert_eq!(stored.form.fa_number, None);
    }

    #[test]
    fn replayed_notification_is_a_duplicate() {
        let objects = InMemoryObjectStore::default();
        objects.put("bucket", "job-3.out", WARD_ONLY).expect("put");
        let dispatcher = dispatcher(objects, InMemoryJobDirectory::default());
        let event = ObjectCreatedEvent::single("bucket", "job-3.out");

        let first = dispatcher.handle(&event).expect("first batch");
        let second = dispatcher.handle(&event).expect("second batch");

        assert_eq!(first.stored, vec!["job-3".to_string()]);
        assert!(second.stored.is_empty());
        assert_eq!(second.duplicates, vec!["job-3".to_string()]);
        assert_eq!(dispatcher.repository().stored_count().expect("count"), 1);
    }

    #[test]
    fn oversized_amounts_do_not_abort_the_batch() {
        let objects = InMemoryObjectStore::default();
        objects
            .put(
                "bucket",
                "huge.out",
                r#"{"ancillary_charges_llm": "79228162514264337593543950335",
                    "doctor_prescribed_charges": "79228162514264337593543950335",
                    "or_type": "Major OT", "or_unit_cost_first_block": 10,
                    "or_unit_cost_subq": "79228162514264337593543950335",
                    "or_quantity_subq_1": 2,
                    "ward_breakdown": [{"ward_type": "Single", "ward_charges": 7.9e25,
                                        "ward_unit_cost_first_block": 1e-28}]}"#,
            )
            .expect("put");
        objects.put("bucket", "good.out", WARD_ONLY).expect("put");
        let dispatcher = dispatcher(objects, InMemoryJobDirectory::default());

        let event = ObjectCreatedEvent::from_slice(
            br#"{"Records":[
                {"s3":{"bucket":{"name":"bucket"},"object":{"key":"huge.out"}}},
                {"s3":{"bucket":{"name":"bucket"},"object":{"key":"good.out"}}}
            ]}"#,
        )
        .expect("event parses");

        let summary = dispatcher.handle(&event).expect("batch succeeds");
        assert_eq!(summary.stored, vec!["huge".to_string(), "good".to_string()]);
        let huge = dispatcher
            .repository()
            .fetch("huge")
            .expect("fetch")
            .expect("stored form");
        assert_eq!(huge.form.hospital_charges.ancillary_charges, "0.00");
        assert!(dispatcher.repository().fetch("good").expect("fetch").is_some());
        assert_eq!(dispatcher.repository().stored_count().expect("count"), 2);
    }

    #[test]
    fn failures_are_isolated_and_reported_together() {
        let objects = InMemoryObjectStore::default();
        objects.put("bucket", "good.out", WARD_ONLY).expect("put");
        objects.put("bucket", "broken.out", "not json").expect("put");
        let dispatcher = dispatcher(objects, InMemoryJobDirectory::default());

        let event = ObjectCreatedEvent::from_slice(
            br#"{"Records":[
                {"s3":{"bucket":{"name":"bucket"},"object":{"key":"broken.out"}}},
                {"s3":{"bucket":{"name":"bucket"},"object":{"key":"missing.out"}}},
                {"s3":{"bucket":{"name":"bucket"},"object":{"key":"notes.txt"}}},
                {"s3":{"bucket":{"name":"bucket"},"object":{"key":"good.out"}}}
            ]}"#,
        )
        .expect("event parses");

        let err = dispatcher.handle(&event).expect_err("batch reports failures");
        assert_eq!(
            err.to_string(),
            "failed to process 2 record(s): broken.out, missing.out"
        );
        assert!(matches!(err.failures[0].error, DispatchError::Estimate(_)));
        assert!(matches!(
            err.failures[1].error,
            DispatchError::ObjectStore(ObjectStoreError::NotFound { .. })
        ));
        assert_eq!(err.summary.stored, vec!["good".to_string()]);
        assert_eq!(err.summary.skipped, vec!["notes.txt".to_string()]);
        assert!(dispatcher.repository().fetch("good").expect("fetch").is_some());
    }
}
