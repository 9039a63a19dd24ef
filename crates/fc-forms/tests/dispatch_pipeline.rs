use chrono::Utc;
use fc_forms::config::DispatchConfig;
use fc_forms::workflows::dispatch::{
    DispatchError, FormDispatcher, FormRepository, InMemoryFormRepository, InMemoryJobDirectory,
    LocalObjectStore, ObjectCreatedEvent, RecordOutcome,
};
use std::path::Path;
use std::sync::Arc;

const BUCKET: &str = "fc-inference";

fn write_object(root: &Path, key: &str, body: &str) {
    let path = root.join(BUCKET).join(key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create object dirs");
    }
    std::fs::write(path, body).expect("write object");
}

fn dispatcher(
    root: &Path,
    directory: InMemoryJobDirectory,
) -> FormDispatcher<LocalObjectStore, InMemoryJobDirectory, InMemoryFormRepository> {
    let config = DispatchConfig {
        object_root: root.to_path_buf(),
        ..DispatchConfig::default()
    };
    FormDispatcher::new(
        Arc::new(LocalObjectStore::new(&config.object_root)),
        Arc::new(directory),
        Arc::new(InMemoryFormRepository::default()),
        &config,
    )
}

fn record(key: &str) -> serde_json::Value {
    serde_json::json!({"s3": {"bucket": {"name": BUCKET}, "object": {"key": key}}})
}

#[test]
fn notification_batch_stores_each_output_once() {
    let root = tempfile::tempdir().expect("tempdir");
    write_object(
        root.path(),
        "output/day-surgery-01.out",
        r#"{"or_type": "Day Surgery Suite", "or_charging_block_hours": 3,
            "or_unit_cost_first_block": 206.43, "or_unit_cost_subq": 68.81,
            "or_quantity_subq_1": 3, "or_charges": 412.86, "dtf": 257.66,
            "procedure_fee": 1800, "estimated_medisave_claimable": 2000}"#,
    );
    write_object(
        root.path(),
        "output/ward-02.out",
        r#"{"ward_breakdown": [{"ward_type": "B1 Ward", "ward_unit_cost_first_block": 250,
                                "ward_charges": 750, "length_of_stay": 3}],
            "dtf": 300}"#,
    );
    write_object(root.path(), "output/manifest.json", "{}");

    let directory = InMemoryJobDirectory::default();
    directory
        .register("day-surgery-01", "FA-2024-0001")
        .expect("register");
    let dispatcher = dispatcher(root.path(), directory);

    let event: ObjectCreatedEvent = serde_json::from_value(serde_json::json!({
        "Records": [
            record("output/day-surgery-01.out"),
            record("output/manifest.json"),
            record("output/ward-02.out"),
        ]
    }))
    .expect("event parses");

    let before = Utc::now();
    let summary = dispatcher.handle(&event).expect("batch succeeds");
    assert_eq!(summary.stored, vec!["day-surgery-01", "ward-02"]);
    assert_eq!(summary.skipped, vec!["output/manifest.json"]);
    assert!(summary.duplicates.is_empty());

    let repository = dispatcher.repository();
    let surgery = repository
        .fetch("day-surgery-01")
        .expect("fetch")
        .expect("stored");
    assert!(surgery.processed_at >= before);
    assert_eq!(surgery.form.template_id, 7);
    assert_eq!(surgery.form.fa_number.as_deref(), Some("FA-2024-0001"));
    assert_eq!(
        surgery.form.hospital_charges.accommodation_rows[0].label,
        "Day Surgery Suite (First 3 Hours)"
    );
    assert_eq!(
        surgery.form.hospital_charges.accommodation_rows[1].description,
        "$ 68.81 x 3 Hour(s)"
    );
    assert_eq!(surgery.form.hospital_charges.total, "670.52");

    let stored = serde_json::to_value(&surgery).expect("stored form serializes");
    assert_eq!(stored["job_id"], "day-surgery-01");
    assert!(stored["processed_at"].is_string());
    assert_eq!(stored["source_reference"], "fc-inference/output/day-surgery-01.out");

    let ward = repository.fetch("ward-02").expect("fetch").expect("stored");
    assert_eq!(ward.form.fa_number, None);
    assert_eq!(ward.form.template_id, 2);

    let replay = dispatcher.handle(&event).expect("replay succeeds");
    assert!(replay.stored.is_empty());
    assert_eq!(replay.duplicates, vec!["day-surgery-01", "ward-02"]);
    let unchanged = repository
        .fetch("day-surgery-01")
        .expect("fetch")
        .expect("stored");
    assert_eq!(unchanged.processed_at, surgery.processed_at);
}

#[test]
fn malformed_outputs_fail_without_blocking_the_batch() {
    let root = tempfile::tempdir().expect("tempdir");
    write_object(root.path(), "output/array.out", "[1, 2, 3]");
    write_object(root.path(), "output/ok.out", r#"{"consultation_fee": 80}"#);

    let dispatcher = dispatcher(root.path(), InMemoryJobDirectory::default());
    let event: ObjectCreatedEvent = serde_json::from_value(serde_json::json!({
        "Records": [record("output/array.out"), record("output/ok.out")]
    }))
    .expect("event parses");

    let err = dispatcher.handle(&event).expect_err("one record fails");
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].key, "output/array.out");
    assert!(matches!(err.failures[0].error, DispatchError::Estimate(_)));
    assert_eq!(err.summary.stored, vec!["ok"]);

    let ok = dispatcher
        .repository()
        .fetch("ok")
        .expect("fetch")
        .expect("stored");
    assert_eq!(ok.form.template_id, 0);
    assert_eq!(ok.form.totals.total_estimated_amount, "80.00");
}

#[test]
fn single_record_processing_reports_outcome() {
    let root = tempfile::tempdir().expect("tempdir");
    write_object(root.path(), "job-5.out", "{}");
    let dispatcher = dispatcher(root.path(), InMemoryJobDirectory::default());

    assert_eq!(
        dispatcher
            .process_record(BUCKET, "job-5.out")
            .expect("processed"),
        RecordOutcome::Stored {
            job_id: "job-5".to_string(),
            template_id: 0
        }
    );
    assert_eq!(
        dispatcher
            .process_record(BUCKET, "job-5.out")
            .expect("processed"),
        RecordOutcome::Duplicate {
            job_id: "job-5".to_string()
        }
    );
    assert_eq!(
        dispatcher
            .process_record(BUCKET, "job-5.txt")
            .expect("processed"),
        RecordOutcome::Skipped {
            key: "job-5.txt".to_string()
        }
    );
}
