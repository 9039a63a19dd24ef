mod event;
mod processor;
mod storage;

pub use event::{job_id_from_key, BucketRef, EventRecord, ObjectCreatedEvent, ObjectRef, StorageEntity};
pub use processor::{
    BatchError, DispatchError, DispatchSummary, FormDispatcher, RecordFailure, RecordOutcome,
};
pub use storage::{
    DirectoryError, FormRepository, InMemoryFormRepository, InMemoryJobDirectory,
    InMemoryObjectStore, JobDirectory, LocalObjectStore, ObjectStore, ObjectStoreError,
    RepositoryError, StoredForm,
};
