use crate::workflows::estimate::RenderedForm;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Persisted item: the rendered form plus when it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredForm {
    #[serde(flatten)]
    pub form: RenderedForm,
    pub processed_at: DateTime<Utc>,
}

impl StoredForm {
    pub fn job_id(&self) -> &str {
        &self.form.job_id
    }
}

/// Source of raw inference outputs.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
}

/// Resolves the financial-assistance number registered for an inference job.
pub trait JobDirectory: Send + Sync {
    fn fa_number(&self, job_id: &str) -> Result<Option<String>, DirectoryError>;
}

/// Form storage keyed by job id; `insert_new` writes at most once per job.
pub trait FormRepository: Send + Sync {
    fn insert_new(&self, form: StoredForm) -> Result<(), RepositoryError>;
    fn fetch(&self, job_id: &str) -> Result<Option<StoredForm>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("object key '{0}' escapes the store root")]
    InvalidKey(String),
    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("job directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Reads `<root>/<bucket>/<key>` from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if escapes {
            return Err(ObjectStoreError::InvalidKey(format!("{bucket}/{key}")));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.resolve(bucket, key)?;
        std::fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => ObjectStoreError::Io(err),
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl InMemoryObjectStore {
    pub fn put(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Result<(), ObjectStoreError> {
        let mut guard = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Unavailable("object mutex poisoned".to_string()))?;
        guard.insert((bucket.into(), key.into()), body.into());
        Ok(())
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let guard = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Unavailable("object mutex poisoned".to_string()))?;
        guard
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryJobDirectory {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryJobDirectory {
    pub fn register(
        &self,
        job_id: impl Into<String>,
        fa_number: impl Into<String>,
    ) -> Result<(), DirectoryError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory mutex poisoned".to_string()))?;
        guard.insert(job_id.into(), fa_number.into());
        Ok(())
    }
}

impl JobDirectory for InMemoryJobDirectory {
    fn fa_number(&self, job_id: &str) -> Result<Option<String>, DirectoryError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory mutex poisoned".to_string()))?;
        Ok(guard.get(job_id).cloned())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryFormRepository {
    records: Arc<Mutex<HashMap<String, StoredForm>>>,
}

impl InMemoryFormRepository {
    pub fn stored_count(&self) -> Result<usize, RepositoryError> {
        self.records
            .lock()
            .map(|guard| guard.len())
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl FormRepository for InMemoryFormRepository {
    fn insert_new(&self, form: StoredForm) -> Result<(), RepositoryError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))?;
        if guard.contains_key(form.job_id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(form.job_id().to_string(), form);
        Ok(())
    }

    fn fetch(&self, job_id: &str) -> Result<Option<StoredForm>, RepositoryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))?;
        Ok(guard.get(job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::estimate::{render, EstimateFormBuilder, FormContext};
    use serde_json::json;

    fn stored(job_id: &str) -> StoredForm {
        let record = EstimateFormBuilder::from_value(json!({}), &FormContext::new(job_id, ""))
            .expect("empty object builds");
        StoredForm {
            form: render(&record),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn repository_rejects_second_insert_for_a_job() {
        let repository = InMemoryFormRepository::default();
        repository.insert_new(stored("job-1")).expect("first insert");
        match repository.insert_new(stored("job-1")) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(repository.stored_count().expect("count"), 1);
        assert!(repository.fetch("job-1").expect("fetch").is_some());
        assert!(repository.fetch("job-2").expect("fetch").is_none());
    }

    #[test]
    fn poisoned_repository_reports_unavailable() {
        let repository = InMemoryFormRepository::default();
        let records = Arc::clone(&repository.records);
        let poisoner = std::thread::spawn(move || {
            let _guard = records.lock().expect("lock");
            panic!("writer died holding the lock");
        });
        assert!(poisoner.join().is_err());

        assert!(matches!(
            repository.stored_count(),
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(matches!(
            repository.insert_new(stored("job-1")),
            Err(RepositoryError::Unavailable(_))
        ));
    }

    #[test]
    fn local_store_reads_bucket_relative_paths() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("inference").join("output");
        std::fs::create_dir_all(&dir).expect("create dirs");
        std::fs::write(dir.join("job.out"), b"{}").expect("write object");

        let store = LocalObjectStore::new(root.path());
        let body = store.get("inference", "output/job.out").expect("object read");
        assert_eq!(body, b"{}");

        match store.get("inference", "output/missing.out") {
            Err(ObjectStoreError::NotFound { key, .. }) => assert_eq!(key, "output/missing.out"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn local_store_rejects_traversal() {
        let root = tempfile::tempdir().expect("tempdir");
        let store = LocalObjectStore::new(root.path());
        assert!(matches!(
            store.get("inference", "../../etc/passwd"),
            Err(ObjectStoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("inference", "/etc/passwd"),
            Err(ObjectStoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn directory_returns_registered_numbers() {
        let directory = InMemoryJobDirectory::default();
        directory.register("job-1", "FA-12345").expect("register");
        assert_eq!(
            directory.fa_number("job-1").expect("lookup"),
            Some("FA-12345".to_string())
        );
        assert_eq!(directory.fa_number("job-2").expect("lookup"), None);
    }
}
