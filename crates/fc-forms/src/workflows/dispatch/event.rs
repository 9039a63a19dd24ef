use serde::Deserialize;

/// Object-storage notification announcing newly written inference outputs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

impl ObjectCreatedEvent {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn single(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            records: vec![EventRecord {
                s3: StorageEntity {
                    bucket: BucketRef { name: bucket.into() },
                    object: ObjectRef { key: key.into() },
                },
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    pub s3: StorageEntity,
}

impl EventRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    pub fn key(&self) -> &str {
        &self.s3.object.key
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectRef {
    pub key: String,
}

/// `output/abc-123.out` becomes `abc-123`.
pub fn job_id_from_key(key: &str, suffix: &str) -> String {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    file_name
        .strip_suffix(suffix)
        .unwrap_or(file_name)
        .to_string()
}
