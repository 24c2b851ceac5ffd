//! JSON sidecar describing how a full database file was produced.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::converter::ConversionReport;
use crate::error::Result;

/// Sidecar written next to a converted database.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversionMetadata {
    #[serde(with = "system_time_serde")]
    pub converted_at: Option<SystemTime>,
    pub source: Option<PathBuf>,
    pub key_column: Option<String>,
    pub report: ConversionReport,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl ConversionMetadata {
    /// Metadata for a conversion that just finished.
    pub fn now(source: &Path, key_column: &str, report: ConversionReport) -> Self {
        Self {
            converted_at: Some(SystemTime::now()),
            source: Some(source.to_path_buf()),
            key_column: Some(key_column.to_string()),
            report,
        }
    }

    /// Sidecar path for a database file: `<path>.meta`.
    pub fn path_for(database: &Path) -> PathBuf {
        let mut name = database.as_os_str().to_owned();
        name.push(".meta");
        PathBuf::from(name)
    }

    /// Load metadata from a file.
    ///
    /// Returns default metadata if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save metadata to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
