//! JSON state files under the state directory.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

/// Read a JSON file, returning the default value when it does not exist.
pub async fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Write a value as pretty JSON.
///
/// Writes to a sibling temp file and renames it over the target, so a
/// crash mid-write leaves the previous contents intact.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_default() {
        let temp = TempDir::new().unwrap();
        let value: Vec<String> = read_json_or_default(&temp.path().join("none.json"))
            .await
            .unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/state.json");
        let mut value = BTreeMap::new();
        value.insert("k".to_string(), 3_u32);

        write_json(&path, &value).await.unwrap();
        let read: BTreeMap<String, u32> = read_json_or_default(&path).await.unwrap();

        assert_eq!(read, value);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let result: Result<Vec<String>> = read_json_or_default(&path).await;
        assert!(result.is_err());
    }
}
