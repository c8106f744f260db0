//! Key-value persistence for the register
//!
//! A directory of JSON blobs, one file per key, standing in for browser
//! local storage.
//!
//! Global invariants enforced:
//! - Writes are atomic (temp file + rename)
//! - A missing key reads as an empty collection
//! - Risks are normalized before they are written

use crate::register::{Register, RegisterDocument};
use crate::scoring::ScoringModel;
use crate::taxonomy::Taxonomy;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const RISKS_KEY: &str = "risks";
pub const CONTROLS_KEY: &str = "controls";
pub const ACTION_PLANS_KEY: &str = "actionPlans";
pub const INTERVIEWS_KEY: &str = "interviews";
pub const TAXONOMY_KEY: &str = "config";

/// Directory-backed key-value store
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Store { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Read and decode a blob; `None` when the key is absent
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read store key '{}': {}", key, path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse store key '{}': {}", key, path.display()))?;
        tracing::debug!("read store key '{}'", key);
        Ok(Some(value))
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to serialize store key '{}'", key))?;
        atomic_write(&self.path_for(key), &json)
            .with_context(|| format!("failed to write store key '{}'", key))?;
        tracing::debug!("wrote store key '{}'", key);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    /// Load every key into a register, normalizing its risks
    pub fn load_register(&self, model: ScoringModel) -> Result<Register> {
        let doc = RegisterDocument {
            risks: self.read::<Vec<Value>>(RISKS_KEY)?.unwrap_or_default(),
            controls: self.read::<Vec<Value>>(CONTROLS_KEY)?.unwrap_or_default(),
            action_plans: self.read::<Vec<Value>>(ACTION_PLANS_KEY)?.unwrap_or_default(),
            interviews: self.read::<Vec<Value>>(INTERVIEWS_KEY)?.unwrap_or_default(),
            config: self.read::<Taxonomy>(TAXONOMY_KEY)?,
        };
        Ok(Register::from_document(doc, model))
    }

    /// Persist every collection of a register, unreadable entries included
    pub fn save_register(&self, register: &Register) -> Result<()> {
        let doc = register.to_document()?;
        self.write(RISKS_KEY, &doc.risks)?;
        self.write(CONTROLS_KEY, &doc.controls)?;
        self.write(ACTION_PLANS_KEY, &doc.action_plans)?;
        self.write(INTERVIEWS_KEY, &doc.interviews)?;
        self.write(TAXONOMY_KEY, &register.taxonomy)?;
        if !register.unreadable.is_empty() {
            tracing::warn!(
                "wrote back {} unreadable record(s) unchanged",
                register.unreadable.len()
            );
        }
        Ok(())
    }
}

/// Temp sibling of a blob: `risks.json` -> `.risks.json.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "blob".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Replace `path` with `contents` in one step (temp sibling + rename)
///
/// Readers see either the old blob or the new one, never a partial write.
/// A failed write leaves the old blob in place and removes the temp file.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    use std::fs;
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create store directory {}", parent.display()))?;
    }

    let temp_path = temp_path_for(path);
    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("failed to stage {}", temp_path.display()));
    }

    fs::rename(&temp_path, path).with_context(|| {
        format!("failed to move {} over {}", temp_path.display(), path.display())
    })?;
    tracing::trace!("replaced {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interview, Risk, RiskId};
    use std::fs;

    #[test]
    fn test_missing_keys_load_empty_register() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path());
        let reg = store.load_register(ScoringModel::default()).unwrap();
        assert!(reg.risks().is_empty());
        assert_eq!(reg.taxonomy, Taxonomy::default());
    }

    #[test]
    fn test_load_normalizes_raw_blobs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("risks.json"),
            r#"[{"id": 3, "probBrut": "2", "impactBrut": 4, "mitigationEffectiveness": "?"}]"#,
        )
        .unwrap();
        let reg = Store::open(dir.path())
            .load_register(ScoringModel::default())
            .unwrap();
        let risk = reg.risk(&RiskId::Int(3)).unwrap();
        assert_eq!(risk.mitigation_effectiveness.as_deref(), Some("insuffisant"));
        assert_eq!(risk.impact_net, Some(3));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("nested"));
        let mut reg = Register::new(Taxonomy::default(), ScoringModel::default());
        reg.add_risk(Risk::new(0, 2.0, 3.0));
        reg.add_risk(Risk::new(0, 4.0, 4.0));
        store.save_register(&reg).unwrap();

        assert!(store.contains(RISKS_KEY));
        assert!(!temp_path_for(&store.path_for(RISKS_KEY)).exists());

        let loaded = store.load_register(ScoringModel::default()).unwrap();
        assert_eq!(loaded.risks(), reg.risks());
    }

    #[test]
    fn test_malformed_blob_is_an_error_with_context() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("controls.json"), "[{").unwrap();
        let err = Store::open(dir.path())
            .load_register(ScoringModel::default())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("controls"));
    }

    #[test]
    fn test_malformed_ids_survive_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("risks.json"),
            r#"[
                {"id": 1, "probBrut": 1, "impactBrut": 2},
                {"id": -4, "probBrut": 2, "impactBrut": 2},
                {"id": null, "probBrut": 3, "impactBrut": 3},
                {"id": 2.0, "probBrut": 4, "impactBrut": 1},
                "illisible"
            ]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("actionPlans.json"),
            r#"[{"title": "Sans id", "risks": [-4, 1.5]}]"#,
        )
        .unwrap();

        let store = Store::open(dir.path());
        let reg = store.load_register(ScoringModel::default()).unwrap();
        store.save_register(&reg).unwrap();

        let risks: Vec<Value> = store.read(RISKS_KEY).unwrap().unwrap();
        assert_eq!(risks.len(), 5);
        assert_eq!(risks[4], Value::String("illisible".to_string()));

        let plans: Vec<Value> = store.read(ACTION_PLANS_KEY).unwrap().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0]["id"], serde_json::json!(1));
        assert_eq!(plans[0]["risks"], serde_json::json!(["-4", "1.5"]));

        let reloaded = store.load_register(ScoringModel::default()).unwrap();
        assert_eq!(reloaded.risks(), reg.risks());
    }

    #[test]
    fn test_atomic_write_replaces_existing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controls.json");
        atomic_write(&path, "[]").unwrap();
        atomic_write(&path, "[{\"id\": 1}]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[{\"id\": 1}]");
        assert_eq!(
            temp_path_for(&path).file_name().unwrap(),
            ".controls.json.tmp"
        );
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_remove_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path());
        store.write("interviews", &Vec::<Interview>::new()).unwrap();
        assert!(store.contains("interviews"));
        store.remove("interviews").unwrap();
        assert!(!store.contains("interviews"));
        store.remove("interviews").unwrap();
    }
}
