use crate::game::GameState;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

/// Key the snapshot is stored under; also the file stem on disk.
pub const SNAPSHOT_KEY: &str = "pixelPetGame";

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).wrap_err_with(|| {
                format!("Failed to create data directory {}", dir.display())
            })?;
        }
        Ok(Self {
            path: dir.join(format!("{SNAPSHOT_KEY}.json")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Option<GameState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).wrap_err("Failed to read game snapshot")?;
        if data.is_empty() {
            return Ok(None);
        }
        let state = serde_json::from_slice::<GameState>(&data)
            .wrap_err("Failed to parse game snapshot JSON")?;
        Ok(Some(state))
    }

    pub fn save(&self, state: &GameState) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(state).wrap_err("Failed to serialize game snapshot")?;
        fs::write(&self.path, json).wrap_err("Failed to write game snapshot")?;
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).wrap_err("Failed to remove game snapshot")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::game::PetStats;

    #[test]
    fn save__then_load_returns_same_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        let state = GameState {
            stats: PetStats {
                hunger: 70,
                happy: 40,
                energy: 10,
            },
            coins: 25,
            inventory: vec!["cool-glasses".to_string()],
            equipped_items: vec!["cool-glasses".to_string()],
            pet_name: Some("Rex".to_string()),
            has_real_pet: true,
            ..GameState::default()
        };

        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn load__missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested")).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn load__corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn load__accepts_camel_case_blob_with_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        fs::write(
            store.path(),
            br#"{"stats":{"hunger":1,"happy":2,"energy":3},"coins":4,"inventory":[],
                "equippedItems":[],"isSleeping":true,"lastUpdate":5,"petMood":"sleeping",
                "petName":"Rex","hasRealPet":true}"#,
        )
        .unwrap();

        let state = store.load().unwrap().unwrap();

        assert!(state.is_sleeping);
        assert_eq!(state.pet_name.as_deref(), Some("Rex"));
        assert_eq!(state.stats.energy, 3);
    }

    #[test]
    fn remove__deletes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path()).unwrap();
        store.save(&GameState::default()).unwrap();

        store.remove().unwrap();

        assert!(!store.exists());
        store.remove().unwrap();
    }
}
