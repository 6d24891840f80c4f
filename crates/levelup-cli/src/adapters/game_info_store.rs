//! JSON file repository of installed games.
//!
//! The whole store is one small document keyed by game id. Writes go to a
//! sibling temp file that is renamed over the original.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use levelup_core::{GameId, GameInfoRepository, LocalGameInfo, RepositoryError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// On-disk layout of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GameInfoDocument {
    #[serde(default)]
    games: BTreeMap<GameId, LocalGameInfo>,
}

/// [`GameInfoRepository`] persisted as a JSON file.
#[derive(Debug)]
pub struct JsonGameInfoRepository {
    path: PathBuf,
    // Serialises read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonGameInfoRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded game.
    pub async fn list(&self) -> Result<BTreeMap<GameId, LocalGameInfo>, RepositoryError> {
        Ok(self.load().await?.games)
    }

    async fn load(&self) -> Result<GameInfoDocument, RepositoryError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| RepositoryError::Serialization(format!("{}: {e}", self.path.display()))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(GameInfoDocument::default()),
            Err(err) => Err(storage_error(&self.path, &err)),
        }
    }

    async fn save(&self, document: &GameInfoDocument) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, &e))?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| storage_error(&staging, &e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, &e))
    }
}

fn storage_error(path: &Path, err: &io::Error) -> RepositoryError {
    RepositoryError::Storage(format!("{}: {err}", path.display()))
}

#[async_trait]
impl GameInfoRepository for JsonGameInfoRepository {
    async fn get_game_info(
        &self,
        game_id: &GameId,
    ) -> Result<Option<LocalGameInfo>, RepositoryError> {
        Ok(self.load().await?.games.remove(game_id))
    }

    async fn set_game_info(
        &self,
        game_id: &GameId,
        info: LocalGameInfo,
    ) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        document.games.insert(game_id.clone(), info);
        self.save(&document).await?;
        tracing::debug!(
            target: "levelup.install",
            %game_id,
            path = %self.path.display(),
            "game info stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelup_core::InternalVersion;
    use tokio_test::assert_ok;

    fn info(version: u32) -> LocalGameInfo {
        LocalGameInfo {
            runnable_path: PathBuf::from("/games/moonfall/bin/moonfall.exe"),
            root_folder_path: PathBuf::from("/games/moonfall"),
            internal_version: InternalVersion::Number(version.into()),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonGameInfoRepository::new(dir.path().join("games.json"));
        tokio_test::block_on(async {
            assert!(assert_ok!(repo.get_game_info(&GameId::new("moonfall")).await).is_none());
            assert!(assert_ok!(repo.list().await).is_empty());
        });
        assert!(!repo.path().exists());
    }

    #[tokio::test]
    async fn test_set_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("games.json");
        let id = GameId::new("moonfall");

        let repo = JsonGameInfoRepository::new(&path);
        repo.set_game_info(&id, info(1)).await.unwrap();
        repo.set_game_info(&GameId::new("starlight"), info(4))
            .await
            .unwrap();
        repo.set_game_info(&id, info(2)).await.unwrap();

        let reopened = JsonGameInfoRepository::new(&path);
        assert_eq!(reopened.get_game_info(&id).await.unwrap(), Some(info(2)));
        assert_eq!(reopened.list().await.unwrap().len(), 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let repo = JsonGameInfoRepository::new(&path);
        assert!(matches!(
            repo.get_game_info(&GameId::new("moonfall")).await,
            Err(RepositoryError::Serialization(_))
        ));
    }
}
