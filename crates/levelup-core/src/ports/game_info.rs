//! Local game record repository port.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RepositoryError;
use crate::domain::{GameId, LocalGameInfo};

/// Persistent record of installed games.
#[async_trait]
pub trait GameInfoRepository: Send + Sync {
    /// Fetch the record of a game, `None` when it was never installed.
    async fn get_game_info(&self, game_id: &GameId)
    -> Result<Option<LocalGameInfo>, RepositoryError>;

    /// Insert or replace the record of a game.
    async fn set_game_info(
        &self,
        game_id: &GameId,
        info: LocalGameInfo,
    ) -> Result<(), RepositoryError>;
}

/// Volatile repository for tests and headless runs.
#[derive(Debug, Default)]
pub struct InMemoryGameInfoRepository {
    records: RwLock<HashMap<GameId, LocalGameInfo>>,
}

impl InMemoryGameInfoRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameInfoRepository for InMemoryGameInfoRepository {
    async fn get_game_info(
        &self,
        game_id: &GameId,
    ) -> Result<Option<LocalGameInfo>, RepositoryError> {
        Ok(self.records.read().await.get(game_id).cloned())
    }

    async fn set_game_info(
        &self,
        game_id: &GameId,
        info: LocalGameInfo,
    ) -> Result<(), RepositoryError> {
        self.records.write().await.insert(game_id.clone(), info);
        Ok(())
    }
}
