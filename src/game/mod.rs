//! Game lobby descriptors

pub mod descriptor;

pub use descriptor::{GameDescriptor, MAX_PLAYERS, MIN_PLAYERS};

use std::collections::BTreeMap;
use crate::error::{FlowResult, StakeFlowError};

/// Lookup of lobby descriptors by game type
#[derive(Debug, Clone)]
pub struct GameCatalog {
    games: BTreeMap<String, GameDescriptor>,
}

impl GameCatalog {
    pub fn empty() -> Self {
        Self { games: BTreeMap::new() }
    }

    /// Lobbies shipped with the platform
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for descriptor in [
            GameDescriptor::new("snake", 4).with_timeouts(12_000, 30_000),
            GameDescriptor::new("poolroyale", 2),
            GameDescriptor::new("snooker", 2),
            GameDescriptor::new("chess", 2),
            GameDescriptor::new("ludo", 4),
            GameDescriptor::new("generic", 2).with_matchmaking_timeout(35_000),
        ] {
            catalog.games.insert(descriptor.game_type.clone(), descriptor);
        }
        catalog
    }

    /// Add or replace a descriptor
    pub fn register(&mut self, descriptor: GameDescriptor) -> FlowResult<()> {
        descriptor.validate()?;
        self.games.insert(descriptor.game_type.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, game_type: &str) -> FlowResult<&GameDescriptor> {
        self.games.get(game_type).ok_or_else(|| StakeFlowError::Validation {
            message: format!("Unknown game type {game_type:?}"),
            field: Some("game_type".to_string()),
        })
    }

    pub fn game_types(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl Default for GameCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
