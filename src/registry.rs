//! The game catalog shown in the lobby list. Loaded once at startup and
//! shared read-only; adding a game to the catalog is a deploy, not a
//! runtime mutation.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One catalog entry. `tier` gates premium games client-side; the playable
/// subset is whatever the controller has a [`crate::games::Game`] for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameListing {
    pub slug: String,
    pub name: String,
    pub tier: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Read-only game catalog.
#[derive(Debug, Clone)]
pub struct GameRegistry {
    listings: Vec<GameListing>,
}

const BUILTIN_CATALOG: &str = include_str!("../assets/games.json");

impl GameRegistry {
    /// Bundled catalog compiled into the binary.
    pub fn builtin() -> Self {
        let listings = serde_json::from_str(BUILTIN_CATALOG)
            .unwrap_or_else(|e| panic!("bundled games.json is invalid: {e}"));
        Self { listings }
    }

    /// Catalog from an operator-supplied file, falling back to the bundled
    /// one when the file is missing or malformed.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(listings) => {
                    tracing::info!(path = %path.display(), "loaded game catalog");
                    Self { listings }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "game catalog file is invalid, using bundled catalog");
                    Self::builtin()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read game catalog file, using bundled catalog");
                Self::builtin()
            }
        }
    }

    pub fn listings(&self) -> &[GameListing] {
        &self.listings
    }

    pub fn get(&self, slug: &str) -> Option<&GameListing> {
        self.listings.iter().find(|l| l.slug == slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog_parses_and_contains_playable_games() {
        let registry = GameRegistry::builtin();
        assert!(registry.listings().len() >= 3);
        for slug in [
            "ai-adventure-dungeon",
            "elinity-the-story-weaver",
            "elinity-truth-and-layer",
        ] {
            let listing = registry.get(slug).expect(slug);
            assert!(!listing.name.is_empty());
        }
    }

    #[test]
    fn test_load_prefers_file_and_falls_back_on_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"slug": "only-game", "name": "Only Game", "tier": "free", "category": "test"}}]"#
        )
        .unwrap();

        let registry = GameRegistry::load(Some(file.path()));
        assert_eq!(registry.listings().len(), 1);
        assert_eq!(registry.get("only-game").unwrap().image, None);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        let registry = GameRegistry::load(Some(bad.path()));
        assert!(registry.get("ai-adventure-dungeon").is_some());

        let registry = GameRegistry::load(Some(Path::new("/nonexistent/games.json")));
        assert!(registry.get("ai-adventure-dungeon").is_some());
    }
}
