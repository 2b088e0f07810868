//! Catalog resolution: turning a character id into the ordered list of
//! voice assets to download.

mod models;
mod resolver;

pub use resolver::CatalogResolver;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::KoevaultError;

/// Asset category. Categories are resolved and downloaded in the order
/// solo, profile, card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Solo song renditions sung by the character alone.
    Solo,
    /// Profile scenario voice clips.
    Profile,
    /// Card episode scenario voice clips.
    Card,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Solo => "solo",
            Category::Profile => "profile",
            Category::Card => "card",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which categories a fetch session covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Solo songs, profile voices and card voices.
    All,
    /// Profile and card voices only, no songs.
    Voices,
    Solo,
    Profile,
    Card,
}

impl ContentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentMode::All => "all",
            ContentMode::Voices => "voices",
            ContentMode::Solo => "solo",
            ContentMode::Profile => "profile",
            ContentMode::Card => "card",
        }
    }

    /// Categories covered by this mode, in resolution order.
    pub fn categories(&self) -> &'static [Category] {
        match self {
            ContentMode::All => &[Category::Solo, Category::Profile, Category::Card],
            ContentMode::Voices => &[Category::Profile, Category::Card],
            ContentMode::Solo => &[Category::Solo],
            ContentMode::Profile => &[Category::Profile],
            ContentMode::Card => &[Category::Card],
        }
    }
}

impl std::fmt::Display for ContentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentMode {
    type Err = KoevaultError;

    /// Accepts mode names and their numeric aliases (0 through 4).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" | "0" => Ok(ContentMode::All),
            "voices" | "1" => Ok(ContentMode::Voices),
            "solo" | "2" => Ok(ContentMode::Solo),
            "profile" | "3" => Ok(ContentMode::Profile),
            "card" | "4" => Ok(ContentMode::Card),
            other => Err(KoevaultError::InvalidMode(other.to_string())),
        }
    }
}

/// A resolved catalog entry as stored in the cache. Destination paths are
/// derived at resolve time, so cached entries stay valid when the output
/// root changes between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Source-side identifier (music vocal id or voice clip id).
    pub id: String,
    pub remote_url: String,
    /// Transcript line written to the manifest.
    pub transcript: String,
    /// File name within the dataset directory, e.g. `S001.wav`.
    pub file_name: String,
}

/// A downloadable asset with its final on-disk destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub id: String,
    pub remote_url: String,
    pub transcript: String,
    pub destination_path: PathBuf,
    pub category: Category,
}

/// A character known to the master database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterEntry {
    pub id: i64,
    pub name: String,
}
