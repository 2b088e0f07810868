//! Wire models for the master database and scenario assets.
//!
//! Master-database files are JSON arrays with camelCase keys; scenario
//! assets are Unity-exported JSON documents with PascalCase keys. Only the
//! fields this crate consumes are modeled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Entry of `gameCharacters.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCharacter {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    pub given_name: String,
}

/// Entry of `musics.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Music {
    pub id: i64,
    pub title: String,
}

/// Singer listed on a music vocal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocalCharacter {
    pub character_id: i64,
    pub character_type: String,
}

/// Entry of `musicVocals.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicVocal {
    pub id: i64,
    pub music_id: i64,
    pub assetbundle_name: String,
    #[serde(default)]
    pub characters: Vec<VocalCharacter>,
}

/// Entry of `characterProfiles.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
    pub character_id: i64,
    pub scenario_id: String,
}

/// Entry of `character2ds.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character2d {
    pub id: i64,
    pub character_id: i64,
}

/// Entry of `cards.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub character_id: i64,
    pub assetbundle_name: String,
    /// Card title, used for logging only.
    #[serde(default)]
    pub prefix: String,
}

/// Entry of `cardEpisodes.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEpisode {
    pub assetbundle_name: String,
    pub scenario_id: String,
}

/// A scenario asset document (`.asset` extension, JSON content).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScenarioAsset {
    #[serde(rename = "m_Name", default)]
    pub name: String,
    #[serde(default)]
    pub talk_data: Vec<TalkData>,
}

/// One talk (dialogue line) of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TalkData {
    #[serde(default)]
    pub talk_characters: Vec<TalkCharacter>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub voices: Vec<TalkVoice>,
}

/// Speaker reference inside a talk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TalkCharacter {
    pub character2d_id: i64,
}

/// Voice clip reference inside a talk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TalkVoice {
    pub character2d_id: i64,
    pub voice_id: String,
}
