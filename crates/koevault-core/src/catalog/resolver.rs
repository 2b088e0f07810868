//! Turns a character id into the ordered list of asset descriptors for a
//! content mode.
//!
//! Every remote document the resolver reads goes through the metadata
//! cache: master-database files under the `master` namespace, scenario
//! assets under `asset`, and the resolved per-category item lists under
//! `catalog`. Within the cache TTL a repeated resolve is fully served from
//! disk. Resolution of a category is all or nothing; a fetch failure fails
//! the whole resolve rather than yielding a partial list.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::MetadataCache;
use crate::catalog::models::{
    Card, CardEpisode, Character2d, CharacterProfile, GameCharacter, Music, MusicVocal,
    ScenarioAsset,
};
use crate::catalog::{AssetDescriptor, CatalogItem, Category, CharacterEntry, ContentMode};
use crate::config::{DownloadConfig, Endpoints};
use crate::net::{JsonSource, RetryConfig, retry_async};
use crate::{KoevaultError, Result};

pub struct CatalogResolver {
    source: Arc<dyn JsonSource>,
    cache: Arc<MetadataCache>,
    retry: RetryConfig,
    output_root: PathBuf,
}

impl CatalogResolver {
    pub fn new(
        source: Arc<dyn JsonSource>,
        cache: Arc<MetadataCache>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            cache,
            retry: RetryConfig::new(),
            output_root: output_root.into(),
        }
    }

    /// Override the retry policy for catalog fetches.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Directory all assets of `character_id` are written to.
    pub fn dataset_dir(&self, character_id: i64) -> PathBuf {
        self.output_root.join(format!(
            "{}{}",
            DownloadConfig::DATASET_DIR_PREFIX,
            character_id
        ))
    }

    /// Resolve the full ordered download list for a character.
    ///
    /// Categories are resolved in the mode's order (solo and profile before
    /// cards), and `max_card_count` keeps only the first that many card
    /// voices. The returned descriptors are in download order.
    pub async fn resolve(
        &self,
        character_id: i64,
        mode: ContentMode,
        max_card_count: usize,
    ) -> Result<Vec<AssetDescriptor>> {
        let dataset_dir = self.dataset_dir(character_id);
        let mut descriptors = Vec::new();

        for &category in mode.categories() {
            let mut items = self.resolve_category(character_id, category).await?;
            if category == Category::Card && items.len() > max_card_count {
                info!(
                    "Keeping the first {} of {} card voices",
                    max_card_count,
                    items.len()
                );
                items.truncate(max_card_count);
            }

            descriptors.extend(items.into_iter().map(|item| AssetDescriptor {
                id: item.id,
                remote_url: item.remote_url,
                transcript: item.transcript,
                destination_path: dataset_dir.join(&item.file_name),
                category,
            }));
        }

        info!(
            "Resolved {} assets for character {} (mode {})",
            descriptors.len(),
            character_id,
            mode
        );
        Ok(descriptors)
    }

    /// All characters known to the master database, in database order.
    pub async fn list_characters(&self) -> Result<Vec<CharacterEntry>> {
        let characters: Vec<GameCharacter> = self.master("gameCharacters").await?;
        Ok(characters
            .into_iter()
            .map(|c| CharacterEntry {
                id: c.id,
                name: match c.first_name {
                    Some(first) => format!("{}{}", first, c.given_name),
                    None => c.given_name,
                },
            })
            .collect())
    }

    async fn resolve_category(
        &self,
        character_id: i64,
        category: Category,
    ) -> Result<Vec<CatalogItem>> {
        let key = format!("{}/{}", character_id, category);
        self.cache
            .get_or_fetch("catalog", &key, || async move {
                match category {
                    Category::Solo => self.solo_items(character_id).await,
                    Category::Profile => self.profile_items(character_id).await,
                    Category::Card => self.card_items(character_id).await,
                }
            })
            .await
    }

    /// Songs the character sings alone. Other vocal versions of the same
    /// music (duets, group versions) are skipped.
    async fn solo_items(&self, character_id: i64) -> Result<Vec<CatalogItem>> {
        let vocals: Vec<MusicVocal> = self.master("musicVocals").await?;
        let musics: Vec<Music> = self.master("musics").await?;

        let mut items = Vec::new();
        let mut index = 1usize;
        for vocal in &vocals {
            let singers: Vec<i64> = vocal
                .characters
                .iter()
                .filter(|c| c.character_type == "game_character")
                .map(|c| c.character_id)
                .collect();
            if singers != [character_id] {
                continue;
            }

            let Some(music) = musics.iter().find(|m| m.id == vocal.music_id) else {
                warn!(
                    "Music {} referenced by vocal {} not in master database, skipping",
                    vocal.music_id, vocal.id
                );
                continue;
            };
            debug!("Found solo song: {}", music.title);

            let bundle = &vocal.assetbundle_name;
            items.push(CatalogItem {
                id: vocal.id.to_string(),
                remote_url: format!(
                    "{}/music/long/{}/{}.wav",
                    Endpoints::ASSET_BASE,
                    bundle,
                    bundle
                ),
                transcript: music.title.clone(),
                file_name: format!("S{:03}.wav", index),
            });
            index += 1;
        }

        info!("Character {} has {} solo songs", character_id, items.len());
        Ok(items)
    }

    /// Voice clips from the character's profile scenario.
    async fn profile_items(&self, character_id: i64) -> Result<Vec<CatalogItem>> {
        let profiles: Vec<CharacterProfile> = self.master("characterProfiles").await?;
        let scenario_id = profiles
            .iter()
            .find(|p| p.character_id == character_id)
            .map(|p| p.scenario_id.clone())
            .ok_or(KoevaultError::CharacterNotFound { character_id })?;

        let character_2d_ids = self.character_2d_ids(character_id).await?;
        let asset = self
            .scenario_asset(&format!("scenario/profile/{}.asset", scenario_id))
            .await?;
        debug!("Profile voice asset: {}", asset.name);

        let voice_base = format!(
            "{}/sound/scenario/voice/{}",
            Endpoints::ASSET_BASE,
            scenario_id
        );
        let (items, _) = collect_talk_items(&asset, &character_2d_ids, &voice_base, "P", 3, 1);

        info!(
            "Character {} has {} profile voices",
            character_id,
            items.len()
        );
        Ok(items)
    }

    /// Voice clips from every episode scenario of the character's cards.
    /// File numbering is shared across episodes so names stay unique.
    async fn card_items(&self, character_id: i64) -> Result<Vec<CatalogItem>> {
        let cards: Vec<Card> = self.master("cards").await?;
        let episodes: Vec<CardEpisode> = self.master("cardEpisodes").await?;
        let character_2d_ids = self.character_2d_ids(character_id).await?;

        let mut items = Vec::new();
        let mut index = 1usize;
        for card in cards.iter().filter(|c| c.character_id == character_id) {
            debug!("Card {}: bundle {}", card.prefix, card.assetbundle_name);

            for episode in episodes
                .iter()
                .filter(|e| e.assetbundle_name == card.assetbundle_name)
            {
                let asset = self
                    .scenario_asset(&format!(
                        "character/member/{}/{}.asset",
                        card.assetbundle_name, episode.scenario_id
                    ))
                    .await?;

                let voice_base = format!(
                    "{}/sound/card_scenario/voice/{}",
                    Endpoints::ASSET_BASE,
                    episode.scenario_id
                );
                let (mut collected, next) =
                    collect_talk_items(&asset, &character_2d_ids, &voice_base, "C", 4, index);
                items.append(&mut collected);
                index = next;
            }
        }

        info!("Character {} has {} card voices", character_id, items.len());
        Ok(items)
    }

    /// 2D model ids belonging to the character. Scenario voices carry the
    /// model id of their speaker, not the character id.
    async fn character_2d_ids(&self, character_id: i64) -> Result<Vec<i64>> {
        let character_2ds: Vec<Character2d> = self.master("character2ds").await?;
        let ids: Vec<i64> = character_2ds
            .iter()
            .filter(|c| c.character_id == character_id)
            .map(|c| c.id)
            .collect();
        debug!("Character {} 2d model ids: {:?}", character_id, ids);
        Ok(ids)
    }

    async fn master<T>(&self, file: &str) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let url = format!("{}/{}.json", Endpoints::MASTER_DB_BASE, file);
        self.fetch_cached("master", file, &url).await
    }

    async fn scenario_asset(&self, path: &str) -> Result<ScenarioAsset> {
        let url = format!("{}/{}", Endpoints::ASSET_BASE, path);
        self.fetch_cached("asset", path, &url).await
    }

    /// Fetch a JSON document through the cache, retrying transport
    /// failures per the retry policy.
    async fn fetch_cached<T>(&self, namespace: &str, key: &str, url: &str) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        self.cache
            .get_or_fetch(namespace, key, || async {
                let (result, stats) = retry_async(
                    &self.retry,
                    || self.source.fetch_json(url),
                    KoevaultError::is_retryable,
                )
                .await;
                if stats.attempts > 1 {
                    debug!("Fetched {} after {} attempts", url, stats.attempts);
                }
                let value = result?;
                serde_json::from_value(value).map_err(KoevaultError::from)
            })
            .await
    }
}

/// Walk a scenario asset and collect the voice clips spoken by the
/// character.
///
/// A talk contributes only when it has exactly one speaker and that speaker
/// is one of the character's 2D model ids; within a talk, only voices
/// attributed to those ids are taken. Numbering continues from
/// `start_index` so callers can keep one sequence across several scenarios.
fn collect_talk_items(
    asset: &ScenarioAsset,
    character_2d_ids: &[i64],
    voice_base: &str,
    prefix: &str,
    width: usize,
    start_index: usize,
) -> (Vec<CatalogItem>, usize) {
    let mut items = Vec::new();
    let mut index = start_index;

    for talk in &asset.talk_data {
        if talk.talk_characters.len() != 1 {
            continue;
        }
        if !talk
            .talk_characters
            .iter()
            .all(|c| character_2d_ids.contains(&c.character2d_id))
        {
            continue;
        }

        for voice in &talk.voices {
            if !character_2d_ids.contains(&voice.character2d_id) {
                continue;
            }
            items.push(CatalogItem {
                id: voice.voice_id.clone(),
                remote_url: format!("{}/{}.wav", voice_base, voice.voice_id),
                transcript: talk.body.replace('\n', ""),
                file_name: format!("{}{:0width$}.wav", prefix, index, width = width),
            });
            index += 1;
        }
    }

    (items, index)
}
