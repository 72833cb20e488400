//! Badge and cheermote catalog learned from Twitch GQL responses.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::Result;
use crate::event::Badge;

/// GQL operations that feed the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GqlOperation {
    GlobalBadges,
    ChannelBadges,
    Cheermotes,
}

impl GqlOperation {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "GlobalBadges" => Some(Self::GlobalBadges),
            "ChatList_Badges" => Some(Self::ChannelBadges),
            "BitsConfigContext_Global" => Some(Self::Cheermotes),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GqlResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    extensions: GqlExtensions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlExtensions {
    #[serde(default)]
    operation_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GqlBadge {
    #[serde(rename = "setID")]
    set_id: String,
    version: String,
    #[serde(rename = "image4x")]
    image_4x: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheerConfig {
    groups: Vec<CheermoteGroup>,
}

#[derive(Debug, Deserialize)]
struct CheermoteGroup {
    #[serde(default)]
    nodes: Vec<Cheermote>,
}

#[derive(Debug, Deserialize)]
struct Cheermote {
    prefix: String,
}

/// Global set ids that channels commonly override; stored under `global/`.
const OVERRIDABLE_GLOBAL_SETS: [&str; 2] = ["bits", "subscriber"];

#[derive(Debug, Clone, Default)]
pub struct TwitchCatalog {
    badges: HashMap<String, String>,
    cheermotes: HashSet<String>,
}

impl TwitchCatalog {
    /// Ingest a GQL response (an array of operation results).
    ///
    /// Returns how many operations updated the catalog.
    pub fn ingest_gql(&mut self, value: Value) -> Result<usize> {
        let responses: Vec<GqlResponse> = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };

        let mut applied = 0;
        for response in responses {
            let Some(op) = response
                .extensions
                .operation_name
                .as_deref()
                .and_then(GqlOperation::from_name)
            else {
                continue;
            };

            match op {
                GqlOperation::GlobalBadges => {
                    let badges: Vec<GqlBadge> =
                        serde_json::from_value(response.data["badges"].clone())?;
                    self.add_badges(badges, true);
                }
                GqlOperation::ChannelBadges => {
                    let badges: Vec<GqlBadge> = serde_json::from_value(
                        response.data["user"]["broadcastBadges"].clone(),
                    )?;
                    self.add_badges(badges, false);
                }
                GqlOperation::Cheermotes => {
                    let config: CheerConfig =
                        serde_json::from_value(response.data["cheerConfig"].clone())?;
                    for node in config.groups.into_iter().flat_map(|g| g.nodes) {
                        self.add_cheermote(&node.prefix);
                    }
                }
            }
            debug!(operation = ?op, "Twitch catalog updated");
            applied += 1;
        }

        Ok(applied)
    }

    fn add_badges(&mut self, badges: Vec<GqlBadge>, global: bool) {
        for badge in badges {
            let mut code = format!("{}/{}", badge.set_id, badge.version);
            if global && OVERRIDABLE_GLOBAL_SETS.contains(&badge.set_id.as_str()) {
                code = format!("global/{code}");
            }
            self.badges.insert(code, badge.image_4x);
        }
    }

    pub fn add_cheermote(&mut self, prefix: &str) {
        self.cheermotes.insert(prefix.to_lowercase());
    }

    pub fn is_cheermote(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.cheermotes.contains(&prefix.to_lowercase())
    }

    /// Resolve a `badges` tag (`set/version,...`); unknown badges are omitted.
    pub fn badges_for(&self, tag: Option<&str>) -> Vec<Badge> {
        let Some(tag) = tag else {
            return Vec::new();
        };
        tag.split(',')
            .filter(|b| !b.is_empty())
            .filter_map(|code| {
                self.badges
                    .get(code)
                    .or_else(|| self.badges.get(&format!("global/{code}")))
                    .map(|url| Badge::new(code, url.clone()))
            })
            .collect()
    }

    pub fn badge_count(&self) -> usize {
        self.badges.len()
    }
}
