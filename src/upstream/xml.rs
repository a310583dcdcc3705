//! XML parsing for catalog documents
//!
//! Item detail documents (`<items><item id=..>`) parse into [`GameRecord`]; ranked
//! listing pages parse into [`ListingItem`]s.

use super::UpstreamError;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

const NOT_RANKED: &str = "Not Ranked";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryRank {
    Ranked(u32),
    Unranked,
}

impl CategoryRank {
    fn parse(value: &str) -> Self {
        if value == NOT_RANKED {
            return Self::Unranked;
        }
        value
            .trim()
            .parse()
            .map(Self::Ranked)
            .unwrap_or(Self::Unranked)
    }

    pub fn position(&self) -> Option<u32> {
        match self {
            Self::Ranked(position) => Some(*position),
            Self::Unranked => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub name: String,
    pub friendly_name: Option<String>,
    pub rank: CategoryRank,
}

/// A board game's detail record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub name: String,
    pub year_published: Option<i32>,
    pub ranks: Vec<RankEntry>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub min_playtime: Option<u32>,
    pub max_playtime: Option<u32>,
    pub image: Option<String>,
    pub description: Option<String>,
}

impl GameRecord {
    /// Rank in a category, matched by rank `name` or `friendlyname`
    pub fn rank_for(&self, category: &str) -> Option<&CategoryRank> {
        self.ranks
            .iter()
            .find(|r| r.name == category || r.friendly_name.as_deref() == Some(category))
            .map(|r| &r.rank)
    }
}

/// One entry of a ranked category listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub id: String,
    pub name: Option<String>,
}

fn invalid(message: impl Into<String>) -> UpstreamError {
    UpstreamError::InvalidResponse(message.into())
}

fn parse_document(xml: &str) -> Result<Document<'_>, UpstreamError> {
    Document::parse(xml).map_err(|e| invalid(format!("malformed XML: {e}")))
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

fn value_attr<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    child(node, tag).and_then(|n| n.attribute("value"))
}

fn number<T: std::str::FromStr>(node: Node<'_, '_>, tag: &str) -> Option<T> {
    value_attr(node, tag).and_then(|v| v.trim().parse().ok())
}

fn text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parse the first `item` of a detail document
pub fn parse_game(xml: &str) -> Result<GameRecord, UpstreamError> {
    let doc = parse_document(xml)?;
    let item = doc
        .descendants()
        .find(|n| n.has_tag_name("item"))
        .ok_or_else(|| invalid("no item element in detail document"))?;

    let id = item
        .attribute("id")
        .ok_or_else(|| invalid("item element has no id"))?
        .to_string();

    let names: Vec<Node<'_, '_>> = item
        .children()
        .filter(|n| n.has_tag_name("name"))
        .collect();
    let name = names
        .iter()
        .find(|n| n.attribute("type") == Some("primary"))
        .or_else(|| names.first())
        .and_then(|n| n.attribute("value"))
        .ok_or_else(|| invalid(format!("item {id} has no name")))?
        .to_string();

    let ranks = item
        .descendants()
        .filter(|n| n.has_tag_name("rank"))
        .filter_map(|n| {
            Some(RankEntry {
                name: n.attribute("name")?.to_string(),
                friendly_name: n.attribute("friendlyname").map(str::to_string),
                rank: CategoryRank::parse(n.attribute("value").unwrap_or(NOT_RANKED)),
            })
        })
        .collect();

    let playing_time: Option<u32> = number(item, "playingtime");

    Ok(GameRecord {
        id,
        name,
        year_published: number(item, "yearpublished"),
        ranks,
        min_players: number(item, "minplayers"),
        max_players: number(item, "maxplayers"),
        min_playtime: number(item, "minplaytime").or(playing_time),
        max_playtime: number(item, "maxplaytime").or(playing_time),
        image: text(item, "image"),
        description: text(item, "description"),
    })
}

/// Parse a listing page into `(id, name)` items, in document order
pub fn parse_listing(xml: &str) -> Result<Vec<ListingItem>, UpstreamError> {
    let doc = parse_document(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("item"))
        .filter_map(|n| {
            let id = n.attribute("id")?.to_string();
            let name = n
                .attribute("name")
                .or_else(|| value_attr(n, "name"))
                .map(str::to_string);
            Some(ListingItem { id, name })
        })
        .collect())
}
