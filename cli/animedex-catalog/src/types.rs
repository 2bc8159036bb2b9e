//! Catalog interaction types.
//!
//! Serde models of the Jikan v4 envelopes we consume, and the query model
//! used to build listing requests.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog records and genres are keyed by their MyAnimeList id.
pub type RecordId = u32;

/// Number of records requested per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 24;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single catalog entity.
///
/// Listing responses and the `/full` detail response share this type.
/// Everything except the id is optional, the detail variant simply fills
/// in more of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anime {
    pub mal_id: RecordId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub trailer: Option<Trailer>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_english: Option<String>,
    #[serde(default)]
    pub title_japanese: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub airing: Option<bool>,
    #[serde(default)]
    pub aired: Option<Aired>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub scored_by: Option<u64>,
    #[serde(default)]
    pub rank: Option<u64>,
    #[serde(default)]
    pub popularity: Option<u64>,
    #[serde(default)]
    pub members: Option<u64>,
    #[serde(default)]
    pub favorites: Option<u64>,
    #[serde(default)]
    pub synopsis: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub genres: Vec<MalUrl>,
    #[serde(default)]
    pub themes: Vec<MalUrl>,
    #[serde(default)]
    pub studios: Vec<MalUrl>,
}

impl Anime {
    /// A record carrying nothing but its id and title.
    pub fn new(mal_id: RecordId, title: impl Into<String>) -> Self {
        Self {
            mal_id,
            url: None,
            images: None,
            trailer: None,
            title: title.into(),
            title_english: None,
            title_japanese: None,
            kind: None,
            source: None,
            episodes: None,
            status: None,
            airing: None,
            aired: None,
            duration: None,
            rating: None,
            score: None,
            scored_by: None,
            rank: None,
            popularity: None,
            members: None,
            favorites: None,
            synopsis: None,
            background: None,
            season: None,
            year: None,
            genres: Vec::new(),
            themes: Vec::new(),
            studios: Vec::new(),
        }
    }

    /// The English title if there is one, the default title otherwise.
    pub fn display_title(&self) -> &str {
        self.title_english
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.title)
    }

    /// Embeddable trailer url, derived from the YouTube id if the catalog
    /// does not provide one.
    pub fn trailer_embed_url(&self) -> Option<String> {
        let trailer = self.trailer.as_ref()?;
        trailer.embed_url.clone().or_else(|| {
            trailer
                .youtube_id
                .as_ref()
                .map(|id| format!("https://www.youtube.com/embed/{id}"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Images {
    pub jpg: Option<Image>,
    pub webp: Option<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub image_url: Option<String>,
    pub small_image_url: Option<String>,
    pub large_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trailer {
    pub youtube_id: Option<String>,
    pub url: Option<String>,
    pub embed_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aired {
    pub from: Option<String>,
    pub to: Option<String>,
    pub string: Option<String>,
}

/// A named reference to another catalog entity (genre, studio, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalUrl {
    pub mal_id: RecordId,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// `GET /anime`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingResponse {
    pub data: Vec<Anime>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub last_visible_page: u32,
    pub has_next_page: bool,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub items: Option<PaginationItems>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationItems {
    pub count: u32,
    pub total: u32,
    pub per_page: u32,
}

/// `GET /anime/{id}/full`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailResponse {
    pub data: Anime,
}

/// `GET /anime/{id}/relations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationsResponse {
    pub data: Vec<RelationGroup>,
}

/// All entries related to a record in the same way, e.g. all sequels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationGroup {
    /// The kind of relation, e.g. "Sequel" or "Adaptation"
    pub relation: String,
    #[serde(rename = "entry")]
    pub entries: Vec<RelationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub mal_id: RecordId,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub url: String,
}

/// `GET /genres/anime?filter=genres`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreResponse {
    pub data: Vec<Genre>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub mal_id: RecordId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl Genre {
    pub fn new(mal_id: RecordId, name: impl Into<String>) -> Self {
        Self {
            mal_id,
            name: name.into(),
            url: None,
            count: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listing queries
// ---------------------------------------------------------------------------

/// Fields the catalog can order listings by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Popularity,
    Score,
    StartDate,
    Rank,
    Title,
}

impl SortField {
    /// The upstream `order_by` token.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Popularity => "popularity",
            SortField::Score => "score",
            SortField::StartDate => "start_date",
            SortField::Rank => "rank",
            SortField::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// The upstream `sort` token.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A sort field together with its direction, written as `field:direction`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    /// The orderings offered for selection, most useful first.
    pub const PRESETS: [SortOrder; 5] = [
        SortOrder::new(SortField::Popularity, SortDirection::Desc),
        SortOrder::new(SortField::Score, SortDirection::Desc),
        SortOrder::new(SortField::StartDate, SortDirection::Desc),
        SortOrder::new(SortField::Rank, SortDirection::Asc),
        SortOrder::new(SortField::Title, SortDirection::Asc),
    ];

    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field.as_str(), self.direction.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sort order '{0}', expected '<field>:<asc|desc>' with field one of popularity, score, start_date, rank, title")]
pub struct ParseSortOrderError(String);

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSortOrderError(s.to_string());
        let (field, direction) = s.split_once(':').ok_or_else(err)?;
        let field = match field {
            "popularity" => SortField::Popularity,
            "score" => SortField::Score,
            "start_date" => SortField::StartDate,
            "rank" => SortField::Rank,
            "title" => SortField::Title,
            _ => return Err(err()),
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Err(err()),
        };
        Ok(SortOrder::new(field, direction))
    }
}

/// All parameters of a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    /// Free text search, omitted from the request when empty
    pub text: String,
    /// Genres every result must have, omitted from the request when empty
    pub genre_ids: BTreeSet<RecordId>,
    pub sort: SortOrder,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            text: String::new(),
            genre_ids: BTreeSet::new(),
            sort: SortOrder::default(),
        }
    }
}
