//! Plain text rendering of listings, details and genres.

use std::fmt::{self, Display};

use animedex_catalog::{Anime, Genre, SortOrder};
use animedex_core::{DetailBundle, ListingView, PaginationView, QueryFilters};
use itertools::Itertools;
use serde::Serialize;

/// A listing page as printed by `browse` and `interactive`.
pub struct DisplayListing<'a> {
    pub view: ListingView<'a>,
    pub sort: SortOrder,
}

impl Display for DisplayListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view {
            ListingView::Skeleton { placeholders } => {
                write!(f, "Loading {placeholders} titles...")
            },
            ListingView::Error { message } => {
                write!(f, "Could not load titles: {message}\nType 'retry' to try again.")
            },
            ListingView::Empty => write!(f, "No titles match the current filters."),
            ListingView::Populated {
                records,
                pagination,
                dimmed,
            } => {
                for record in records.iter() {
                    writeln!(f, "{}", DisplayRecordLine(record))?;
                }
                if pagination.is_visible() {
                    write!(
                        f,
                        "\nPage {} of {}, sorted by {}",
                        pagination.current_page, pagination.total_pages, self.sort
                    )?;
                } else {
                    write!(f, "\nSorted by {}", self.sort)?;
                }
                if *dimmed {
                    write!(f, " (refreshing)")?;
                }
                Ok(())
            },
        }
    }
}

/// One line per record: id, title and a short summary.
struct DisplayRecordLine<'a>(&'a Anime);

impl Display for DisplayRecordLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        write!(f, "{:>6}  {}", record.mal_id, record.display_title())?;

        let summary = [
            record.kind.clone(),
            record.episodes.map(|episodes| format!("{episodes} eps")),
            record.year.map(|year| year.to_string()),
        ]
        .into_iter()
        .flatten()
        .join(", ");
        if !summary.is_empty() {
            write!(f, " ({summary})")?;
        }
        if let Some(score) = record.score {
            write!(f, "  score {score:.2}")?;
        }
        Ok(())
    }
}

pub struct DisplayDetail<'a>(pub &'a DetailBundle);

impl Display for DisplayDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let DetailBundle { record, relations } = self.0;

        write!(f, "{}", record.display_title())?;
        if let Some(japanese) = record.title_japanese.as_deref() {
            write!(f, " ({japanese})")?;
        }
        writeln!(f)?;

        let facts = [
            record.kind.clone(),
            record.episodes.map(|episodes| format!("{episodes} episodes")),
            record.status.clone(),
            record.aired.as_ref().and_then(|aired| aired.string.clone()),
        ]
        .into_iter()
        .flatten()
        .join(" | ");
        if !facts.is_empty() {
            writeln!(f, "{facts}")?;
        }

        if let Some(score) = record.score {
            write!(f, "Score: {score:.2}")?;
            if let Some(rank) = record.rank {
                write!(f, " (rank #{rank})")?;
            }
            writeln!(f)?;
        }
        write_names(f, "Genres", &record.genres)?;
        write_names(f, "Studios", &record.studios)?;
        if let Some(trailer) = record.trailer_embed_url() {
            writeln!(f, "Trailer: {trailer}")?;
        }
        if let Some(synopsis) = record.synopsis.as_deref() {
            writeln!(f, "\n{synopsis}")?;
        }

        if !relations.is_empty() {
            writeln!(f, "\nRelated:")?;
            for group in relations {
                let entries = group
                    .entries
                    .iter()
                    .map(|entry| format!("{} ({})", entry.name, entry.kind))
                    .join(", ");
                writeln!(f, "  {}: {entries}", group.relation)?;
            }
        }
        Ok(())
    }
}

fn write_names(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    names: &[animedex_catalog::MalUrl],
) -> fmt::Result {
    if names.is_empty() {
        return Ok(());
    }
    writeln!(f, "{label}: {}", names.iter().map(|n| &n.name).join(", "))
}

pub struct DisplayGenres<'a>(pub &'a [Genre]);

impl Display for DisplayGenres<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self.0.iter().map(|genre| match genre.count {
            Some(count) => format!("{:>4}  {} ({count})", genre.mal_id, genre.name),
            None => format!("{:>4}  {}", genre.mal_id, genre.name),
        });
        write!(f, "{}", lines.format("\n"))
    }
}

/// The JSON document printed by `browse --json`.
#[derive(Debug, Serialize)]
pub struct ListingJson<'a> {
    pub filters: &'a QueryFilters,
    pub pagination: PaginationView,
    pub records: &'a [Anime],
}
