use std::io::Write;
use std::str::FromStr;

use animedex_catalog::{CatalogService, Genre, RecordId, SortOrder};
use animedex_core::{DetailView, GenreTaxonomy, QueryFilters, Session, Update};
use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use indoc::indoc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::utils::message;
use crate::utils::render::{DisplayDetail, DisplayGenres, DisplayListing};

const HELP: &str = indoc! {"
    search [TEXT]    filter by title, applied once you stop typing
    genre ID|NAME    toggle a genre filter
    genres           list genres and their ids
    sort FIELD:DIR   e.g. score:desc or title:asc
    page N           jump to page N
    next, prev       move between pages
    reset            clear search, genres and sort
    retry            repeat the last failed request
    open ID          show details of a title
    close            hide the details
    quit             leave"
};

#[derive(Bpaf, Clone, Debug, PartialEq)]
pub struct Interactive {
    /// Start with titles matching TEXT
    #[bpaf(long, short, argument("TEXT"))]
    pub(crate) search: Option<String>,
}

impl Interactive {
    #[instrument(name = "interactive", skip_all)]
    pub async fn handle<S>(self, client: S, config: &Config) -> Result<()>
    where
        S: CatalogService + 'static,
    {
        let filters = QueryFilters {
            search_text: self.search.unwrap_or_default(),
            ..Default::default()
        };
        let mut session = Session::with_filters(client, config.session_settings(), filters);

        message::plain("Type 'help' for a list of commands.");
        session.start();
        session.load_genres();
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        run(&mut session, stdin, &mut std::io::stdout()).await
    }
}

/// A genre given by id or by name.
#[derive(Debug, Clone, PartialEq)]
enum GenreRef {
    Id(RecordId),
    Name(String),
}

impl GenreRef {
    /// Names are only known once the taxonomy has been loaded.
    fn resolve(&self, taxonomy: Option<&GenreTaxonomy>) -> Result<RecordId> {
        let name = match self {
            GenreRef::Id(id) => return Ok(*id),
            GenreRef::Name(name) => name,
        };
        let Some(taxonomy) = taxonomy else {
            bail!("genres are not loaded yet, use the genre id or type 'genres' to load them");
        };
        taxonomy
            .find_by_name(name)
            .map(|genre| genre.mal_id)
            .with_context(|| format!("unknown genre '{name}', type 'genres' to list them"))
    }
}

/// A single line of user input.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Search(String),
    Genre(GenreRef),
    Genres,
    Sort(SortOrder),
    Page(u32),
    Next,
    Previous,
    Reset,
    Retry,
    Open(RecordId),
    Close,
    Help,
    Quit,
    Nothing,
}

impl FromStr for Input {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (line, ""),
        };
        let id = |what: &str| -> Result<u32> {
            argument
                .parse()
                .with_context(|| format!("'{command}' expects {what}, got '{argument}'"))
        };

        let input = match command {
            "" => Input::Nothing,
            "search" | "s" => Input::Search(argument.to_string()),
            "genre" | "g" => match argument.parse() {
                Ok(id) => Input::Genre(GenreRef::Id(id)),
                Err(_) if argument.is_empty() => bail!("'genre' expects a genre id or name"),
                Err(_) => Input::Genre(GenreRef::Name(argument.to_string())),
            },
            "genres" => Input::Genres,
            "sort" => Input::Sort(argument.parse()?),
            "page" | "p" => Input::Page(id("a page number")?),
            "next" | "n" => Input::Next,
            "prev" | "previous" => Input::Previous,
            "reset" => Input::Reset,
            "retry" | "r" => Input::Retry,
            "open" | "o" => Input::Open(id("a title id")?),
            "close" | "c" => Input::Close,
            "help" | "?" => Input::Help,
            "quit" | "q" | "exit" => Input::Quit,
            other => bail!("unknown command '{other}', type 'help' for a list of commands"),
        };
        Ok(input)
    }
}

/// Read commands from `input` and print results to `out` as they arrive.
///
/// Stops on `quit`, or at the end of `input` once all outstanding requests
/// finished.
async fn run<S, R, W>(session: &mut Session<S>, input: R, out: &mut W) -> Result<()>
where
    S: CatalogService + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    // print the genres once the outstanding load finished
    let mut show_genres = false;

    loop {
        tokio::select! {
            biased;

            line = lines.next_line() => {
                let Some(line) = line.context("Could not read input")? else {
                    break;
                };
                match line.parse::<Input>() {
                    Ok(Input::Quit) => return Ok(()),
                    Ok(input) => apply(session, input, &mut show_genres, out)?,
                    Err(err) => message::error(err),
                }
            }
            Some(update) = session.next_update(), if session.pending() > 0 => {
                render_update(session, update, &mut show_genres, out)?;
            }
        }
    }

    debug!(pending = session.pending(), "input closed, finishing outstanding requests");
    while let Some(update) = session.next_update().await {
        render_update(session, update, &mut show_genres, out)?;
    }
    Ok(())
}

fn apply<S, W>(
    session: &mut Session<S>,
    input: Input,
    show_genres: &mut bool,
    out: &mut W,
) -> Result<()>
where
    S: CatalogService + 'static,
    W: Write,
{
    match input {
        Input::Search(text) => session.set_search_text(text),
        Input::Genre(genre) => match genre.resolve(session.taxonomy()) {
            Ok(id) => {
                session.toggle_genre(id);
                let name = session
                    .taxonomy()
                    .and_then(|taxonomy| taxonomy.get(id))
                    .map_or_else(|| format!("genre {id}"), |genre| genre.name.clone());
                if session.controller().filters().genre_ids.contains(&id) {
                    message::updated(format!("Added {name}."));
                } else {
                    message::updated(format!("Removed {name}."));
                }
            },
            Err(err) => message::error(err),
        },
        Input::Genres if session.taxonomy().is_some() => print_genres(session.genres(), out)?,
        Input::Genres => {
            session.load_genres();
            *show_genres = true;
            message::plain("Loading genres...");
        },
        Input::Sort(sort) => session.set_sort(sort),
        Input::Page(page) => {
            if let Err(err) = session.set_page(page) {
                message::error(err);
            }
        },
        Input::Next => {
            if !session.next_page() {
                message::warning("Already on the last page.");
            }
        },
        Input::Previous => {
            if !session.previous_page() {
                message::warning("Already on the first page.");
            }
        },
        Input::Reset => {
            session.reset_all();
            message::updated("Filters cleared.");
        },
        Input::Retry => {
            if session.controller().error().is_some() {
                session.retry_listing();
            } else if matches!(session.detail_view(), DetailView::Error { .. }) {
                session.retry_detail();
            } else {
                message::plain("Nothing to retry.");
            }
        },
        Input::Open(id) => session.select_record(id),
        Input::Close => session.close_detail(),
        Input::Help => writeln!(out, "{HELP}")?,
        // quit is handled by the input loop
        Input::Quit | Input::Nothing => {},
    }
    Ok(())
}

fn render_update<S, W>(
    session: &Session<S>,
    update: Update,
    show_genres: &mut bool,
    out: &mut W,
) -> Result<()>
where
    S: CatalogService + 'static,
    W: Write,
{
    match update {
        Update::Listing => {
            let listing = DisplayListing {
                view: session.listing_view(),
                sort: session.controller().filters().sort,
            };
            writeln!(out, "{listing}\n")?;
        },
        Update::Detail => match session.detail_view() {
            DetailView::Populated { bundle, .. } => writeln!(out, "{}", DisplayDetail(bundle))?,
            DetailView::Error { id, message } => writeln!(
                out,
                "Could not load title {id}: {message}\nType 'retry' to try again.\n"
            )?,
            DetailView::Closed | DetailView::Loading { .. } => {},
        },
        Update::Genres if *show_genres => {
            *show_genres = false;
            print_genres(session.genres(), out)?;
        },
        Update::Genres => debug!(count = session.genres().len(), "genres loaded"),
        Update::ListingRequested => debug!("search text applied"),
        Update::Discarded | Update::Unchanged => {},
    }
    Ok(())
}

fn print_genres<W: Write>(genres: &[Genre], out: &mut W) -> Result<()> {
    if genres.is_empty() {
        message::warning("No genres available.");
    } else {
        writeln!(out, "{}\n", DisplayGenres(genres))?;
    }
    Ok(())
}
