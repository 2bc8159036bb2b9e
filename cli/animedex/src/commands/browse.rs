use animedex_catalog::{CatalogService, RecordId, SortOrder};
use animedex_core::{ListingView, QueryFilters, Session};
use anyhow::{Result, bail};
use bpaf::Bpaf;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::utils::message;
use crate::utils::render::{DisplayListing, ListingJson};

/// List titles
#[derive(Bpaf, Clone, Debug, PartialEq)]
pub struct Browse {
    /// Only list titles matching TEXT
    #[bpaf(long, short, argument("TEXT"))]
    pub(crate) search: Option<String>,

    /// Only list titles with genre ID, repeat to require several genres
    #[bpaf(long("genre"), short('g'), argument("ID"), many)]
    pub(crate) genres: Vec<RecordId>,

    /// Sort order, e.g. popularity:desc, score:desc, start_date:desc, rank:asc or title:asc
    #[bpaf(long, argument("FIELD:DIR"), fallback(SortOrder::default()))]
    pub(crate) sort: SortOrder,

    /// Page to show
    #[bpaf(long, short, argument("N"), fallback(1))]
    pub(crate) page: u32,

    /// Print the listing as JSON
    #[bpaf(long)]
    pub(crate) json: bool,
}

impl Browse {
    #[instrument(name = "browse", skip_all)]
    pub async fn handle<S>(self, client: S, config: &Config) -> Result<()>
    where
        S: CatalogService + 'static,
    {
        let filters = QueryFilters {
            search_text: self.search.unwrap_or_default(),
            genre_ids: self.genres.into_iter().collect(),
            sort: self.sort,
        };
        let mut session = Session::with_filters(client, config.session_settings(), filters);

        session.start();
        session.run_until_idle().await;

        // The number of pages is only known after the first page arrived
        if self.page != 1 && session.controller().error().is_none() {
            debug!(page = self.page, "moving to requested page");
            session.set_page(self.page)?;
            session.run_until_idle().await;
        }

        let controller = session.controller();
        let view = session.listing_view();
        if let ListingView::Error { message } = view {
            bail!("could not load titles: {message}");
        }

        if self.json {
            let document = ListingJson {
                filters: controller.filters(),
                pagination: controller.page().into(),
                records: controller.records(),
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
            return Ok(());
        }

        if view == ListingView::Empty {
            message::warning("No titles match the given filters.");
            return Ok(());
        }
        println!("{}", DisplayListing {
            view,
            sort: controller.filters().sort,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use animedex_catalog::{
        Anime,
        ListingQuery,
        ListingResponse,
        MockClient,
        MockResponse,
        Pagination,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn test_config() -> Config {
        let vars = [("LATENCY_FLOOR_MS", "0")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(&[], vars).unwrap()
    }

    fn listing(ids: &[u32], last_visible_page: u32) -> MockResponse<ListingResponse> {
        MockResponse::ok(ListingResponse {
            data: ids.iter().map(|id| Anime::new(*id, format!("Record {id}"))).collect(),
            pagination: Pagination {
                last_visible_page,
                ..Default::default()
            },
        })
    }

    #[tokio::test]
    async fn browse_applies_filters_and_page() {
        let client = MockClient::default();
        client.push_listing(listing(&[1, 2], 4));
        client.push_listing(listing(&[3], 4));

        let browse = Browse {
            search: Some("bebop".to_string()),
            genres: vec![24, 1],
            sort: "score:desc".parse().unwrap(),
            page: 3,
            json: true,
        };
        browse.handle(client.clone(), &test_config()).await.unwrap();

        let queries = client.listing_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1], ListingQuery {
            page: 3,
            text: "bebop".to_string(),
            genre_ids: [1, 24].into(),
            sort: "score:desc".parse().unwrap(),
            ..Default::default()
        });
    }

    #[tokio::test]
    async fn browse_rejects_page_beyond_last() {
        let client = MockClient::default();
        client.push_listing(listing(&[1], 2));

        let browse = Browse {
            search: None,
            genres: Vec::new(),
            sort: SortOrder::default(),
            page: 3,
            json: false,
        };
        let err = browse
            .handle(client.clone(), &test_config())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "page 3 does not exist, pick a page between 1 and 2"
        );
        assert_eq!(client.listing_queries().len(), 1);
    }

    #[tokio::test]
    async fn browse_fails_on_upstream_error() {
        let client = MockClient::default();
        client.push_listing(MockResponse::error(500, "down for maintenance"));

        let browse = Browse {
            search: None,
            genres: Vec::new(),
            sort: SortOrder::default(),
            page: 1,
            json: false,
        };
        let err = browse.handle(client, &test_config()).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "could not load titles: HTTP error 500 Internal Server Error: down for maintenance"
        );
    }

    #[test]
    fn sessions_built_from_config_use_its_page_size() {
        let config = Config::from_sources(
            &[],
            [("PAGE_SIZE".to_string(), "10".to_string())].into(),
        )
        .unwrap();
        let session = Session::new(MockClient::default(), config.session_settings());
        assert_eq!(session.controller().page_size(), 10);
    }
}
