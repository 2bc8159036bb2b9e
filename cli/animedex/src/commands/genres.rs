use animedex_catalog::CatalogService;
use animedex_core::Session;
use anyhow::Result;
use bpaf::Bpaf;
use tracing::instrument;

use crate::config::Config;
use crate::utils::message;
use crate::utils::render::DisplayGenres;

#[derive(Bpaf, Clone, Debug, PartialEq)]
pub struct Genres {
    /// Print the genres as JSON
    #[bpaf(long)]
    pub(crate) json: bool,
}

impl Genres {
    #[instrument(name = "genres", skip_all)]
    pub async fn handle<S>(self, client: S, config: &Config) -> Result<()>
    where
        S: CatalogService + 'static,
    {
        let mut session = Session::new(client, config.session_settings());
        session.load_genres();
        session.run_until_idle().await;
        let genres = session.genres();

        if self.json {
            println!("{}", serde_json::to_string_pretty(genres)?);
            return Ok(());
        }
        if genres.is_empty() {
            message::warning("No genres available, the catalog may be unreachable.");
            return Ok(());
        }
        println!("{}", DisplayGenres(genres));
        Ok(())
    }
}
