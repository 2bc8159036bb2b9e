use animedex_catalog::{CatalogService, RecordId};
use animedex_core::{DetailView, Session};
use anyhow::{Result, bail};
use bpaf::Bpaf;
use tracing::instrument;

use crate::config::Config;
use crate::utils::render::DisplayDetail;

#[derive(Bpaf, Clone, Debug, PartialEq)]
pub struct Show {
    /// Print the title as JSON
    #[bpaf(long)]
    pub(crate) json: bool,

    /// The MyAnimeList id of the title
    #[bpaf(positional("ID"))]
    pub(crate) id: RecordId,
}

impl Show {
    #[instrument(name = "show", skip_all, fields(id = self.id))]
    pub async fn handle<S>(self, client: S, config: &Config) -> Result<()>
    where
        S: CatalogService + 'static,
    {
        let mut session = Session::new(client, config.session_settings());
        session.select_record(self.id);
        session.run_until_idle().await;

        match session.detail_view() {
            DetailView::Populated { bundle, .. } if self.json => {
                println!("{}", serde_json::to_string_pretty(bundle)?);
            },
            DetailView::Populated { bundle, .. } => println!("{}", DisplayDetail(bundle)),
            DetailView::Error { id, message } => bail!("could not load title {id}: {message}"),
            DetailView::Closed | DetailView::Loading { .. } => {
                bail!("title {} was not loaded", self.id)
            },
        }
        Ok(())
    }
}
