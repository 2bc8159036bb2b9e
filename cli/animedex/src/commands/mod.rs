mod browse;
mod genres;
mod interactive;
mod show;

use std::fmt;

use anyhow::{Result, anyhow};
use bpaf::Bpaf;
use indoc::indoc;
use tracing::debug;

use crate::config::Config;
use crate::utils::init::init_catalog_client;

static ANIMEDEX_DESCRIPTION: &'_ str = indoc! {"
    Browse the MyAnimeList catalog from the command line.

    Search titles, narrow them down by genre, page through the results
    and look at the details of a single title."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, version, descr(ANIMEDEX_DESCRIPTION))]
pub struct AnimedexCli(#[bpaf(external(animedex_args))] pub AnimedexArgs);

/// Main animedex args parser
///
/// To parse the animedex CLI, use [`AnimedexCli`] instead using [`animedex_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)]
pub struct AnimedexArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    #[bpaf(external(commands))]
    command: Commands,
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command")
    }
}

impl AnimedexArgs {
    /// Run the selected command until it completes or the user interrupts it
    pub async fn handle(self, config: Config) -> Result<()> {
        let client = init_catalog_client(&config)?;
        let command = self.command;

        // Sessions are single threaded, so the command runs on a LocalSet
        // next to the signal handler.
        tokio::task::LocalSet::new()
            .run_until(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        debug!("received interrupt");
                        Err(anyhow!("user interrupted process"))
                    }
                    result = tokio::task::spawn_local(command.handle(client, config)) => result?
                }
            })
            .await
    }
}

#[derive(Bpaf, Clone)]
enum Commands {
    /// List titles, optionally filtered and sorted
    #[bpaf(command)]
    Browse(#[bpaf(external(browse::browse))] browse::Browse),

    /// Show the details and relations of a single title
    #[bpaf(command)]
    Show(#[bpaf(external(show::show))] show::Show),

    /// List the genres that titles can be filtered by
    #[bpaf(command)]
    Genres(#[bpaf(external(genres::genres))] genres::Genres),

    /// Browse interactively, reading commands from stdin
    #[bpaf(command)]
    Interactive(#[bpaf(external(interactive::interactive))] interactive::Interactive),
}

impl Commands {
    async fn handle(self, client: animedex_catalog::Client, config: Config) -> Result<()> {
        match self {
            Commands::Browse(args) => args.handle(client, &config).await?,
            Commands::Show(args) => args.handle(client, &config).await?,
            Commands::Genres(args) => args.handle(client, &config).await?,
            Commands::Interactive(args) => args.handle(client, &config).await?,
        }
        Ok(())
    }
}
