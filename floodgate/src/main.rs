use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::push::PushArgs;
use crate::serve::ServeArgs;

mod error;
mod push;
mod serve;

#[derive(Parser)]
#[command(name = "floodgate")]
#[command(about = "Multi-tenant log ingestion gateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion server
    Serve {
        #[clap(flatten)]
        inner: ServeArgs,
    },
    /// Push events to a running server
    Push {
        #[clap(flatten)]
        inner: PushArgs,
    },
}

#[tokio::main]
#[snafu::report]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ct = CancellationToken::new();
    let ct_clone = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct_clone.cancel();
    });

    match cli.command {
        Commands::Serve { inner } => inner.run(ct).await,
        Commands::Push { inner } => inner.run(ct).await,
    }
}
