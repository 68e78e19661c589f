use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🎬 Keep the movie search index in sync with the content database.
#[derive(Debug, Parser)]
#[command(name = "cinedex-cli", version, about)]
struct Args {
    /// TOML config file. Defaults to `cinedex.toml` when that file exists; otherwise
    /// configuration comes from CINEDEX_* environment variables only.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one pass and exit. Non-zero exit status if any entity failed.
    #[arg(long)]
    once: bool,
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let exists = path.try_exists().context(format!(
                "💀 Couldn't check whether the config file exists. Was checking here: '{}'",
                path.display()
            ))?;
            if !exists {
                bail!(
                    "💀 Config file '{}' does not exist. Relative paths are relative to the working directory; an absolute path removes the guesswork.",
                    path.display()
                );
            }
            Ok(Some(path))
        }
        None => {
            let fallback = PathBuf::from("cinedex.toml");
            // 🔧 the ol' reliable, if it's there
            Ok(fallback.try_exists().unwrap_or(false).then_some(fallback))
        }
    }
}

async fn sync(args: Args) -> Result<()> {
    let config_path = resolve_config_path(args.config)?;
    let app_config = cinedex::app_config::load_config(config_path.as_deref())
        .context("💀 Couldn't load the configuration. Check the file and the CINEDEX_* variables.")?;

    if args.once {
        let report = cinedex::run_once(app_config).await?;
        if !report.is_success() {
            bail!(
                "💀 The pass finished, but these pipelines failed: {:?}",
                report.failed_entities()
            );
        }
        info!("✅ One pass, {} documents. See you next cron.", report.documents_loaded());
        return Ok(());
    }

    let (doorbell, shutdown) = async_channel::bounded::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received. Finishing the current pass, then stopping.");
        }
        doorbell.close();
    });

    cinedex::run(app_config, shutdown).await
}

/// 📞 Phrases that mean a backend never picked up, from reqwest (Elasticsearch), sqlx
/// (Postgres) and our own retry loop, which says so once it gives up on connecting.
const NOBODY_ANSWERED: [&str; 8] = [
    "error sending request",
    "tcp connect error",
    "dns error",
    "connection refused",
    "pool timed out",
    "timed out connecting",
    "did not pick up",
    "ping the search cluster",
];

fn nobody_answered(cause: &str) -> bool {
    let cause = cause.to_lowercase();
    NOBODY_ANSWERED.iter().any(|phrase| cause.contains(phrase))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Err(err) = sync(args).await {
        error!("💀 error: {}", err);
        // -- 🎞️ roll the credits: every cause, in order of appearance
        let mut a_backend_left_us_on_read = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            a_backend_left_us_on_read |= nobody_answered(&cause.to_string());
        }

        // -- 📺 the movies are fine. it's the projector.
        if a_backend_left_us_on_read {
            error!(
                "🔧 hint: Postgres or Elasticsearch didn't answer. \
                Check the host and port under [store] and [index] in the config, \
                and that both services are up (`docker compose ps` if they live in Docker). \
                The next attempt starts from the saved checkpoints, so nothing is lost. 🍿"
            );
        }

        // -- 🚪 lights up, everybody out
        std::process::exit(1);
    }

    // -- ✅ that's a wrap
    Ok(())
}
