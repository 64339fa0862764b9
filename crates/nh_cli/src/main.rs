use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use nh_core::{Candidate, SourceFeed, TextGenerator, Topic};
use nh_inference::models::DummyModel;
use nh_inference::{create_model, ModelConfig};
use nh_ingest::{
    handle_command, init_logging, CommandContext, FeedConfig, ImageScreener, IngestArgs,
    IngestCommands, IngestConfig, IngestionPipeline, NewsDataClient, ScreenConfig,
};
use tracing::{error, info};

#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    /// `1h15m30s` style durations; a trailing bare number is seconds.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let overflow = || format!("Duration too long: {}", s);
        let mut total: u64 = 0;
        let mut pending: Option<u64> = None;

        for c in s.chars().filter(|c| !c.is_whitespace()) {
            if let Some(digit) = c.to_digit(10) {
                let value = pending
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u64::from(digit)))
                    .ok_or_else(overflow)?;
                pending = Some(value);
                continue;
            }

            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ if pending.is_some() => return Err(format!("Invalid duration unit: {}", c)),
                _ => return Err(format!("Invalid character in duration: {}", c)),
            };
            let value = pending.take().ok_or_else(|| format!("Missing number before {}", c))?;
            total = value
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(overflow)?;
        }

        if let Some(secs) = pending {
            total = total.checked_add(secs).ok_or_else(overflow)?;
        }
        if total == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch, rewrite and publish news articles", long_about = None)]
pub struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, env = "NH_STORAGE", default_value = "memory")]
    storage: String,
    /// Connection URL or file path for the storage backend
    #[arg(long, env = "NH_DATABASE_URL")]
    database_url: Option<String>,
    /// Text generation backend: openai or dummy
    #[arg(long, env = "NH_MODEL", default_value = "openai")]
    model: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,
    #[arg(long, env = "OPENAI_MODEL")]
    openai_model: Option<String>,
    #[arg(long, env = "NEWSDATA_API_KEY", hide_env_values = true)]
    newsdata_api_key: Option<String>,
    /// Comma separated topics to ingest
    #[arg(long, env = "NH_TOPICS", value_delimiter = ',', default_value = "world,technology,economics")]
    topics: Vec<Topic>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the ingestion pipeline
    Ingest {
        #[command(subcommand)]
        command: Option<IngestMode>,
    },
    /// List the configured topics
    Topics,
    /// Article totals per topic
    Stats,
    /// Newest articles, optionally for one topic
    Latest {
        #[arg(long)]
        topic: Option<Topic>,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = 10)]
        per_page: u64,
    },
    /// One article by topic and slug
    Show { topic: Topic, slug: String },
}

#[derive(clap::Subcommand, Debug)]
enum IngestMode {
    /// Ingest once and exit
    Run,
    /// Ingest now and then again after every interval (e.g. 1h, 30m, 1h15m30s)
    Watch {
        #[arg(long, default_value = "1h")]
        interval: HumanDuration,
    },
}

impl Cli {
    fn model_config(&self) -> ModelConfig {
        let defaults = ModelConfig::default();
        ModelConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone().unwrap_or(defaults.base_url),
            model_name: self.openai_model.clone().unwrap_or(defaults.model_name),
            ..defaults
        }
    }

    /// Feed and text generator for the chosen command. Read-only commands
    /// never call either, so they need no API keys.
    fn services(&self) -> anyhow::Result<(Arc<dyn SourceFeed>, Arc<dyn TextGenerator>)> {
        if !matches!(self.command, Commands::Ingest { .. }) {
            return Ok((Arc::new(NoFeed), Arc::new(DummyModel)));
        }
        let feed = NewsDataClient::new(self.feed_config()).context("Failed to configure the news feed")?;
        let model = create_model(&self.model, &self.model_config()).context("Failed to create text generator")?;
        Ok((Arc::new(feed), model))
    }

    fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            api_key: self.newsdata_api_key.clone(),
            topics: self.topics.clone(),
            ..FeedConfig::default()
        }
    }
}

/// Feed used when no NewsData key is configured, so read-only commands still work.
struct NoFeed;

#[async_trait]
impl SourceFeed for NoFeed {
    fn source_name(&self) -> &str {
        "none"
    }

    async fn fetch(&self, _topic: &Topic) -> Vec<Candidate> {
        Vec::new()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    let storage = nh_storage::create_storage(&cli.storage, cli.database_url.as_deref())
        .await
        .context("Failed to open storage")?;

    let (feed, model) = cli.services()?;

    let screener = ImageScreener::new(storage.images.clone(), &ScreenConfig::default())
        .context("Failed to create image screener")?;

    let config = IngestConfig {
        topics: cli.topics.clone(),
    };
    let pipeline = Arc::new(IngestionPipeline::new(
        &config,
        feed,
        storage.articles.clone(),
        Arc::new(screener),
        model,
    ));
    let ctx = CommandContext {
        pipeline,
        store: storage.articles.clone(),
    };

    let command = match cli.command {
        Commands::Ingest { command } => match command.unwrap_or(IngestMode::Run) {
            IngestMode::Run => IngestCommands::Run,
            IngestMode::Watch { interval } => return watch(&ctx, interval.0).await,
        },
        Commands::Topics => IngestCommands::Topics,
        Commands::Stats => IngestCommands::Stats,
        Commands::Latest { topic, page, per_page } => IngestCommands::Latest { topic, page, per_page },
        Commands::Show { topic, slug } => IngestCommands::Show { topic, slug },
    };

    handle_command(IngestArgs { command }, &ctx).await?;
    Ok(())
}

async fn watch(ctx: &CommandContext, interval: Duration) -> anyhow::Result<()> {
    info!("⏰ Running in periodic mode every {}s", interval.as_secs());
    loop {
        info!("🔄 Starting ingestion cycle");
        let args = IngestArgs {
            command: IngestCommands::Run,
        };
        if let Err(e) = handle_command(args, ctx).await {
            error!("💥 Ingestion cycle failed: {}", e);
        }
        info!("😴 Waiting {}s before next cycle", interval.as_secs());
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration() {
        assert_eq!(HumanDuration::from_str("1h").unwrap().0, Duration::from_secs(3600));
        assert_eq!(HumanDuration::from_str("30m").unwrap().0, Duration::from_secs(1800));
        assert_eq!(HumanDuration::from_str("1h15m30s").unwrap().0, Duration::from_secs(4530));
        assert_eq!(HumanDuration::from_str("1d").unwrap().0, Duration::from_secs(86400));
        assert_eq!(HumanDuration::from_str("90").unwrap().0, Duration::from_secs(90));
    }

    #[test]
    fn test_human_duration_rejects_garbage() {
        assert!(HumanDuration::from_str("").is_err());
        assert!(HumanDuration::from_str("1w").is_err());
        assert!(HumanDuration::from_str("abc").is_err());
        assert!(HumanDuration::from_str("0s").is_err());
        assert!(HumanDuration::from_str("h").is_err());
        assert!(HumanDuration::from_str("99999999999999999999d").is_err());
        assert!(HumanDuration::from_str("999999999999999999h").is_err());
        assert!(HumanDuration::from_str("18446744073709551615s1s").is_err());
    }

    #[test]
    fn test_cli_parses_topics_and_commands() {
        let cli = Cli::try_parse_from(["nh", "--topics", "world,sports", "latest", "--topic", "sports", "--page", "2"])
            .unwrap();
        assert_eq!(cli.topics, vec![Topic::new("world").unwrap(), Topic::new("sports").unwrap()]);
        match cli.command {
            Commands::Latest { topic, page, per_page } => {
                assert_eq!(topic, Some(Topic::new("sports").unwrap()));
                assert_eq!(page, 2);
                assert_eq!(per_page, 10);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["nh", "ingest", "watch", "--interval", "30m"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ingest { command: Some(IngestMode::Watch { ref interval }) } if interval.0 == Duration::from_secs(1800)
        ));
    }

    #[test]
    fn test_read_commands_need_no_api_keys() {
        let cli = Cli::try_parse_from(["nh", "--model", "openai", "stats"]).unwrap();
        let (feed, model) = cli.services().unwrap();
        assert_eq!(feed.source_name(), "none");
        assert_eq!(model.name(), "Dummy");
    }

    #[test]
    fn test_ingest_builds_configured_services() {
        let cli = Cli::try_parse_from(["nh", "--model", "dummy", "--newsdata-api-key", "key", "ingest", "run"]).unwrap();
        let (feed, model) = cli.services().unwrap();
        assert_eq!(feed.source_name(), "NewsData");
        assert_eq!(model.name(), "Dummy");

        let cli = Cli::try_parse_from(["nh", "--model", "gpt-x", "--newsdata-api-key", "key", "ingest"]).unwrap();
        assert!(cli.services().is_err());
    }
}
