use std::sync::Arc;

use clap::{Args, Subcommand};
use nh_core::{ArticleStore, Error, Result, Topic};
use nh_storage::collect_stats;
use serde_json::json;

use crate::pipeline::IngestionPipeline;

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(subcommand)]
    pub command: IngestCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum IngestCommands {
    /// Fetch, process and store new articles for every configured topic once
    Run,
    /// List the configured topics
    Topics,
    /// Article totals per topic and the time of the latest update
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

pub struct CommandContext {
    pub pipeline: Arc<IngestionPipeline>,
    pub store: Arc<dyn ArticleStore>,
}

pub async fn handle_command(args: IngestArgs, ctx: &CommandContext) -> Result<()> {
    let output = render(args.command, ctx).await?;
    println!("{}", output);
    Ok(())
}

/// JSON output for a command.
pub async fn render(command: IngestCommands, ctx: &CommandContext) -> Result<String> {
    let value = match command {
        IngestCommands::Run => {
            let report = ctx.pipeline.run().await;
            json!({
                "stats": report.stats,
                "paths": report.articles.iter().map(|a| a.path.as_str()).collect::<Vec<_>>(),
            })
        }
        IngestCommands::Topics => json!(ctx.pipeline.topics()),
        IngestCommands::Stats => {
            serde_json::to_value(collect_stats(ctx.store.as_ref(), ctx.pipeline.topics()).await?)?
        }
        IngestCommands::Latest { topic, page, per_page } => {
            let page = ctx.store.find_latest(topic.as_ref(), page, per_page).await?;
            json!({
                "data": page.items,
                "pagination": {
                    "current_page": page.page,
                    "total_pages": page.total_pages(),
                    "total_articles": page.total,
                },
            })
        }
        IngestCommands::Show { topic, slug } => match ctx.store.find_one(&topic, &slug).await? {
            Some(article) => serde_json::to_value(article)?,
            None => {
                return Err(Error::NotFound(format!("/{}/{}", topic, slug)));
            }
        },
    };

    Ok(serde_json::to_string_pretty(&value)?)
}
