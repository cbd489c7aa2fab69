use anyhow::Result;
use askdata::catalog::PgSchemaSource;
use askdata::config::Config;
use askdata::llm::OpenAiBackend;
use askdata::pipeline::Pipeline;
use askdata::store::PgBackend;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "askdata")]
#[command(about = "Ask natural-language questions over tabular business data")]
struct Args {
    /// The question in natural language
    question: String,

    /// Identity of the requesting user (row-filter value)
    #[arg(short, long)]
    user: String,

    /// Write the rendered chart, if any, to this PNG file
    #[arg(long)]
    chart_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    info!("askdata starting");
    info!("Question: {}", args.question);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let llm = Arc::new(OpenAiBackend::new(
        config.llm.endpoint.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));
    let schema = Arc::new(PgSchemaSource::new(pool.clone()));
    let store = Arc::new(PgBackend::new(pool));

    let pipeline = Pipeline::new(&config, llm, schema, store);
    let answer = pipeline.answer(&args.question, &args.user).await?;

    if let (Some(chart), Some(path)) = (&answer.chart, &args.chart_out) {
        std::fs::write(path, &chart.png)?;
        info!("chart written to {}", path.display());
    }

    println!("{}", answer.text);
    Ok(())
}
