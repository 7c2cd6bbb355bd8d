use clap::Parser;
use common::ScraperConfig;
use hackngrabber::extraction::{extract_stories, PageLayout};
use hackngrabber::fetching::Fetcher;
use hackngrabber::poller::stories_from_items;

/// Fetch the front page once and print what would be stored. Writes nothing.
#[derive(Parser, Debug)]
#[command(name = "scrape_once")]
struct Args {
    /// Page to scrape (defaults to the configured source)
    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    container: Option<String>,

    #[arg(long)]
    link: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let defaults = ScraperConfig::default();
    let url = args.url.unwrap_or(defaults.source_url);
    let container = args.container.unwrap_or(defaults.container_selector);
    let link = args.link.unwrap_or(defaults.link_selector);

    println!("\n{}", "=".repeat(60));
    println!("Scraping: {}", url);
    println!("{}", "=".repeat(60));

    let fetcher = Fetcher::new(defaults.fetch_timeout_seconds, &defaults.user_agent)?;
    let layout = PageLayout::new(&container, &link)?;

    let html = match fetcher.fetch(&url).await {
        Ok(html) => html,
        Err(e) => {
            println!("✗ Fetch failed: {}", e);
            return Err(e.into());
        }
    };

    match extract_stories(&html, &layout, defaults.max_items) {
        Ok(items) => {
            println!("✓ {} stories", items.len());
            let stories = stories_from_items(items, chrono::Utc::now().timestamp());
            for (i, story) in stories.iter().enumerate() {
                println!("  {:>2}. [{:>11}] {}", i + 1, story.id, story.title);
                println!("      {}", story.url);
            }
            Ok(())
        }
        Err(e) => {
            println!("✗ Extraction failed: {}", e);
            Err(e.into())
        }
    }
}
