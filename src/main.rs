use clap::Parser;
use scheme_crawl::config::OutputConfig;
use scheme_crawl::error::StoreError;
use scheme_crawl::store;
use scheme_crawl::{CrawlConfig, CrawlState, Crawler, ItemDetail, ItemSummary, ListingOutcome, UrlPatterns, WebDriverPage};
use std::error::Error;
use std::path::Path;

mod args;
use args::{Args, Command, CrawlArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CrawlConfig::from_file(path)?,
        None => CrawlConfig::default(),
    };

    // Override the WebDriver URL with an environment variable if provided
    if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
        if !webdriver_url.is_empty() {
            config.webdriver_url = webdriver_url;
        }
    }

    match args.command {
        Command::Crawl(crawl_args) => crawl(config, &crawl_args).await,
        Command::Retry { failed, details } => {
            let failed = failed.unwrap_or_else(|| config.output.failed_path());
            let details = details.unwrap_or_else(|| config.output.details_path());
            retry(config, &failed, &details).await
        }
        Command::Missing {
            links,
            details,
            out,
        } => missing(&links, &details, &out),
        Command::Dedup { input, output } => dedup(&input, &output),
    }
}

async fn open_crawler(config: CrawlConfig) -> Result<Crawler<WebDriverPage>, Box<dyn Error>> {
    println!("Note: crawling requires a WebDriver server (e.g., ChromeDriver).");
    println!("Set WEBDRIVER_URL environment variable if not using {}", config.webdriver_url);

    let patterns = UrlPatterns::new(&config)?;
    let page = WebDriverPage::connect(&config.webdriver_url, config.headless).await?;
    let crawler = Crawler::new(page, config, patterns);

    // Ctrl-C finishes the current page or item, then saves what was collected;
    // a second Ctrl-C aborts without saving
    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if stop.interrupt() {
                ::log::error!("Interrupted again, aborting");
                std::process::exit(130);
            }
            ::log::warn!("Interrupted, stopping after the current page (press Ctrl-C again to abort)");
        }
    });

    Ok(crawler)
}

async fn close_crawler(crawler: Crawler<WebDriverPage>) {
    if let Err(e) = crawler.into_page().close().await {
        ::log::warn!("Failed to close the browser session: {}", e);
    }
}

async fn crawl(mut config: CrawlConfig, overrides: &CrawlArgs) -> Result<(), Box<dyn Error>> {
    overrides.apply(&mut config);
    let output = config.output.clone();
    let checkpoint_every = config.checkpoint_every;
    let listings = config
        .categories
        .iter()
        .map(|category| config.listing_url(category))
        .collect::<Result<Vec<_>, _>>()?;

    let start_time = std::time::Instant::now();
    let mut crawler = open_crawler(config).await?;
    let mut state = CrawlState::new();

    for listing in &listings {
        let outcome = crawler.collect_listing(&mut state, listing).await;
        ::log::info!("Listing {} finished: {:?}", listing, outcome);
        if outcome == ListingOutcome::Cancelled {
            break;
        }
    }

    ::log::info!("Collected {} unique item links", state.summaries.len());
    if let Err(e) = store::save_json(&output.links_path(), &state.summaries) {
        close_crawler(crawler).await;
        return Err(e.into());
    }

    crawler
        .collect_details(&mut state, |state| {
            let processed = state.details.len() + state.failed.len();
            if checkpoint_every > 0 && processed % checkpoint_every == 0 {
                ::log::info!("Checkpoint after {} items", processed);
                if let Err(e) = save_results(&output, &state.details, &state.failed) {
                    ::log::error!("Checkpoint failed: {}", e);
                }
            }
        })
        .await;
    close_crawler(crawler).await;

    save_results(&output, &state.details, &state.failed)?;
    ::log::info!(
        "Crawl complete: {} extracted, {} failed in {:.2} seconds",
        state.details.len(),
        state.failed.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

async fn retry(config: CrawlConfig, failed_path: &Path, details_path: &Path) -> Result<(), Box<dyn Error>> {
    let failed: Vec<ItemSummary> = store::load_json(failed_path)?;
    let existing: Vec<ItemDetail> = if details_path.exists() {
        store::load_json(details_path)?
    } else {
        Vec::new()
    };
    ::log::info!(
        "Retrying {} failed items ({} already extracted)",
        failed.len(),
        existing.len()
    );

    let mut crawler = open_crawler(config).await?;
    let state = crawler.retry_failed(failed, existing).await;
    close_crawler(crawler).await;

    store::save_json(details_path, &state.details)?;
    store::save_json(failed_path, &state.failed)?;
    Ok(())
}

fn missing(links: &Path, details: &Path, out: &Path) -> Result<(), Box<dyn Error>> {
    let summaries: Vec<ItemSummary> = store::load_json(links)?;
    let details: Vec<ItemDetail> = store::load_json(details)?;

    let missing = store::missing_items(&summaries, &details);
    ::log::info!(
        "{} of {} links have no details",
        missing.len(),
        summaries.len()
    );
    store::save_json(out, &missing)?;
    Ok(())
}

fn dedup(input: &Path, output: &Path) -> Result<(), Box<dyn Error>> {
    let items: Vec<ItemSummary> = store::load_json(input)?;
    let before = items.len();

    let unique = store::dedup_by_link(items);
    ::log::info!(
        "Removed {} duplicates, {} unique links remain",
        before - unique.len(),
        unique.len()
    );
    store::save_json(output, &unique)?;
    Ok(())
}

fn save_results(output: &OutputConfig, details: &[ItemDetail], failed: &[ItemSummary]) -> Result<(), StoreError> {
    store::save_json(&output.details_path(), details)?;
    store::save_json(&output.failed_path(), failed)
}
