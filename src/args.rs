use clap::{Args as ClapArgs, Parser, Subcommand};
use scheme_crawl::CrawlConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scheme-crawl")]
#[command(about = "Crawls a paginated scheme catalog into a JSON dataset")]
#[command(version)]
pub struct Args {
    /// JSON config file; every field is optional
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect links from every category listing, then extract each item
    Crawl(CrawlArgs),

    /// Re-extract the items of a failure list and merge them into the details
    Retry {
        /// Failure list to retry (default: the configured failures file)
        #[arg(long)]
        failed: Option<PathBuf>,

        /// Details file to merge into (default: the configured details file)
        #[arg(long)]
        details: Option<PathBuf>,
    },

    /// Write the links that have no details yet as a failure list
    Missing {
        #[arg(long)]
        links: PathBuf,

        #[arg(long)]
        details: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Remove duplicate links from a links file, keeping the first
    Dedup { input: PathBuf, output: PathBuf },
}

#[derive(ClapArgs, Debug)]
pub struct CrawlArgs {
    /// Highest listing page to visit per category
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Category to crawl; repeat for several
    #[arg(long = "category")]
    pub categories: Vec<String>,

    #[arg(long)]
    pub webdriver_url: Option<String>,

    #[arg(long)]
    pub headless: bool,

    /// Directory the dataset files are written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl CrawlArgs {
    /// Apply command-line overrides on top of the file config
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if !self.categories.is_empty() {
            config.categories = self.categories.clone();
        }
        if let Some(url) = &self.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if self.headless {
            config.headless = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
    }
}
