use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use watdocs::config::EnhancerConfig;
use watdocs::editor::extract_text;
use watdocs::lsp::loader::{check_asset, AssetFetcher, AssetKind};
use watdocs::page::{Discoverer, Page, StaticPage};

#[derive(Parser)]
#[command(name = "watdocs", about = "Live WAT editors for documentation pages.")]
struct Cli {
    /// Config file (defaults to .watdocs/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the blocks that would become live editors
    Scan {
        /// Documentation source directory
        docs_dir: PathBuf,
        /// Only report blocks that define a whole module
        #[arg(long)]
        modules_only: bool,
    },
    /// Print the effective configuration
    Config,
    /// Fetch and validate the language-server assets
    CheckAssets,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("watdocs=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EnhancerConfig::load_from(path)?,
        None => EnhancerConfig::load(),
    };

    match cli.command {
        Command::Scan {
            docs_dir,
            modules_only,
        } => scan(&config, &docs_dir, modules_only),
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Command::CheckAssets => check_assets(&config).await,
    }
}

fn scan(config: &EnhancerConfig, docs_dir: &Path, modules_only: bool) -> Result<()> {
    let mut files = Vec::new();
    for ext in ["md", "mdx"] {
        let pattern = format!("{}/**/*.{ext}", docs_dir.display());
        for entry in glob::glob(&pattern).context("bad docs directory pattern")? {
            files.push(entry?);
        }
    }
    files.sort();
    info!("scanning {} file(s) under {}", files.len(), docs_dir.display());

    let mut discoverer = Discoverer::new(&config.language, &config.aliases);
    let (mut total, mut skipped) = (0, 0);

    for file in &files {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let page = StaticPage::from_markdown(route_of(docs_dir, file), &source);
        let diagnostics = if config.diagnostics_enabled_for(page.path()) {
            ""
        } else {
            "  (no diagnostics)"
        };

        for block in discoverer.discover(&page) {
            let line = block.source_line.unwrap_or(0);
            let Some(text) = extract_text(&block) else {
                println!("{}:{line}  skipped (empty)", file.display());
                skipped += 1;
                continue;
            };
            let is_module = text.trim_start().starts_with("(module");
            if modules_only && !is_module {
                continue;
            }
            println!(
                "{}:{line}  {} lines{}{diagnostics}",
                file.display(),
                text.split('\n').count(),
                if is_module { " [module]" } else { "" }
            );
            total += 1;
        }
    }

    println!("{total} editor(s), {skipped} skipped");
    Ok(())
}

/// Site route of a docs source file: `guides/intro.md` → `/guides/intro/`.
fn route_of(docs_dir: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(docs_dir).unwrap_or(file).with_extension("");
    let mut route = String::from("/");
    for part in relative.iter() {
        let part = part.to_string_lossy();
        if part == "index" {
            continue;
        }
        route.push_str(&part);
        route.push('/');
    }
    route
}

async fn check_assets(config: &EnhancerConfig) -> Result<()> {
    let fetcher = AssetFetcher::new(config.assets.public_dir.clone());
    let mut failed = 0;
    for kind in AssetKind::ALL {
        let location = config.assets.location(kind);
        match check_asset(&fetcher, &config.assets, kind).await {
            Ok(size) => println!("ok      {:<20} {location} ({size} bytes)", kind.name()),
            Err(e) => {
                println!("failed  {:<20} {e}", kind.name());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} asset(s) failed validation");
    }
    Ok(())
}
