//! CLI for Monospace - AI room redesigns with daily credits.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use monospace::{
    CostEstimateRequest, CreditLedger, CreditStatus, Currency, GeminiProvider, Identity,
    JsonFileStore, RedesignRequest, RoomDesigner, RoomStyle, Studio, DEFAULT_DAILY_LIMIT,
    STANDARD_PACKAGE,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "monospace")]
#[command(about = "Redesign rooms with Gemini, metered by daily and purchased credits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Signed-in user id (guest when omitted)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Directory holding credits.json
    #[arg(long, global = true, env = "MONOSPACE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Free redesigns per identity per day
    #[arg(long, global = true, env = "MONOSPACE_DAILY_LIMIT", default_value_t = DEFAULT_DAILY_LIMIT)]
    daily_limit: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Redesign a room photo in a given style (costs one credit)
    Redesign(RedesignArgs),

    /// Estimate what a room design would cost to build
    Estimate(EstimateArgs),

    /// Show the credit balance
    Credits,

    /// Add a purchased credit package after a confirmed payment
    Purchase(PurchaseArgs),

    /// List available styles
    Styles,

    /// Run as MCP server (for AI agent integration)
    Mcp,
}

#[derive(Args)]
struct RedesignArgs {
    /// Photo of the room
    input: PathBuf,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Target style (see `monospace styles`)
    #[arg(short, long, default_value = "minimalist")]
    style: RoomStyle,

    /// Extra requirements, e.g. "keep the piano"
    #[arg(short, long)]
    prompt: Option<String>,
}

#[derive(Args)]
struct EstimateArgs {
    /// Room image to price
    image: PathBuf,

    /// City or region whose prices to use
    #[arg(short, long)]
    location: String,

    /// Currency for all amounts
    #[arg(short, long, default_value = "USD")]
    currency: Currency,
}

#[derive(Args)]
struct PurchaseArgs {
    /// Payment id confirmed by the payment gateway
    #[arg(long)]
    payment_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let identity = Identity::from_optional(cli.user.as_deref());
    let ledger = Arc::new(open_ledger(cli.data_dir.as_ref(), cli.daily_limit)?);

    match cli.command {
        Commands::Redesign(args) => {
            let studio = Studio::new(ledger, gemini()?);
            redesign(&studio, &identity, args, cli.json).await?;
        }
        Commands::Estimate(args) => {
            let studio = Studio::new(ledger, gemini()?);
            estimate(&studio, args, cli.json).await?;
        }
        Commands::Credits => {
            print_status(&CreditStatus::of(&ledger, &identity), cli.json)?;
        }
        Commands::Purchase(args) => {
            let package = STANDARD_PACKAGE;
            let status = package.apply(&ledger, &identity, &args.payment_id)?;
            if !cli.json {
                println!(
                    "Added {} credits ({})",
                    package.credits, package.description
                );
            }
            print_status(&status, cli.json)?;
        }
        Commands::Styles => {
            list_styles(cli.json)?;
        }
        Commands::Mcp => {
            run_mcp_server(ledger).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for JSON and MCP traffic.
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("monospace=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_ledger(data_dir: Option<&PathBuf>, daily_limit: u32) -> anyhow::Result<CreditLedger> {
    let store = match data_dir {
        Some(dir) => JsonFileStore::in_dir(dir),
        None => JsonFileStore::open_default()?,
    };
    tracing::debug!(path = %store.path().display(), "using credit store");
    Ok(CreditLedger::new(Arc::new(store)).with_daily_limit(daily_limit))
}

fn gemini() -> anyhow::Result<Arc<dyn RoomDesigner>> {
    Ok(Arc::new(GeminiProvider::builder().build()?))
}

async fn redesign(
    studio: &Studio,
    identity: &Identity,
    args: RedesignArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let photo = std::fs::read(&args.input)?;
    let mut request = RedesignRequest::new(photo, args.style);
    if let Some(prompt) = args.prompt {
        request = request.with_prompt(prompt);
    }

    // Fail before a credit is spent if the image would have nowhere to go
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("cannot create output directory {}", parent.display())
            })?;
        }
    }

    let image = studio.redesign(identity, &request).await?;
    if let Err(e) = image.save(&args.output) {
        let fallback = std::env::temp_dir().join(format!(
            "monospace-{}.{}",
            chrono::Local::now().format("%Y%m%dT%H%M%S"),
            image.format.extension()
        ));
        image.save(&fallback).with_context(|| {
            format!("failed to save {} ({e})", args.output.display())
        })?;
        anyhow::bail!(
            "failed to save {} ({e}); the redesign was kept at {}",
            args.output.display(),
            fallback.display()
        );
    }
    let status = studio.credit_status(identity);

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": args.output.display().to_string(),
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "style": args.style.label(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
            "credits": status,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Redesigned room: {} ({} bytes) in {} style",
            args.output.display(),
            image.size(),
            args.style
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
        println!(
            "Credits left: {} free today, {} purchased",
            status.remaining_free, status.purchased_balance
        );
    }

    Ok(())
}

async fn estimate(studio: &Studio, args: EstimateArgs, json_output: bool) -> anyhow::Result<()> {
    let image = std::fs::read(&args.image)?;
    let request = CostEstimateRequest::new(image, &args.location).with_currency(args.currency);
    let estimate = studio.estimate_cost(&request).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        println!("{}", estimate.report(&args.location, args.currency));
    }

    Ok(())
}

fn print_status(status: &CreditStatus, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(status)?);
    } else {
        println!("Credits for {} on {}:", status.identity, status.date);
        println!(
            "  Free today: {} of {} left",
            status.remaining_free, status.daily_limit
        );
        println!("  Purchased:  {}", status.purchased_balance);
        if !status.can_generate {
            println!(
                "\nDaily limit reached. Buy {} more for {} {:.2}.",
                STANDARD_PACKAGE.credits,
                STANDARD_PACKAGE.currency,
                STANDARD_PACKAGE.price_minor as f64 / 100.0
            );
        }
    }
    Ok(())
}

fn list_styles(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct StyleInfo {
        slug: &'static str,
        label: &'static str,
    }

    let styles: Vec<StyleInfo> = RoomStyle::ALL
        .iter()
        .map(|s| StyleInfo {
            slug: s.slug(),
            label: s.label(),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&styles)?);
    } else {
        println!("Available styles:\n");
        for s in &styles {
            println!("  {:<14} {}", s.slug, s.label);
        }
    }

    Ok(())
}

async fn run_mcp_server(ledger: Arc<CreditLedger>) -> anyhow::Result<()> {
    let designer = match gemini() {
        Ok(designer) => Some(designer),
        Err(e) => {
            tracing::warn!("redesign tools disabled: {e}");
            None
        }
    };
    tracing::info!("starting MCP server");
    let mut server = monospace::mcp::McpServer::new(ledger, designer);
    server.run().await?;
    Ok(())
}
