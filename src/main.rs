use anyhow::Result;
use briefmatch::client::{Model, OpenRouterClient};
use briefmatch::config::{self, Config};
use briefmatch::library::{load_library, sample_library};
use briefmatch::matcher::{find_matches, MatchOutcome, MatchQuery};
use briefmatch::record::{Record, RecordKind, FIELD_KEY_RESULTS};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "briefmatch",
    about = "Match a new marketing brief against a library of past campaigns",
    version
)]
struct Args {
    /// The new brief text (reads stdin when omitted)
    brief: Option<String>,

    /// Library file: a JSON array of campaign rows (built-in sample when omitted)
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Client budget; enables budget-aware mode (single scaled match)
    #[arg(short, long)]
    budget: Option<f64>,

    /// Target audience for the new brief
    #[arg(long, default_value = "")]
    audience: String,

    /// Preferred channels for the new brief
    #[arg(long, default_value = "")]
    channels: String,

    /// Campaign duration for the new brief
    #[arg(long, default_value = "")]
    duration: String,

    /// Model tier: fast or quality
    #[arg(short, long)]
    model: Option<String>,

    /// Configure the OpenRouter API key and exit
    #[arg(long)]
    setup: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("briefmatch=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.setup {
        config::setup_api_key_interactive().map_err(|e| anyhow::anyhow!(e))?;
        return Ok(());
    }

    let config = Config::load();
    let Some(api_key) = config.get_api_key() else {
        eprintln!("No API key configured. Run `briefmatch --setup`, or set OPENROUTER_API_KEY.");
        std::process::exit(1);
    };

    let model = args
        .model
        .as_deref()
        .or(config.model.as_deref())
        .and_then(Model::from_name)
        .unwrap_or_default();

    let library = match args.library.as_ref().or(config.library_path.as_ref()) {
        Some(path) => load_library(path)?,
        None => sample_library(),
    };

    let brief = match args.brief {
        Some(brief) => brief,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut query = MatchQuery::new(brief)
        .with_parameter("audience", args.audience)
        .with_parameter("channels", args.channels)
        .with_parameter("duration", args.duration);
    if let Some(budget) = args.budget {
        query = query.with_budget(budget);
    }

    let client = OpenRouterClient::new(api_key, model)?;
    let outcome = find_matches(&client, &library, &query).await;
    render(&outcome, &library, args.budget.is_some());

    if outcome.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

fn render(outcome: &MatchOutcome, library: &[Record], budget_aware: bool) {
    for warning in &outcome.warnings {
        eprintln!("  Warning: matched id '{}' not found in the library.", warning.id);
    }

    if let Some(message) = &outcome.error {
        eprintln!("{}", message);
        return;
    }

    let resolved = outcome.resolve(library);
    if resolved.is_empty() {
        println!("No close matches found. Time for a new idea!");
        return;
    }

    println!("Top matches");
    println!("-----------");
    for (matched, record) in resolved {
        println!();
        println!("{}", record.title());
        if record.kind == RecordKind::CaseStudy {
            let results = record.text(FIELD_KEY_RESULTS);
            if !results.is_empty() {
                println!("  Proven case study: {}", results);
            }
        }
        if !matched.explanation.is_empty() {
            println!("  Why it fits: {}", matched.explanation);
        }
        if budget_aware {
            if let Some(tier) = &matched.tier_label {
                println!("  Recommended package: {}", tier);
            }
        }
    }
}
