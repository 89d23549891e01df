mod config;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use config::{AppConfig, RuleSource};
use mailrule_domain::RecordStore;
use mailrule_error::{ErrorResponse, MailError};
use mailrule_google::GmailAdapter;
use mailrule_rules::format::{format_batch, format_records, format_rule_check, format_sync, Format};
use mailrule_rules::{load_rules, validate, RuleService};
use mailrule_sqlite::SqliteStore;
use tracing::{error, info, warn};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mailrule=info")),
        )
        .compact()
        .init();
}

struct Args {
    command: String,
    path: Option<PathBuf>,
    format: Format,
}

fn parse_args(raw: &[String]) -> Result<Args, MailError> {
    let mut positional = Vec::new();
    let mut format = None;

    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            format = Some(value.to_string());
        } else if arg == "--format" {
            let value = iter
                .next()
                .ok_or_else(|| MailError::invalid_input("--format needs a value"))?;
            format = Some(value.clone());
        } else {
            positional.push(arg.clone());
        }
    }

    let mut positional = positional.into_iter();
    Ok(Args {
        command: positional.next().unwrap_or_else(|| "run".to_string()),
        path: positional.next().map(PathBuf::from),
        format: Format::parse(format.as_deref())?,
    })
}

async fn build_service(config: &AppConfig) -> Result<RuleService, MailError> {
    let gmail = GmailAdapter::new(config.gmail()?);
    let store = SqliteStore::open(&config.db_path).await?;
    info!(db = %config.db_path.display(), "service ready");
    Ok(RuleService::new(
        Arc::new(gmail),
        Arc::new(store),
        config.settings(),
    ))
}

async fn with_service<F, Fut>(config: &AppConfig, f: F) -> Result<String, MailError>
where
    F: FnOnce(Arc<RuleService>) -> Fut,
    Fut: std::future::Future<Output = Result<String, MailError>>,
{
    let service = Arc::new(build_service(config).await?);
    let result = f(service.clone()).await;
    if let Err(e) = service.shutdown().await {
        warn!(error = %e, "shutdown failed");
    }
    result
}

async fn run_command(args: Args) -> Result<(), MailError> {
    let fmt = args.format;

    let output = match args.command.as_str() {
        "run" => {
            let config = AppConfig::from_env()?;
            let rules = load_rules(&config.rules_path, &config.default_label)?;
            with_service(&config, |service| async move {
                let report = service.run(&rules).await?;
                Ok::<_, MailError>(format_batch(&report, fmt))
            })
            .await?
        }
        "sync" => {
            let config = AppConfig::from_env()?;
            with_service(&config, |service| async move {
                let report = service.sync_inbox().await?;
                Ok::<_, MailError>(format_sync(&report, fmt))
            })
            .await?
        }
        "apply" => {
            let config = AppConfig::from_env()?;
            let rules = load_rules(&config.rules_path, &config.default_label)?;
            with_service(&config, |service| async move {
                let report = service.process_stored(&rules).await?;
                Ok::<_, MailError>(format_batch(&report, fmt))
            })
            .await?
        }
        "list" => {
            let config = AppConfig::from_env()?;
            let store = SqliteStore::open(&config.db_path).await?;
            let records = store.fetch_all().await;
            store.close().await?;
            format_records(&records?, fmt)
        }
        "check" => {
            let source = RuleSource::from_env();
            let path = args.path.unwrap_or(source.path);
            let rules = load_rules(&path, &source.default_label)?;
            format_rule_check(&rules, &validate(&rules), fmt)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return Ok(());
        }
        unknown => {
            return Err(MailError::invalid_input(format!(
                "unknown command: {unknown} (run `mailrule help` for usage)"
            )))
        }
    };

    println!("{output}");
    Ok(())
}

fn print_usage() {
    eprintln!("mailrule: apply JSON rules to a Gmail inbox");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  mailrule [run]          Sync the inbox, then apply rules to stored mail");
    eprintln!("  mailrule sync           Copy the newest inbox messages into the store");
    eprintln!("  mailrule apply          Apply rules to stored mail without syncing");
    eprintln!("  mailrule list           Print stored mail");
    eprintln!("  mailrule check [path]   Validate a rule file offline");
    eprintln!("  mailrule help           Show this help");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --format <compact|expanded|full>   Output style (full is JSON)");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  GMAIL_ADDRESS            Gmail address");
    eprintln!("  GMAIL_APP_PASSWORD       Gmail app password");
    eprintln!("  MAILRULE_RULES           Rule file (default: rules.json)");
    eprintln!("  MAILRULE_DATA_DIR        Data directory (default: ~/.mailrule)");
    eprintln!("  MAILRULE_DB              Database path (default: <data dir>/emails.db)");
    eprintln!("  MAILRULE_LABEL           Label for a bare \"move\" action (default: Processed)");
    eprintln!("  MAILRULE_FETCH_LIMIT     Inbox messages per sync (default: 10)");
    eprintln!("  MAILRULE_ON_DATE_ERROR   skip or abort on unparseable dates (default: skip)");
    eprintln!("  RUST_LOG                 Log level (default: mailrule=info)");
}

#[tokio::main]
async fn main() {
    init_tracing();

    let raw: Vec<String> = env::args().skip(1).collect();
    let result = match parse_args(&raw) {
        Ok(args) => run_command(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(%e, "fatal error");
        eprintln!("{}", ErrorResponse::from(&e).to_compact());
        std::process::exit(1);
    }
}
