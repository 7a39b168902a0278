use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::settings::Config;
use configuration::{DEFAULT_CONFIG_FILE, LogFormat};
use database::{DbRepository, InMemoryStore, LedgerStore, connect, run_migrations};
use importer::{ImportKind, ImportReconciler, NormalizedRow, RowPreview, read_sheet};
use indicatif::ProgressStyle;
use reporting::{LedgerReporter, export_investments};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::Instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

mod logging;

/// The main entry point for the stock ledger.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry DATABASE_URL and LEDGER__* overrides; it is optional.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = configuration::load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config))?;
    let _log_guard = logging::init(&config.logging, cli.log_format.unwrap_or(config.logging.format))?;

    let store = open_store(cli.memory).await?;
    run(cli.command, store.as_ref(), &config).await
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Imports, reports on and exports a personal stock investment ledger.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file. A missing file means all defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Use a throwaway in-memory store instead of PostgreSQL.
    #[arg(long, global = true)]
    memory: bool,

    /// Console log style; overrides `logging.format`.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import investment rows from a spreadsheet.
    ImportInvestments(ImportArgs),
    /// Import dividend rows from a spreadsheet.
    ImportDividends(ImportArgs),
    /// Total cost of every open position.
    TotalCost,
    /// Realized profit, overall or for one stock.
    TotalProfit(StockFilter),
    /// Dividend income received, overall or for one stock.
    TotalDividend(StockFilter),
    /// Per-stock aggregates.
    Summary,
    /// Write every investment record to a CSV file.
    Export {
        /// Destination file.
        output: PathBuf,
    },
    /// Delete a stock and all of its investment and dividend records.
    DeleteStock {
        name: String,
    },
}

#[derive(Args)]
struct ImportArgs {
    /// The .xlsx/.xls/.ods workbook or .csv file to read.
    file: PathBuf,

    /// Show how the first rows would be read, without writing anything.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct StockFilter {
    /// Limit the total to this stock name.
    #[arg(long)]
    stock: Option<String>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn open_store(memory: bool) -> anyhow::Result<Box<dyn LedgerStore>> {
    if memory {
        tracing::info!("Using the in-memory store; nothing will be persisted.");
        return Ok(Box::new(InMemoryStore::new()));
    }
    let pool = connect().await.context("Failed to connect to the database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(Box::new(DbRepository::new(pool)))
}

async fn run(command: Commands, store: &dyn LedgerStore, config: &Config) -> anyhow::Result<()> {
    let reporter = LedgerReporter::new(store);
    match command {
        Commands::ImportInvestments(args) => {
            handle_import(args, ImportKind::Investments, store, config).await?
        }
        Commands::ImportDividends(args) => {
            handle_import(args, ImportKind::Dividends, store, config).await?
        }
        Commands::TotalCost => {
            println!("Total cost in stock: {}", money(reporter.total_cost_in_stock().await?));
        }
        Commands::TotalProfit(filter) => {
            let total = reporter.total_profit(filter.stock.as_deref()).await?;
            println!("Total profit{}: {}", scope(&filter), money(total));
        }
        Commands::TotalDividend(filter) => {
            let total = reporter.total_dividend(filter.stock.as_deref()).await?;
            println!("Total dividend{}: {}", scope(&filter), money(total));
        }
        Commands::Summary => print_summary(&reporter).await?,
        Commands::Export { output } => {
            let file = std::fs::File::create(&output)
                .with_context(|| format!("Failed to create '{}'", output.display()))?;
            let written = export_investments(store, &config.columns.investments, file).await?;
            println!("Exported {written} investment records to {}", output.display());
        }
        Commands::DeleteStock { name } => {
            if store.delete_stock(name.trim()).await? {
                println!("Deleted stock '{name}' and its records.");
            } else {
                println!("No stock named '{name}'.");
            }
        }
    }
    Ok(())
}

async fn handle_import(
    args: ImportArgs,
    kind: ImportKind,
    store: &dyn LedgerStore,
    config: &Config,
) -> anyhow::Result<()> {
    let sheet = read_sheet(&args.file, kind.sheet_index(&config.import))
        .with_context(|| format!("Failed to read {kind} from '{}'", args.file.display()))?;
    let reconciler = ImportReconciler::new(store, &config.import, &config.columns);

    if args.dry_run {
        let previews = reconciler.preview(&sheet, kind, config.import.preview_rows);
        println!("{}", preview_table(&previews, kind, config));
        println!(
            "Dry run: showing {} of {} rows; nothing was written.",
            previews.len(),
            sheet.rows.len()
        );
        return Ok(());
    }

    let span = tracing::info_span!("import", %kind);
    span.pb_set_style(
        &ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    span.pb_set_length(sheet.rows.len() as u64);
    let progress = span.clone();
    let summary = reconciler
        .run_with(&sheet, kind, |_, _| progress.pb_inc(1))
        .instrument(span)
        .await;

    for report in &summary.reports {
        println!("{report}");
    }
    println!("{summary}");
    Ok(())
}

fn preview_table(previews: &[RowPreview], kind: ImportKind, config: &Config) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    match kind {
        ImportKind::Investments => {
            let c = &config.columns.investments;
            table.set_header(vec![
                "Line",
                c.transaction_id.as_str(),
                c.transaction_type.as_str(),
                c.stock_name.as_str(),
                c.buy_date.as_str(),
                c.total_cost.as_str(),
                c.sell_date.as_str(),
                c.sell_amount.as_str(),
                "Status",
            ]);
        }
        ImportKind::Dividends => {
            let c = &config.columns.dividends;
            table.set_header(vec![
                "Line",
                c.stock_name.as_str(),
                c.payout_date.as_str(),
                c.dividend_per_share.as_str(),
                c.actual_income.as_str(),
                "Status",
            ]);
        }
    }

    for preview in previews {
        let line = (preview.index + 2).to_string();
        let cells: Vec<String> = match &preview.row {
            Ok(NormalizedRow::Investment(row)) => vec![
                line,
                row.transaction_id.clone(),
                show(row.patch.transaction_type),
                row.stock_name.clone(),
                show(row.patch.buy_date),
                show(row.patch.total_cost),
                show(row.patch.sell_date),
                show(row.patch.sell_amount),
                "ok".to_string(),
            ],
            Ok(NormalizedRow::Dividend(row)) => vec![
                line,
                row.stock_name.clone(),
                row.payout_date.to_string(),
                show(row.patch.dividend_per_share),
                show(row.patch.actual_income),
                "ok".to_string(),
            ],
            Err(reason) => {
                let width = match kind {
                    ImportKind::Investments => 8,
                    ImportKind::Dividends => 5,
                };
                let mut cells = vec![String::new(); width];
                cells[0] = line;
                cells.push(format!("skip: {reason}"));
                cells
            }
        };
        table.add_row(cells);
    }
    table
}

async fn print_summary(reporter: &LedgerReporter<'_>) -> anyhow::Result<()> {
    let summaries = reporter.stock_summaries().await?;
    if summaries.is_empty() {
        println!("The ledger is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Stock",
        "Open cost",
        "Realized profit",
        "Dividends",
        "Open",
        "Closed",
    ]);
    for s in &summaries {
        table.add_row(vec![
            s.name.clone(),
            money(s.open_cost),
            money(s.realized_profit),
            money(s.dividend_income),
            s.open_positions.to_string(),
            s.closed_positions.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn scope(filter: &StockFilter) -> String {
    match &filter.stock {
        Some(stock) => format!(" for {}", stock.trim()),
        None => String::new(),
    }
}
