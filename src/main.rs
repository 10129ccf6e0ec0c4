use agroledger::cli::{
    CheckCommand, Cli, Commands, ConfigCommand, CropCommand, DairyCommand, EntryCommand,
    InvoiceCommand, LivestockCommand, MarginCommand, ProviderCommand,
};
use agroledger::cli_handlers::{self, DairyArgs};
use agroledger::core::Ledger;
use agroledger::error::LedgerError;
use agroledger::models::{Flow, NewProvider};
use anyhow::Context;
use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let ledger = Ledger::open(&cli.db);

    if let Err(e) = open_store(&ledger, &cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }

    if let Err(e) = run(&ledger, cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Storage that cannot be opened or created is fatal for every command
fn open_store(ledger: &Ledger, command: &Commands) -> anyhow::Result<()> {
    if matches!(command, Commands::Init) {
        return Ok(());
    }
    ledger
        .initialize()
        .with_context(|| format!("cannot open database {}", ledger.store().path().display()))
}

fn run(ledger: &Ledger, command: Commands) -> Result<(), LedgerError> {
    match command {
        Commands::Init => cli_handlers::handle_init(ledger),
        Commands::Dashboard { days } => cli_handlers::handle_dashboard(ledger, days),
        Commands::Check(cmd) => match cmd {
            CheckCommand::Add {
                number,
                bank,
                amount,
                due_date,
            } => cli_handlers::handle_check_add(ledger, &number, &bank, &amount, &due_date),
            CheckCommand::List {
                pending,
                due_within,
            } => cli_handlers::handle_check_list(ledger, pending, due_within),
            CheckCommand::Pay { id } => cli_handlers::handle_check_pay(ledger, id),
            CheckCommand::Delete { id } => cli_handlers::handle_check_delete(ledger, id),
        },
        Commands::Provider(cmd) => match cmd {
            ProviderCommand::Add {
                name,
                sector,
                tax_id,
                phone,
                email,
                address,
            } => cli_handlers::handle_provider_add(
                ledger,
                NewProvider {
                    name,
                    sector,
                    tax_id,
                    phone,
                    email,
                    address,
                },
            ),
            ProviderCommand::List => cli_handlers::handle_provider_list(ledger),
            ProviderCommand::Delete { id } => cli_handlers::handle_provider_delete(ledger, id),
        },
        Commands::Invoice(cmd) => match cmd {
            InvoiceCommand::Add {
                number,
                amount,
                provider,
                date,
                desc,
            } => cli_handlers::handle_invoice_add(
                ledger,
                &number,
                &amount,
                provider,
                date.as_deref(),
                desc.as_deref(),
            ),
            InvoiceCommand::List { provider } => cli_handlers::handle_invoice_list(ledger, provider),
            InvoiceCommand::Delete { id } => cli_handlers::handle_invoice_delete(ledger, id),
            InvoiceCommand::Orphans => cli_handlers::handle_invoice_orphans(ledger),
        },
        Commands::Expense(cmd) => run_entry(ledger, Flow::Expense, cmd),
        Commands::Income(cmd) => run_entry(ledger, Flow::Income, cmd),
        Commands::Crop(cmd) => match cmd {
            CropCommand::Add {
                crop,
                hectares,
                planted,
                harvest,
            } => cli_handlers::handle_crop_add(
                ledger,
                &crop,
                &hectares,
                planted.as_deref(),
                harvest.as_deref(),
            ),
            CropCommand::List => cli_handlers::handle_crop_list(ledger),
            CropCommand::Delete { id } => cli_handlers::handle_crop_delete(ledger, id),
        },
        Commands::Livestock(cmd) => match cmd {
            LivestockCommand::Add {
                kind,
                head_count,
                category,
            } => cli_handlers::handle_livestock_add(ledger, &kind, &head_count, category.as_deref()),
            LivestockCommand::List => cli_handlers::handle_livestock_list(ledger),
            LivestockCommand::Delete { id } => cli_handlers::handle_livestock_delete(ledger, id),
        },
        Commands::Dairy(cmd) => match cmd {
            DairyCommand::Add {
                liters,
                date,
                pregnancy,
                calving,
                weaning,
                cows,
                notes,
            } => cli_handlers::handle_dairy_add(
                ledger,
                DairyArgs {
                    liters: &liters,
                    date: date.as_deref(),
                    pregnancy: pregnancy.as_deref(),
                    calving: calving.as_deref(),
                    weaning: weaning.as_deref(),
                    cows: cows.as_deref(),
                    notes: notes.as_deref(),
                },
            ),
            DairyCommand::List => cli_handlers::handle_dairy_list(ledger),
            DairyCommand::Trend => cli_handlers::handle_dairy_trend(ledger),
            DairyCommand::Delete { id } => cli_handlers::handle_dairy_delete(ledger, id),
        },
        Commands::Margin(cmd) => match cmd {
            MarginCommand::Summary => cli_handlers::handle_margin_summary(ledger),
            MarginCommand::Categories => cli_handlers::handle_margin_categories(ledger),
            MarginCommand::Calc {
                product,
                quantity,
                cost,
                income,
            } => cli_handlers::handle_margin_calc(ledger, &product, &quantity, &cost, &income),
            MarginCommand::List => cli_handlers::handle_margin_list(ledger),
            MarginCommand::Delete { id } => cli_handlers::handle_margin_delete(ledger, id),
        },
        Commands::Export { dir } => cli_handlers::handle_export(ledger, &dir),
        Commands::Backup { dir } => cli_handlers::handle_backup(ledger, &dir),
        Commands::Report { dir } => cli_handlers::handle_report(ledger, &dir),
        Commands::Purge { days, yes } => cli_handlers::handle_purge(ledger, days, yes),
        Commands::Quote { url, timeout_secs } => {
            cli_handlers::handle_quote(ledger, url, timeout_secs)
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommand::Get { key } => cli_handlers::handle_config_get(ledger, &key),
            ConfigCommand::Set { key, value } => {
                cli_handlers::handle_config_set(ledger, &key, &value)
            }
        },
    }
}

fn run_entry(ledger: &Ledger, flow: Flow, cmd: EntryCommand) -> Result<(), LedgerError> {
    match cmd {
        EntryCommand::Add {
            category,
            concept,
            amount,
            date,
            desc,
        } => cli_handlers::handle_entry_add(
            ledger,
            flow,
            &category,
            &concept,
            &amount,
            date.as_deref(),
            desc.as_deref(),
        ),
        EntryCommand::List => cli_handlers::handle_entry_list(ledger, flow),
        EntryCommand::Delete { id } => cli_handlers::handle_entry_delete(ledger, flow, id),
        EntryCommand::Categories => cli_handlers::handle_entry_categories(ledger, flow),
    }
}
