use crate::config::{DEFAULT_PURGE_DAYS, DEFAULT_QUOTE_TIMEOUT_SECS};
use crate::db::DEFAULT_DB_FILE;
use crate::maintenance::{DEFAULT_BACKUP_DIR, DEFAULT_EXPORT_DIR, DEFAULT_REPORT_DIR};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agro")]
#[command(about = "Farm management ledger")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Database file
    #[arg(long, global = true, env = "AGRO_DB", default_value = DEFAULT_DB_FILE)]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and load demonstration data if it is empty
    Init,

    /// Checks due soon, provider count, farmed area and this month's totals
    Dashboard {
        /// Due-check horizon in days (defaults to the stored setting)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Post-dated checks
    #[command(subcommand)]
    Check(CheckCommand),

    /// Providers
    #[command(subcommand)]
    Provider(ProviderCommand),

    /// Provider invoices
    #[command(subcommand)]
    Invoice(InvoiceCommand),

    /// Expenses
    #[command(subcommand)]
    Expense(EntryCommand),

    /// Income
    #[command(subcommand)]
    Income(EntryCommand),

    /// Crop areas
    #[command(subcommand)]
    Crop(CropCommand),

    /// Livestock
    #[command(subcommand)]
    Livestock(LivestockCommand),

    /// Dairy production records
    #[command(subcommand)]
    Dairy(DairyCommand),

    /// Margin analysis
    #[command(subcommand)]
    Margin(MarginCommand),

    /// Export every non-empty table to CSV
    Export {
        /// Output directory
        #[arg(long, default_value = DEFAULT_EXPORT_DIR)]
        dir: PathBuf,
    },

    /// Copy the database file
    Backup {
        /// Output directory
        #[arg(long, default_value = DEFAULT_BACKUP_DIR)]
        dir: PathBuf,
    },

    /// Write the financial report
    Report {
        /// Output directory
        #[arg(long, default_value = DEFAULT_REPORT_DIR)]
        dir: PathBuf,
    },

    /// Delete expenses, incomes and dairy records older than N days
    Purge {
        /// Age threshold in days
        #[arg(long, default_value_t = DEFAULT_PURGE_DAYS)]
        days: i64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Currency quote and commodity reference prices
    Quote {
        /// Quote service URL (defaults to the stored setting)
        #[arg(long)]
        url: Option<String>,
        /// Request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_QUOTE_TIMEOUT_SECS)]
        timeout_secs: u64,
    },

    /// Read or change stored settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum CheckCommand {
    /// Register a check
    Add {
        /// Check number
        number: String,
        /// Issuing bank
        bank: String,
        /// Amount
        amount: String,
        /// Due date (YYYY-MM-DD)
        due_date: String,
    },
    /// List checks by due date
    List {
        /// Only pending checks
        #[arg(long)]
        pending: bool,
        /// Only pending checks due within N days, overdue ones included
        #[arg(long, conflicts_with = "pending")]
        due_within: Option<i64>,
    },
    /// Mark a check as paid
    Pay {
        /// Check ID
        id: i64,
    },
    /// Delete a pending check
    Delete {
        /// Check ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ProviderCommand {
    /// Add a provider
    Add {
        /// Provider name
        name: String,
        #[arg(long)]
        sector: Option<String>,
        #[arg(long)]
        tax_id: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// List providers by name
    List,
    /// Delete a provider (its invoices are kept)
    Delete {
        /// Provider ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum InvoiceCommand {
    /// Record an invoice
    Add {
        /// Invoice number
        number: String,
        /// Amount
        amount: String,
        /// Provider ID
        #[arg(long)]
        provider: Option<i64>,
        /// Invoice date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Description
        #[arg(long)]
        desc: Option<String>,
    },
    /// List invoices, newest first
    List {
        /// Only invoices of this provider
        #[arg(long)]
        provider: Option<i64>,
    },
    /// Delete an invoice
    Delete {
        /// Invoice ID
        id: i64,
    },
    /// Invoices whose provider no longer exists
    Orphans,
}

#[derive(Subcommand)]
pub enum EntryCommand {
    /// Record an entry
    Add {
        /// Category: agro, livestock or other
        category: String,
        /// Concept
        concept: String,
        /// Amount
        amount: String,
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Description
        #[arg(long)]
        desc: Option<String>,
    },
    /// Most recent entries
    List,
    /// Delete an entry
    Delete {
        /// Entry ID
        id: i64,
    },
    /// Count, total and average per category
    Categories,
}

#[derive(Subcommand)]
pub enum CropCommand {
    /// Add a crop area
    Add {
        /// Crop name
        crop: String,
        /// Hectares
        hectares: String,
        /// Planting date (YYYY-MM-DD)
        #[arg(long)]
        planted: Option<String>,
        /// Harvest date (YYYY-MM-DD)
        #[arg(long)]
        harvest: Option<String>,
    },
    /// Crop areas with their share of the total
    List,
    /// Delete a crop area
    Delete {
        /// Crop area ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum LivestockCommand {
    /// Register livestock
    Add {
        /// Kind of animal
        kind: String,
        /// Head count
        head_count: String,
        /// Category
        #[arg(long)]
        category: Option<String>,
    },
    /// List livestock
    List,
    /// Delete a livestock entry
    Delete {
        /// Livestock ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum DairyCommand {
    /// Record a day of production
    Add {
        /// Liters produced
        liters: String,
        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Pregnancy rate %
        #[arg(long)]
        pregnancy: Option<String>,
        /// Calving rate %
        #[arg(long)]
        calving: Option<String>,
        /// Weaning rate %
        #[arg(long)]
        weaning: Option<String>,
        /// Lactating cows
        #[arg(long)]
        cows: Option<String>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Most recent records
    List,
    /// Production over the last records, oldest first
    Trend,
    /// Delete a record
    Delete {
        /// Record ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum MarginCommand {
    /// All-time income, expenses and margin
    Summary,
    /// Margin per category
    Categories,
    /// Compute and store a margin for one product
    Calc {
        /// Product or crop
        product: String,
        /// Quantity
        quantity: String,
        /// Total cost
        cost: String,
        /// Total income
        income: String,
    },
    /// Stored margins
    List,
    /// Delete a stored margin
    Delete {
        /// Margin ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective value of a setting
    Get {
        /// due_horizon_days or quote_url
        key: String,
    },
    /// Store a setting
    Set {
        /// due_horizon_days or quote_url
        key: String,
        value: String,
    },
}
