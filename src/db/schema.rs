//! Table definitions and the demonstration data set.

use crate::error::Result;
use chrono::{Days, NaiveDate};
use rusqlite::{Connection, Transaction};

/// A table and the statement that creates it
pub struct TableDef {
    pub name: &'static str,
    pub ddl: &'static str,
}

/// Every table, in creation order. Column order here is the export column order.
pub const TABLES: &[TableDef] = &[
    TableDef {
        name: "checks",
        ddl: "CREATE TABLE IF NOT EXISTS checks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number TEXT NOT NULL,
            bank TEXT NOT NULL,
            amount REAL NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid')),
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
    },
    TableDef {
        name: "providers",
        ddl: "CREATE TABLE IF NOT EXISTS providers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            sector TEXT,
            tax_id TEXT,
            phone TEXT,
            email TEXT,
            address TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
    },
    TableDef {
        name: "invoices",
        ddl: "CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER REFERENCES providers(id),
            number TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT
        )",
    },
    TableDef {
        name: "expenses",
        ddl: "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            concept TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT
        )",
    },
    TableDef {
        name: "incomes",
        ddl: "CREATE TABLE IF NOT EXISTS incomes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            concept TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT
        )",
    },
    TableDef {
        name: "crop_areas",
        ddl: "CREATE TABLE IF NOT EXISTS crop_areas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            crop TEXT NOT NULL,
            hectares REAL NOT NULL,
            planting_date TEXT,
            harvest_date TEXT
        )",
    },
    TableDef {
        name: "livestock",
        ddl: "CREATE TABLE IF NOT EXISTS livestock (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            head_count INTEGER NOT NULL,
            category TEXT,
            registered_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
    },
    TableDef {
        name: "dairy_records",
        ddl: "CREATE TABLE IF NOT EXISTS dairy_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            liters REAL,
            pregnancy_pct REAL,
            calving_pct REAL,
            weaning_pct REAL,
            lactating_cows INTEGER,
            notes TEXT
        )",
    },
    TableDef {
        name: "margins",
        ddl: "CREATE TABLE IF NOT EXISTS margins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            product TEXT NOT NULL,
            quantity REAL,
            total_cost REAL,
            total_income REAL,
            margin REAL,
            date TEXT NOT NULL
        )",
    },
    TableDef {
        name: "settings",
        ddl: "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    },
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_checks_due_date ON checks(status, due_date)",
    "CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)",
    "CREATE INDEX IF NOT EXISTS idx_incomes_date ON incomes(date)",
    "CREATE INDEX IF NOT EXISTS idx_dairy_records_date ON dairy_records(date)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_provider_id ON invoices(provider_id)",
];

/// Create tables and indexes. Safe to call on an existing database.
pub fn create(conn: &Connection) -> Result<()> {
    for table in TABLES {
        conn.execute(table.ddl, [])?;
    }
    for index in INDEXES {
        conn.execute(index, [])?;
    }
    Ok(())
}

fn offset(today: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        today + Days::new(days as u64)
    } else {
        today - Days::new(days.unsigned_abs())
    }
}

/// Demonstration rows, dated relative to `today`
pub fn seed(tx: &Transaction, today: NaiveDate) -> Result<()> {
    let checks = [
        ("001234", "Banco Nación", 500_000.0, 5),
        ("002345", "Banco Provincia", 750_000.0, 15),
        ("003456", "Banco Galicia", 300_000.0, 30),
    ];
    for (number, bank, amount, due_in) in checks {
        tx.execute(
            "INSERT INTO checks (number, bank, amount, due_date) VALUES (?1, ?2, ?3, ?4)",
            (number, bank, amount, offset(today, due_in)),
        )?;
    }

    let providers = [
        (
            "Semillas del Campo S.A.",
            "Farm inputs",
            "20-12345678-9",
            "11-4444-5555",
            "ventas@semillas.com",
            "Av. Rural 123",
        ),
        (
            "Agroquímicos del Sur",
            "Agrochemicals",
            "30-87654321-2",
            "11-5555-6666",
            "info@agrosur.com",
            "Ruta 9 Km 45",
        ),
        (
            "Ferretería Rural",
            "Tools",
            "27-11223344-5",
            "11-6666-7777",
            "ferreteria@rural.com",
            "Calle Principal 567",
        ),
    ];
    for provider in providers {
        tx.execute(
            "INSERT INTO providers (name, sector, tax_id, phone, email, address)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            provider,
        )?;
    }

    let expenses = [
        ("agro", "Soybean seed", 800_000.0, -10, "Seed purchase"),
        ("livestock", "Balanced feed", 450_000.0, -5, "Cattle feed"),
        ("other", "Fuel", 120_000.0, -2, "Diesel for machinery"),
    ];
    for (category, concept, amount, days, description) in expenses {
        tx.execute(
            "INSERT INTO expenses (category, concept, amount, date, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (category, concept, amount, offset(today, days), description),
        )?;
    }

    let incomes = [
        ("agro", "Wheat sale", 2_500_000.0, -20, "2024 harvest"),
        ("livestock", "Steer sale", 1_800_000.0, -15, "50 head"),
        ("other", "Land lease", 300_000.0, -30, "Lot 5"),
    ];
    for (category, concept, amount, days, description) in incomes {
        tx.execute(
            "INSERT INTO incomes (category, concept, amount, date, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (category, concept, amount, offset(today, days), description),
        )?;
    }

    let crops = [
        ("Soja", 150.0, "2024-10-15", "2025-04-15"),
        ("Trigo", 100.0, "2024-06-01", "2024-12-01"),
        ("Maíz", 80.0, "2024-09-01", "2025-03-01"),
    ];
    for crop in crops {
        tx.execute(
            "INSERT INTO crop_areas (crop, hectares, planting_date, harvest_date)
             VALUES (?1, ?2, ?3, ?4)",
            crop,
        )?;
    }

    tx.execute(
        "INSERT INTO dairy_records
            (date, liters, pregnancy_pct, calving_pct, weaning_pct, lactating_cows, notes)
         VALUES (?1, 5000.0, 85.0, 90.0, 88.0, 250, 'Normal production')",
        [today],
    )?;

    Ok(())
}
