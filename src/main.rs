use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use cattle_weighing::config::{init_tracing, CliArgs, Command};
use cattle_weighing::{intake_persons, load_person_csv, AccountService, PersonDirectory, SqliteStore};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_tracing(&args.log_level);

    println!("🐄 Cattle Weighing - Maintenance");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Opening the store creates the schema if needed
    println!("\n🔧 Opening database {:?}...", args.database_path);
    let store = Arc::new(
        SqliteStore::open(&args.database_path)
            .with_context(|| format!("Failed to open database {:?}", args.database_path))?,
    );
    println!("✓ Database ready (WAL mode)");

    match args.command {
        Command::InitDb => {}
        Command::CreateAdmin {
            email,
            password,
            legal_id,
            name,
        } => {
            let accounts = AccountService::new(store);
            let (account, created) = accounts.ensure_admin(&email, &password, &legal_id, &name)?;
            if created {
                println!("\n✅ Admin account {} created for {}", account.id, account.email);
            } else {
                println!("\n✓ Account {} already exists, left unchanged", account.email);
            }
        }
        Command::ImportPersons { path } => run_import(store, &path)?,
        Command::BackfillNameKeys => {
            println!("\n🔁 Recomputing name keys...");
            let report = PersonDirectory::new(store).backfill_name_keys()?;
            println!("✓ Scanned {} persons, updated {}", report.scanned, report.updated);
            for (person_id, key) in &report.collisions {
                println!("⚠️  Person {} collides on '{}', left unchanged", person_id, key);
            }
        }
    }

    Ok(())
}

fn run_import(store: Arc<SqliteStore>, path: &std::path::Path) -> Result<()> {
    println!("\n📂 Loading CSV...");
    let records = load_person_csv(path)?;
    println!("✓ Loaded {} records from {:?}", records.len(), path);

    println!("\n💾 Resolving persons...");
    let report = intake_persons(&PersonDirectory::new(store), &records);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Created:   {}", report.created);
    println!("✓ Refreshed: {}", report.refreshed);
    if !report.failed.is_empty() {
        println!("❌ Failed:    {}", report.failed.len());
        for (record, reason) in &report.failed {
            println!("   record {}: {}", record, reason);
        }
    }

    Ok(())
}
