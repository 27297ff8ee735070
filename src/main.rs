use anyhow::{bail, Context, Result};
use casino_ledger::{
    check_totals, csv_io, move_database_data, repair_totals, verify_count, Amounts, Config,
    Database,
};
use rusqlite::Connection;
use std::env;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Casino Ledger - track deposits, balances and payouts per casino

USAGE:
    casino-ledger                       Launch the terminal UI
    casino-ledger <COMMAND> [ARGS]

COMMANDS:
    init                                Create the database tables
    casinos                             List casinos with their totals
    transactions                        List every transaction, oldest first
    add-casino <name> [link]            Register a casino
    add-transaction <name> <deposit> <remaining> <payment>
                                        Record a transaction against a casino
    stats <name>                        Per-casino trend and totals
    overview                            Cumulative trend across all casinos
    verify                              Compare cached totals with the log
    repair                              Rebuild drifted totals from the log
    export <file>                       Write the transaction log as CSV
    import <file>                       Record transactions from a CSV file
    transfer <source-db> <target-db>    Copy a whole ledger into another file
    help                                Show this message

ENVIRONMENT:
    DATABASE_PATH, LEDGER_BUSY_TIMEOUT_SECS, LEDGER_LOG_FILE, RUST_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// The TUI owns the terminal, so its logs go to a file.
fn init_file_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {:?}", path))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    if args.is_empty() {
        init_file_logging(&config.log_file)?;
        return run_ui_mode(&config);
    }

    init_stderr_logging();
    let db = Database::from_config(&config);

    match args.as_slice() {
        ["help"] | ["--help"] | ["-h"] => println!("{}", USAGE),
        ["init"] => {
            db.init()?;
            println!("✓ Database ready at {:?}", db.path());
        }
        ["casinos"] => {
            db.init()?;
            print_casinos(&db)?;
        }
        ["transactions"] => {
            db.init()?;
            print_transactions(&db)?;
        }
        ["add-casino", name] => add_casino(&db, name, None)?,
        ["add-casino", name, link] => add_casino(&db, name, Some(*link))?,
        ["add-transaction", name, deposit, remaining, payment] => {
            let amounts = Amounts::new(
                parse_amount("deposit", deposit)?,
                parse_amount("remaining", remaining)?,
                parse_amount("payment", payment)?,
            );
            db.init()?;
            let id = db.record_transaction_by_name(name, amounts)?;
            println!("✓ Recorded transaction #{} for {}", id, name);
        }
        ["stats", name] => {
            db.init()?;
            print_stats(&db, name)?;
        }
        ["overview"] => {
            db.init()?;
            print_overview(&db)?;
        }
        ["verify"] => {
            db.init()?;
            let conn = db.connect()?;
            run_verify(&conn)?;
        }
        ["repair"] => {
            db.init()?;
            let conn = db.connect()?;
            let repaired = repair_totals(&conn)?;
            println!("✓ Repaired totals for {} casino(s)", repaired);
        }
        ["export", file] => {
            db.init()?;
            let conn = db.connect()?;
            let written = csv_io::export_file(&conn, Path::new(file))
                .with_context(|| format!("exporting to {}", file))?;
            println!("✓ Exported {} transactions to {}", written, file);
        }
        ["import", file] => {
            db.init()?;
            let conn = db.connect()?;
            let imported = csv_io::import_file(&conn, Path::new(file))
                .with_context(|| format!("importing {}", file))?;
            println!("✓ Imported {} transactions from {}", imported, file);
        }
        ["transfer", source, target] => run_transfer(&config, source, target)?,
        _ => {
            eprintln!("{}", USAGE);
            bail!("unrecognised command: {}", args.join(" "));
        }
    }

    Ok(())
}

fn parse_amount(label: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", label, raw))?;
    if !value.is_finite() {
        bail!("{} must be a finite number, got '{}'", label, raw);
    }
    Ok(value)
}

fn add_casino(db: &Database, name: &str, link: Option<&str>) -> Result<()> {
    db.init()?;
    let id = db.add_casino(name, link)?;
    println!("✓ Added casino {} (#{})", name.trim(), id);
    Ok(())
}

fn print_casinos(db: &Database) -> Result<()> {
    let casinos = db.casinos()?;
    if casinos.is_empty() {
        println!("No casinos yet. Add one with: casino-ledger add-casino <name> [link]");
        return Ok(());
    }

    println!(
        "{:>4}  {:<24} {:>12} {:>12} {:>12} {:>12}  {}",
        "ID", "Name", "Deposit", "Remaining", "Payment", "Profit", "Link"
    );
    for c in &casinos {
        println!(
            "{:>4}  {:<24} {:>12.2} {:>12.2} {:>12.2} {:>12.2}  {}",
            c.id,
            c.name,
            c.deposit,
            c.remaining,
            c.payment,
            c.profit(),
            c.link.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn print_transactions(db: &Database) -> Result<()> {
    let views = db.transaction_views()?;
    println!(
        "{:>5}  {:<24} {:>12} {:>12} {:>12}  {}",
        "ID", "Casino", "Deposit", "Remaining", "Payment", "Date"
    );
    for t in &views {
        println!(
            "{:>5}  {:<24} {:>12.2} {:>12.2} {:>12.2}  {}",
            t.id,
            t.casino,
            t.deposit,
            t.remaining,
            t.payment,
            t.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("\n{} transaction(s)", views.len());
    Ok(())
}

fn print_stats(db: &Database, name: &str) -> Result<()> {
    let series = db.casino_stats(name)?;

    println!("📊 {}", name);
    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>12}",
        "Date", "Deposit", "Remaining", "Payment", "Profit"
    );
    for p in &series.points {
        println!(
            "{:<20} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            p.timestamp.format("%Y-%m-%d %H:%M:%S"),
            p.deposit,
            p.remaining,
            p.payment,
            p.profit
        );
    }

    let s = series.summary;
    println!("\nTotal Deposit:   ${:.2}", s.total_deposit);
    println!("Total Remaining: ${:.2}", s.total_remaining);
    println!("Total Payment:   ${:.2}", s.total_payment);
    println!("Total Profit:    ${:.2}", s.profit);
    Ok(())
}

fn print_overview(db: &Database) -> Result<()> {
    let overview = db.overview()?;

    let t = overview.totals;
    println!("Total Deposit:   ${:.2}", t.deposit);
    println!("Total Remaining: ${:.2}", t.remaining);
    println!("Total Payment:   ${:.2}", t.payment);
    println!("Total Profit:    ${:.2}", t.profit);

    if overview.series.is_empty() {
        println!("\nNo transactions recorded yet.");
        return Ok(());
    }

    println!(
        "\n{:<12} {:>12} {:>12} {:>12} {:>12}",
        "Date", "Deposits", "Remaining", "Payments", "Profit"
    );
    for p in &overview.series.points {
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            p.date.format("%Y-%m-%d"),
            p.deposit,
            p.remaining,
            p.payment,
            p.profit
        );
    }
    Ok(())
}

fn run_verify(conn: &Connection) -> Result<()> {
    let logged = verify_count(conn)?;
    let drifts = check_totals(conn)?;

    if drifts.is_empty() {
        println!("✓ Casino totals match the transaction log ({} transactions)", logged);
        return Ok(());
    }

    println!("⚠️  {} casino(s) out of step with the log:", drifts.len());
    for drift in &drifts {
        println!("   {}", drift.summary());
    }
    println!("\n   Run: casino-ledger repair");
    Ok(())
}

fn run_transfer(config: &Config, source: &str, target: &str) -> Result<()> {
    if !Path::new(source).exists() {
        bail!("source database not found: {}", source);
    }

    let source_db = Database::new(source).with_busy_timeout(config.busy_timeout);
    let target_db = Database::new(target).with_busy_timeout(config.busy_timeout);
    let source_conn = source_db.connect()?;
    let target_conn = target_db.connect()?;

    let report = move_database_data(&source_conn, &target_conn)
        .with_context(|| format!("copying {} into {}", source, target))?;
    println!(
        "✓ Copied {} casinos and {} transactions into {}",
        report.casinos, report.transactions, target
    );
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use casino_ledger::ui;

    let db = Database::from_config(config);
    db.init()
        .with_context(|| format!("opening database {:?}", config.database_path))?;

    let mut app = ui::App::new(db);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run a subcommand, see: casino-ledger help");
    std::process::exit(1);
}
