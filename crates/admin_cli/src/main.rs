use std::error::Error;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use engine::{CounterpartyKind, Engine, LegacyEntryKind, VoucherKind};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "recon_admin")]
#[command(about = "Admin utilities for the reconciliation engine")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./reconciliation.db?mode=rwc"
    )]
    database_url: String,

    /// Acting user recorded in the audit log.
    #[arg(long, default_value = "admin")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Counterparty(Counterparty),
    Voucher(Voucher),
    Period(Period),
}

#[derive(Args, Debug)]
struct Counterparty {
    #[command(subcommand)]
    command: CounterpartyCommand,
}

#[derive(Subcommand, Debug)]
enum CounterpartyCommand {
    Create(CounterpartyCreateArgs),
    Alias(AliasArgs),
    List,
}

#[derive(Args, Debug)]
struct CounterpartyCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    code: Option<String>,
    /// buyer, seller, or both.
    #[arg(long, default_value = "both")]
    kind: String,
    #[arg(long)]
    branch: Option<String>,
}

#[derive(Args, Debug)]
struct AliasArgs {
    #[arg(long)]
    counterparty_id: Uuid,
    #[arg(long)]
    alias: String,
}

#[derive(Args, Debug)]
struct Voucher {
    #[command(subcommand)]
    command: VoucherCommand,
}

#[derive(Subcommand, Debug)]
enum VoucherCommand {
    Create(VoucherCreateArgs),
    LegacyEntry(LegacyEntryArgs),
}

#[derive(Args, Debug)]
struct VoucherCreateArgs {
    #[arg(long)]
    counterparty_id: Uuid,
    /// sales or purchase.
    #[arg(long)]
    kind: String,
    #[arg(long)]
    trade_date: NaiveDate,
    #[arg(long)]
    voucher_number: String,
    /// Amount in minor units.
    #[arg(long)]
    total: i64,
}

#[derive(Args, Debug)]
struct LegacyEntryArgs {
    #[arg(long)]
    voucher_id: Uuid,
    /// receipt or payment.
    #[arg(long)]
    kind: String,
    #[arg(long)]
    date: NaiveDate,
    /// Amount in minor units.
    #[arg(long)]
    amount: i64,
    #[arg(long)]
    memo: Option<String>,
}

#[derive(Args, Debug)]
struct Period {
    #[command(subcommand)]
    command: PeriodCommand,
}

#[derive(Subcommand, Debug)]
enum PeriodCommand {
    Lock(PeriodArgs),
    Unlock(PeriodArgs),
    List,
}

#[derive(Args, Debug)]
struct PeriodArgs {
    /// Period key, `YYYY-MM`.
    #[arg(long)]
    year_month: String,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build();

    match cli.command {
        Command::Counterparty(Counterparty {
            command: CounterpartyCommand::Create(args),
        }) => {
            let kind = CounterpartyKind::try_from(args.kind.as_str())?;
            let counterparty = engine
                .create_counterparty(
                    &args.name,
                    args.code.as_deref(),
                    kind,
                    args.branch.as_deref(),
                    &cli.user,
                )
                .await?;
            println!("created counterparty: {} ({})", counterparty.name, counterparty.id);
        }
        Command::Counterparty(Counterparty {
            command: CounterpartyCommand::Alias(args),
        }) => {
            let alias = engine.add_alias(args.counterparty_id, &args.alias, &cli.user).await?;
            println!("added alias: {} ({})", alias.alias, alias.id);
        }
        Command::Counterparty(Counterparty {
            command: CounterpartyCommand::List,
        }) => {
            for counterparty in engine.list_counterparties(true).await? {
                let flag = if counterparty.active { "" } else { " [inactive]" };
                println!("{}  {}{flag}", counterparty.id, counterparty.name);
            }
        }
        Command::Voucher(Voucher {
            command: VoucherCommand::Create(args),
        }) => {
            let kind = VoucherKind::try_from(args.kind.as_str())?;
            let voucher = engine
                .create_voucher(
                    args.counterparty_id,
                    kind,
                    args.trade_date,
                    &args.voucher_number,
                    args.total,
                    &cli.user,
                )
                .await?;
            println!("created voucher: {} ({})", voucher.voucher_number, voucher.id);
        }
        Command::Voucher(Voucher {
            command: VoucherCommand::LegacyEntry(args),
        }) => {
            let kind = LegacyEntryKind::try_from(args.kind.as_str())?;
            let entry = engine
                .record_legacy_entry(
                    args.voucher_id,
                    kind,
                    args.date,
                    args.amount,
                    args.memo.as_deref(),
                    &cli.user,
                )
                .await?;
            println!("recorded {} of {} ({})", args.kind, args.amount, entry.id);
        }
        Command::Period(Period {
            command: PeriodCommand::Lock(args),
        }) => {
            let lock = engine.lock_period(&args.year_month, &cli.user).await?;
            println!(
                "locked {}: {} vouchers",
                lock.year_month, lock.locked_voucher_count
            );
        }
        Command::Period(Period {
            command: PeriodCommand::Unlock(args),
        }) => {
            let lock = engine.unlock_period(&args.year_month, &cli.user).await?;
            println!("unlocked {}", lock.year_month);
        }
        Command::Period(Period {
            command: PeriodCommand::List,
        }) => {
            for lock in engine.list_period_locks().await? {
                println!("{}  {}", lock.year_month, lock.state.as_str());
            }
        }
    }

    Ok(())
}
