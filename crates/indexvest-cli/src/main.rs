//! indexvest
//!
//! Command-line front end for an index-adjusted vesting ledger. The ledger
//! lives in a sled database under the data directory; the in-memory asset
//! collaborators are persisted beside it as a JSON asset book.
//!
//! Usage:
//!   indexvest init fixed   --authority <acct> --custody <acct>
//!   indexvest init supply  --authority <acct> --treasury <acct> --start <when> --full <when> --max-allocation <pct>
//!   indexvest fund         --account <acct> --amount <n> [--asset base|payment]
//!   indexvest approve      --owner <acct> --spender <acct> --amount <n> [--asset base|payment|receipt]
//!   indexvest rebase       --index <decimal>
//!   indexvest grant        --caller <acct> --beneficiary <acct> (--amount <n> --length <dur> | --percent <pct>)
//!   indexvest claim        --caller <acct> --amount <n> [--to <acct>]
//!   indexvest redeemable   --account <acct>
//!   indexvest push-wallet  --caller <acct> --to <acct>
//!   indexvest pull-wallet  --caller <acct> --from <acct>
//!   indexvest describe     --account <acct> [--steps <n>]
//!   indexvest summary      [--json]
//!   indexvest balance      --account <acct>
//!
//! Accounts are base-58 ids, or `@label` for BLAKE3(label).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use indexvest_core::error::VestingError;
use indexvest_core::term::{FixedTerm, SupplyTerm};
use indexvest_core::types::{AccountId, Balance, Index, Percent, StaticAmount, Timestamp};
use indexvest_core::{FixedLedgerConfig, SupplyLedgerConfig};
use indexvest_query::{LedgerSummary, Schedule, Snapshot, TermQuery};
use indexvest_state::{FixedVestingEngine, FungibleAsset, IndexSource, MemoryAssets, StateDb, SupplyVestingEngine};

mod config;
mod parse;

use config::{expand_tilde, load_assets, save_assets, LedgerFile, DB_DIR};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "indexvest",
    version,
    about = "Index-adjusted vesting ledger"
)]
struct Args {
    /// Ledger configuration (JSON).
    #[arg(long, global = true, default_value = "~/.indexvest/ledger.json")]
    config: PathBuf,

    /// Directory for the ledger database and asset book.
    #[arg(long, global = true, default_value = "~/.indexvest/data")]
    data_dir: PathBuf,

    /// Evaluate at this instant instead of the current time
    /// (unix seconds, RFC 3339 or YYYY-MM-DD).
    #[arg(long, global = true, value_parser = parse::instant)]
    now: Option<Timestamp>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a new ledger config and bind the database to its kind.
    Init {
        #[command(subcommand)]
        ledger: InitLedger,
    },

    /// Issue a grant. Fixed ledgers take --amount and --length; supply
    /// ledgers take --percent.
    Grant {
        #[arg(long, value_parser = parse::account)]
        caller: AccountId,
        #[arg(long, value_parser = parse::account)]
        beneficiary: AccountId,
        /// Static amount pulled from the caller and staked.
        #[arg(long)]
        amount: Option<Balance>,
        /// Vesting length: seconds, or with an s/m/h/d suffix.
        #[arg(long, value_parser = parse::duration)]
        length: Option<u64>,
        /// Share of supply, e.g. 1.5%.
        #[arg(long, value_parser = parse::percent)]
        percent: Option<Percent>,
    },

    /// Claim vested value. On a supply ledger --amount is the payment.
    Claim {
        #[arg(long, value_parser = parse::account)]
        caller: AccountId,
        #[arg(long)]
        amount: Balance,
        /// Recipient; defaults to the caller.
        #[arg(long, value_parser = parse::account)]
        to: Option<AccountId>,
    },

    /// Print the amount an account may claim now.
    Redeemable {
        #[arg(long, value_parser = parse::account)]
        account: AccountId,
    },

    /// Propose moving the caller's term to a new wallet.
    PushWallet {
        #[arg(long, value_parser = parse::account)]
        caller: AccountId,
        #[arg(long, value_parser = parse::account)]
        to: AccountId,
    },

    /// Accept a term proposed to the caller by its current holder.
    PullWallet {
        #[arg(long, value_parser = parse::account)]
        caller: AccountId,
        #[arg(long, value_parser = parse::account)]
        from: AccountId,
    },

    /// Describe an account's term, optionally with a release projection.
    Describe {
        #[arg(long, value_parser = parse::account)]
        account: AccountId,
        #[arg(long)]
        steps: Option<u32>,
    },

    /// Ledger-wide totals.
    Summary {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Move the receipt index forward.
    Rebase {
        #[arg(long, value_parser = parse::index)]
        index: Index,
    },

    /// Mint test funds to an account.
    Fund {
        #[arg(long, value_parser = parse::account)]
        account: AccountId,
        #[arg(long)]
        amount: Balance,
        #[arg(long, value_enum, default_value_t = Asset::Base)]
        asset: Asset,
    },

    /// Set an allowance.
    Approve {
        #[arg(long, value_parser = parse::account)]
        owner: AccountId,
        #[arg(long, value_parser = parse::account)]
        spender: AccountId,
        #[arg(long)]
        amount: Balance,
        #[arg(long, value_enum, default_value_t = Asset::Base)]
        asset: Asset,
    },

    /// Print an account's asset balances.
    Balance {
        #[arg(long, value_parser = parse::account)]
        account: AccountId,
    },
}

#[derive(Subcommand, Debug)]
enum InitLedger {
    /// Per-beneficiary fixed grants staked into custody.
    Fixed {
        #[arg(long, value_parser = parse::account)]
        authority: AccountId,
        #[arg(long, value_parser = parse::account)]
        custody: AccountId,
    },
    /// Percent-of-supply shares over one shared window.
    Supply {
        #[arg(long, value_parser = parse::account)]
        authority: AccountId,
        #[arg(long, value_parser = parse::account)]
        treasury: AccountId,
        #[arg(long, value_parser = parse::instant)]
        start: Timestamp,
        #[arg(long, value_parser = parse::instant)]
        full: Timestamp,
        #[arg(long, value_parser = parse::percent)]
        max_allocation: Percent,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Asset {
    Base,
    Payment,
    Receipt,
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,indexvest=info")),
        )
        .init();

    let args = Args::parse();
    let config_path = expand_tilde(&args.config);
    let data_dir = expand_tilde(&args.data_dir);
    let now = args.now.unwrap_or_else(|| Utc::now().timestamp());

    match args.command {
        Command::Init { ledger } => cmd_init(ledger, &config_path, &data_dir),

        Command::Fund { account, amount, asset } => {
            let assets = load_assets(&data_dir)?;
            match asset {
                Asset::Base => assets.base.mint(&account, amount)?,
                Asset::Payment => assets.payment.mint(&account, amount)?,
                Asset::Receipt => anyhow::bail!("the receipt is only issued by staking"),
            }
            save_assets(&data_dir, &assets)?;
            println!("Funded {} with {} {:?}", account, amount, asset);
            Ok(())
        }

        Command::Approve { owner, spender, amount, asset } => {
            let assets = load_assets(&data_dir)?;
            match asset {
                Asset::Base => assets.base.approve(&owner, &spender, amount),
                Asset::Payment => assets.payment.approve(&owner, &spender, amount),
                Asset::Receipt => assets.receipt.approve(&owner, &spender, amount),
            }
            save_assets(&data_dir, &assets)?;
            println!("Approved {} to spend {} {:?} of {}", spender, amount, asset, owner);
            Ok(())
        }

        Command::Rebase { index } => {
            let assets = load_assets(&data_dir)?;
            let before = assets.receipt.index();
            assets.receipt.rebase(index)?;
            save_assets(&data_dir, &assets)?;
            info!(from = %before, to = %index, "receipt rebased");
            println!("Index: {} -> {}", before, index);
            Ok(())
        }

        Command::Balance { account } => {
            let assets = load_assets(&data_dir)?;
            println!("Account:  {}", account);
            println!("Base:     {}", assets.base.balance_of(&account));
            println!(
                "Receipt:  {}  ({} shares at index {})",
                assets.receipt.balance_of(&account),
                assets.receipt.shares_of(&account),
                assets.receipt.index()
            );
            println!("Payment:  {}", assets.payment.balance_of(&account));
            Ok(())
        }

        command => {
            let file = LedgerFile::load(&config_path)?;
            let assets = load_assets(&data_dir)?;
            let mut ledger = Ledger::open(&file, &data_dir, &assets)?;
            let mutated = run_ledger_command(&mut ledger, command, now)?;
            if mutated {
                ledger.db().flush()?;
                save_assets(&data_dir, &assets)?;
            }
            Ok(())
        }
    }
}

// ── Ledger ────────────────────────────────────────────────────────────────────

enum Ledger {
    Fixed(FixedVestingEngine),
    Supply(SupplyVestingEngine),
}

impl Ledger {
    fn open(file: &LedgerFile, data_dir: &Path, assets: &MemoryAssets) -> anyhow::Result<Self> {
        let path = data_dir.join(DB_DIR);
        let db = Arc::new(
            StateDb::open(&path).with_context(|| format!("opening ledger database {}", path.display()))?,
        );
        let ledger = match file {
            LedgerFile::Fixed(c) => Ledger::Fixed(FixedVestingEngine::new(db, c.clone(), assets.fixed_assets())?),
            LedgerFile::Supply(c) => {
                Ledger::Supply(SupplyVestingEngine::new(db, c.clone(), assets.supply_assets())?)
            }
        };
        Ok(ledger)
    }

    fn db(&self) -> &StateDb {
        match self {
            Ledger::Fixed(e) => e.db().as_ref(),
            Ledger::Supply(e) => e.db().as_ref(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        match self {
            Ledger::Fixed(e) => Snapshot::of_fixed(e),
            Ledger::Supply(e) => Snapshot::of_supply(e),
        }
    }

    fn redeemable(&self, who: &AccountId, now: Timestamp) -> Result<StaticAmount, VestingError> {
        match self {
            Ledger::Fixed(e) => e.redeemable(who, now),
            Ledger::Supply(e) => e.redeemable(who, now),
        }
    }

    fn pending_wallet_change(&self, old: &AccountId) -> Result<Option<AccountId>, VestingError> {
        match self {
            Ledger::Fixed(e) => e.pending_wallet_change(old),
            Ledger::Supply(e) => e.pending_wallet_change(old),
        }
    }

    fn push_wallet_change(&mut self, caller: &AccountId, new_wallet: &AccountId) -> Result<(), VestingError> {
        match self {
            Ledger::Fixed(e) => e.push_wallet_change(caller, new_wallet),
            Ledger::Supply(e) => e.push_wallet_change(caller, new_wallet),
        }
    }

    fn pull_wallet_change(&mut self, caller: &AccountId, old: &AccountId) -> Result<(), VestingError> {
        match self {
            Ledger::Fixed(e) => e.pull_wallet_change(caller, old).map(drop),
            Ledger::Supply(e) => e.pull_wallet_change(caller, old).map(drop),
        }
    }
}

/// Run one ledger command. Returns whether ledger or asset state changed.
fn run_ledger_command(ledger: &mut Ledger, command: Command, now: Timestamp) -> anyhow::Result<bool> {
    match command {
        Command::Grant { caller, beneficiary, amount, length, percent } => {
            match ledger {
                Ledger::Fixed(e) => {
                    let amount = amount.context("--amount is required on a fixed ledger")?;
                    let length = length.context("--length is required on a fixed ledger")?;
                    let term = e.issue_grant(&caller, &beneficiary, StaticAmount::new(amount), length, now)?;
                    println!(
                        "Granted {} ({} index-adjusted) to {}, vesting {} to {}",
                        amount, term.total_index_adjusted, beneficiary, term.start_vest, term.end_vest
                    );
                }
                Ledger::Supply(e) => {
                    let percent = percent.context("--percent is required on a supply ledger")?;
                    e.issue_grant(&caller, &beneficiary, percent)?;
                    println!(
                        "Granted {} of supply to {} ({} of {} allocated)",
                        percent,
                        beneficiary,
                        e.total_allocated()?,
                        e.config().max_allocation
                    );
                }
            }
            Ok(true)
        }

        Command::Claim { caller, amount, to } => {
            let recipient = to.unwrap_or_else(|| caller.clone());
            match ledger {
                Ledger::Fixed(e) => {
                    e.claim(&caller, &recipient, StaticAmount::new(amount), now)?;
                    println!("Claimed {} to {}", amount, recipient);
                }
                Ledger::Supply(e) => {
                    let minted = e.claim(&caller, &recipient, amount, now)?;
                    println!("Paid {} into treasury, minted {} to {}", amount, minted, recipient);
                }
            }
            Ok(true)
        }

        Command::Redeemable { account } => {
            println!("{}", ledger.redeemable(&account, now)?);
            Ok(false)
        }

        Command::PushWallet { caller, to } => {
            ledger.push_wallet_change(&caller, &to)?;
            println!("Proposed moving {}'s term to {}", caller, to);
            Ok(true)
        }

        Command::PullWallet { caller, from } => {
            ledger.pull_wallet_change(&caller, &from)?;
            println!("Moved term from {} to {}", from, caller);
            Ok(true)
        }

        Command::Describe { account, steps } => {
            let ledger = &*ledger;
            let q = TermQuery::new(ledger.db(), ledger.snapshot());
            match ledger {
                Ledger::Fixed(_) => describe::<FixedTerm>(&q, &account, now, steps)?,
                Ledger::Supply(_) => describe::<SupplyTerm>(&q, &account, now, steps)?,
            }
            if let Some(to) = ledger.pending_wallet_change(&account)? {
                println!("Pending wallet change to {}", to);
            }
            Ok(false)
        }

        Command::Summary { json } => {
            let ledger = &*ledger;
            let snapshot = ledger.snapshot();
            let summary = match ledger {
                Ledger::Fixed(_) => LedgerSummary::collect::<FixedTerm>(ledger.db(), &snapshot, now)?,
                Ledger::Supply(_) => LedgerSummary::collect::<SupplyTerm>(ledger.db(), &snapshot, now)?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(false)
        }

        Command::Init { .. }
        | Command::Fund { .. }
        | Command::Approve { .. }
        | Command::Rebase { .. }
        | Command::Balance { .. } => anyhow::bail!("not a ledger command"),
    }
}

fn describe<T: Schedule>(
    q: &TermQuery<'_>,
    who: &AccountId,
    now: Timestamp,
    steps: Option<u32>,
) -> anyhow::Result<()> {
    println!("{}", q.describe::<T>(who, now)?);
    if let Some(steps) = steps {
        for p in q.projection::<T>(who, steps)? {
            println!("  {:>12}  {:>20}  {}", p.at, p.vested_static, p.vested);
        }
    }
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_init(ledger: InitLedger, config_path: &Path, data_dir: &Path) -> anyhow::Result<()> {
    let file = match ledger {
        InitLedger::Fixed { authority, custody } => LedgerFile::Fixed(FixedLedgerConfig { authority, custody }),
        InitLedger::Supply { authority, treasury, start, full, max_allocation } => {
            LedgerFile::Supply(SupplyLedgerConfig {
                authority,
                treasury,
                start_vest: start,
                full_vest: full,
                max_allocation,
            })
        }
    };
    file.validate()?;

    // Binding the database first keeps a config from being written over a
    // database of the other kind.
    let assets = load_assets(data_dir)?;
    let ledger = Ledger::open(&file, data_dir, &assets)?;
    ledger.db().flush()?;
    file.create(config_path)?;
    save_assets(data_dir, &assets)?;

    println!("Initialised ledger.");
    println!("Config:   {}", config_path.display());
    println!("Data dir: {}", data_dir.display());
    if let LedgerFile::Fixed(c) = &file {
        println!("\nApprove custody {} to pull grant funding from the authority.", c.custody);
    }
    Ok(())
}
