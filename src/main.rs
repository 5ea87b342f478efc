use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use dao_delegation::{
    governance::{ApprovedProposal, GovernanceHook},
    store, Amount, DelegationConfig, DelegationContract, DelegationError,
};

#[derive(Parser)]
#[command(name = "delegation", about = "Drive a DAO delegation ledger stored in a JSON file")]
struct Cli {
    /// Ledger state file.
    #[arg(long, default_value = "delegation.state.json")]
    state: PathBuf,

    /// Log at DEBUG instead of INFO.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty ledger.
    Init {
        /// JSON file with `registration_storage_bytes` / `storage_byte_cost`.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing state file.
        #[arg(long)]
        force: bool,
    },
    /// Apply a passed governance proposal binding the staking contract.
    ApproveStaking {
        staking_id: String,
        #[arg(long, default_value_t = 0)]
        proposal: u64,
    },
    Register {
        caller: String,
        account: String,
        #[arg(long)]
        deposit: Amount,
    },
    Delegate {
        caller: String,
        account: String,
        amount: Amount,
    },
    Undelegate {
        caller: String,
        account: String,
        amount: Amount,
    },
    Balance {
        account: String,
    },
    TotalSupply,
    /// Print `balance total_supply` for an account.
    Ratio {
        account: String,
    },
    /// Print the full snapshot as JSON.
    Snapshot,
}

//==================== state file ====================//

fn open_contract(path: &Path) -> Result<DelegationContract> {
    store::load_contract(path).with_context(|| {
        format!("cannot open ledger {} (run `delegation init` first?)", path.display())
    })
}

fn persist(path: &Path, contract: &DelegationContract) -> Result<()> {
    store::save_contract(path, contract)
        .with_context(|| format!("cannot write ledger {}", path.display()))
}

/// Saves after a committed mutation; a refused one exits with status 2 and
/// leaves the file alone.
fn finish<T>(
    path: &Path,
    contract: &DelegationContract,
    result: Result<T, DelegationError>,
    report: impl FnOnce(T),
) -> Result<()> {
    match result {
        Ok(value) => {
            persist(path, contract)?;
            report(value);
            Ok(())
        }
        Err(err) => {
            eprintln!("rejected: {err}");
            std::process::exit(2);
        }
    }
}

//==================== commands ====================//

fn init_cmd(path: &Path, config: Option<&Path>, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let config = match config {
        Some(file) => DelegationConfig::load(file)
            .with_context(|| format!("invalid config {}", file.display()))?,
        None => DelegationConfig::default(),
    };
    let contract = DelegationContract::new(config);
    persist(path, &contract)?;
    info!(
        state = %path.display(),
        registration_cost = contract.registration_cost(),
        "ledger initialised"
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.state.as_path();
    match cli.command {
        Command::Init { config, force } => init_cmd(path, config.as_deref(), force),
        Command::ApproveStaking {
            staking_id,
            proposal,
        } => {
            let mut contract = open_contract(path)?;
            contract.on_proposal_approved(&ApprovedProposal::set_staking_contract(
                proposal, staking_id,
            ));
            persist(path, &contract)
        }
        Command::Register {
            caller,
            account,
            deposit,
        } => {
            let mut contract = open_contract(path)?;
            let result = contract.register(&caller, &account, deposit);
            if let Err(err) = &result {
                eprintln!("refunding {deposit} to {caller}");
                tracing::debug!(error = %err, "registration refused");
            }
            finish(path, &contract, result, |registration| {
                if registration.newly_registered {
                    println!("registered {}", registration.account_id);
                } else {
                    println!(
                        "{} already registered, refunded {}",
                        registration.account_id, registration.refund
                    );
                }
            })
        }
        Command::Delegate {
            caller,
            account,
            amount,
        } => {
            let mut contract = open_contract(path)?;
            let result = contract.delegate(&caller, &account, amount);
            finish(path, &contract, result, |out| {
                let (previous, amount, total) = out.into_parts();
                println!("{previous} {amount} {total}");
            })
        }
        Command::Undelegate {
            caller,
            account,
            amount,
        } => {
            let mut contract = open_contract(path)?;
            let result = contract.undelegate(&caller, &account, amount);
            finish(path, &contract, result, |out| {
                let (previous, amount, balance) = out.into_parts();
                println!("{previous} {amount} {balance}");
            })
        }
        Command::Balance { account } => {
            println!("{}", open_contract(path)?.balance_of(&account));
            Ok(())
        }
        Command::TotalSupply => {
            println!("{}", open_contract(path)?.total_supply());
            Ok(())
        }
        Command::Ratio { account } => {
            let (balance, total) = open_contract(path)?.balance_ratio(&account);
            println!("{balance} {total}");
            Ok(())
        }
        Command::Snapshot => {
            let snapshot = open_contract(path)?.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
