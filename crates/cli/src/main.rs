use std::{error::Error, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};

use api_types::transaction::{ListFilters, TransactionDraft, TransactionKind, TransactionPatch};
use spese_client::ledger::LedgerClient;
use spese_client::session::{CredentialCache, ProviderConfig, SessionManager, UserPoolProvider};
use spese_client::sync::{LedgerView, SyncController};

mod config;

#[derive(Parser, Debug)]
#[command(name = "spese")]
#[command(about = "Command-line client for the Spese expense ledger")]
struct Cli {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override ledger base URL.
    #[arg(long)]
    base_url: Option<String>,
    /// Override identity provider endpoint.
    #[arg(long)]
    provider_endpoint: Option<String>,
    /// Override provider client id.
    #[arg(long)]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new account (password is prompted, never a flag).
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Complete a registration with the emailed verification code.
    Confirm {
        #[arg(long)]
        username: String,
        #[arg(long)]
        code: String,
    },
    /// Request re-delivery of the verification code.
    Resend {
        #[arg(long)]
        username: String,
    },
    /// Sign in and cache the session for later invocations.
    Login {
        #[arg(long)]
        username: String,
    },
    /// End the session locally and provider-side.
    Logout,
    /// Show the currently signed-in principal.
    Whoami,
    /// List ledger entries with the server-computed summary.
    List(ListArgs),
    /// Add an income or expense entry.
    Add(AddArgs),
    /// Update fields of an existing entry.
    Edit(EditArgs),
    /// Delete an entry.
    Delete { id: String },
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    limit: Option<u64>,
    /// Start date (inclusive), e.g. 2024-01-01.
    #[arg(long)]
    from: Option<String>,
    /// End date (inclusive).
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    category: Option<String>,
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Non-negative magnitude; direction comes from --kind.
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    category: String,
    #[arg(long)]
    description: String,
    #[arg(long, value_parser = parse_kind)]
    kind: TransactionKind,
    #[arg(long)]
    date: Option<String>,
    /// May be repeated.
    #[arg(long)]
    tag: Vec<String>,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_kind)]
    kind: Option<TransactionKind>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    tag: Vec<String>,
}

fn parse_kind(raw: &str) -> Result<TransactionKind, String> {
    match raw {
        "income" => Ok(TransactionKind::Income),
        "expense" => Ok(TransactionKind::Expense),
        other => Err(format!("unknown kind '{other}', expected income or expense")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = config::load(&config::Overrides {
        config: cli.config.clone(),
        base_url: cli.base_url.clone(),
        provider_endpoint: cli.provider_endpoint.clone(),
        client_id: cli.client_id.clone(),
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "spese={level},spese_client={level}",
            level = settings.log
        ))
        .init();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let provider = UserPoolProvider::with_cache(
        http.clone(),
        ProviderConfig {
            endpoint: settings.provider_endpoint.clone(),
            client_id: settings.client_id.clone(),
        },
        CredentialCache::new(&settings.credentials_path),
    )?;
    let manager = SessionManager::new(provider);

    match cli.command {
        Command::Signup { username, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            manager.sign_up(&username, &email, &password).await?;
            println!("registered; check your inbox for the confirmation code");
        }
        Command::Confirm { username, code } => {
            manager.confirm_sign_up(&username, &code).await?;
            println!("account confirmed, you can sign in now");
        }
        Command::Resend { username } => {
            manager.resend_code(&username).await?;
            println!("confirmation code sent again");
        }
        Command::Login { username } => {
            let password = rpassword::prompt_password("Password: ")?;
            manager.sign_in(&username, &password).await?;
            match manager.current() {
                Some(session) => println!("signed in as {}", session.identity_handle),
                None => println!("signed in, but the session could not be resolved yet"),
            }
        }
        Command::Logout => {
            manager.check_session().await;
            manager.sign_out().await?;
            println!("signed out");
        }
        Command::Whoami => match manager.check_session().await {
            Some(session) => {
                println!("{} ({})", session.identity_handle, session.subject_id);
                if let Some(email) = session.email {
                    println!("email: {email}");
                }
            }
            None => println!("not signed in"),
        },
        Command::List(args) => {
            let controller = ledger_controller(&manager, &settings, http).await?;
            controller
                .set_filters(ListFilters {
                    limit: args.limit,
                    start_date: args.from,
                    end_date: args.to,
                    category: args.category,
                })
                .await?;
            print_view(&controller.snapshot());
        }
        Command::Add(args) => {
            let controller = ledger_controller(&manager, &settings, http).await?;
            let entry = controller
                .create(TransactionDraft {
                    amount: args.amount,
                    category: args.category,
                    description: args.description,
                    kind: args.kind,
                    date: args.date,
                    tags: none_if_empty(args.tag),
                })
                .await?;
            println!("created {}", entry.id);
        }
        Command::Edit(args) => {
            let controller = ledger_controller(&manager, &settings, http).await?;
            let entry = controller
                .update(
                    &args.id,
                    TransactionPatch {
                        amount: args.amount,
                        category: args.category,
                        description: args.description,
                        kind: args.kind,
                        date: args.date,
                        tags: none_if_empty(args.tag),
                    },
                )
                .await?;
            println!("updated {}", entry.id);
        }
        Command::Delete { id } => {
            let controller = ledger_controller(&manager, &settings, http).await?;
            controller.delete(&id).await?;
            println!("deleted {id}");
        }
    }

    Ok(())
}

/// Ledger operations need a live session; resolve it once, then wire the
/// controller to the manager's state notifications.
async fn ledger_controller(
    manager: &SessionManager<UserPoolProvider>,
    settings: &config::AppConfig,
    http: reqwest::Client,
) -> Result<SyncController<LedgerClient<UserPoolProvider>>, Box<dyn Error + Send + Sync>> {
    if manager.check_session().await.is_none() {
        return Err("not signed in; run `spese login` first".into());
    }
    let ledger = Arc::new(LedgerClient::new(
        http,
        settings.base_url.clone(),
        manager.provider(),
    ));
    Ok(SyncController::new(ledger, manager.subscribe()))
}

fn none_if_empty(tags: Vec<String>) -> Option<Vec<String>> {
    if tags.is_empty() { None } else { Some(tags) }
}

fn print_view(view: &LedgerView) {
    for entry in &view.entries {
        let sign = match entry.kind {
            TransactionKind::Income => '+',
            TransactionKind::Expense => '-',
        };
        println!(
            "{}  {}{:>10.2}  {:<14}  {}",
            entry.id, sign, entry.amount, entry.category, entry.description
        );
    }
    if let Some(summary) = &view.summary {
        println!("--");
        println!(
            "count {}  income {:.2}  expense {:.2}  net {:.2}  avg {:.2}",
            summary.total_count,
            summary.total_income,
            summary.total_expense,
            summary.net_amount,
            summary.average_amount
        );
        for (category, amount) in &summary.category_breakdown {
            println!("  {category}: {amount:.2}");
        }
    }
    if let Some(err) = &view.last_error {
        println!("warning: view may be stale: {err}");
    }
}
