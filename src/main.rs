use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remesa_core::adapters::{
    InMemoryAccountRepository, InMemoryTransactionRepository, PostgresAccountRepository,
    PostgresTransactionRepository,
};
use remesa_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use remesa_core::config::{Config, LogFormat};
use remesa_core::identity::LocalIdentityProvider;
use remesa_core::nowpayments::InvoiceClient;
use remesa_core::ports::{AccountRepository, SheetLogger, TransactionRepository};
use remesa_core::sheets::{DisabledSheetLogger, SheetLoggerClient};
use remesa_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(LogFormat::from_env());

    match cli.command.unwrap_or(Commands::Serve) {
        // Offline: needs no secrets.
        Commands::Quote { amount } => cli::handle_quote(amount),
        Commands::Serve => serve(Config::from_env()?).await,
        Commands::Tx(TxCommands::SetStatus {
            order_number,
            status,
        }) => cli::handle_tx_set_status(&Config::from_env()?, &order_number, status).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&Config::from_env()?).await,
        Commands::Config => cli::handle_config_validate(&Config::from_env()?),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (repository, accounts): (Arc<dyn TransactionRepository>, Arc<dyn AccountRepository>) =
        match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                db::run_migrations(&pool).await?;
                tracing::info!("Using Postgres transaction and account store");

                let transactions = PostgresTransactionRepository::new(pool.clone());
                transactions.start_change_listener().await?;
                (
                    Arc::new(transactions),
                    Arc::new(PostgresAccountRepository::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, transactions and accounts are kept in memory");
                (
                    Arc::new(InMemoryTransactionRepository::new()),
                    Arc::new(InMemoryAccountRepository::new()),
                )
            }
        };

    let identity = Arc::new(
        LocalIdentityProvider::new(config.jwt_secret.clone(), accounts)
            .with_bootstrap_admins(config.admin_emails.iter().cloned()),
    );

    let invoices = Arc::new(InvoiceClient::new(
        config.nowpayments_api_url.clone(),
        config.nowpayments_api_key.clone(),
        config.ipn_callback_url.clone(),
    ));
    tracing::info!(
        "NowPayments client initialized with URL: {}",
        config.nowpayments_api_url
    );

    let sheet_logger: Arc<dyn SheetLogger> = match &config.sheet_logger_url {
        Some(url) => Arc::new(SheetLoggerClient::new(url.clone())),
        None => {
            tracing::warn!("SHEET_LOGGER_URL not set, order logging disabled");
            Arc::new(DisabledSheetLogger)
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::new(config, repository, identity, invoices, sheet_logger);
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
