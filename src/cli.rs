use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::adapters::PostgresTransactionRepository;
use crate::config::Config;
use crate::domain::{quote, OrderNumber, TransactionStatus};
use crate::use_cases::UpdateStatus;

#[derive(Parser)]
#[command(name = "remesa-core")]
#[command(about = "Remesa Core - money transfer checkout service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Print the quote for a send amount
    Quote {
        #[arg(value_name = "AMOUNT")]
        amount: u32,
    },
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Set the status of an order, as an operator would from the CRM sheet
    SetStatus {
        #[arg(value_name = "ORDER_NUMBER")]
        order_number: String,
        /// Pending, InProgress, Delivered or Completed (Spanish labels accepted)
        #[arg(value_name = "STATUS")]
        status: TransactionStatus,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

fn require_database(config: &Config) -> anyhow::Result<&str> {
    config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for this command"))
}

pub async fn handle_tx_set_status(
    config: &Config,
    order_number: &str,
    status: TransactionStatus,
) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(require_database(config)?).await?;
    let updates = UpdateStatus::new(Arc::new(PostgresTransactionRepository::new(pool)));

    let update = updates
        .by_order_number(&OrderNumber::from(order_number), status)
        .await?;

    if update.changed {
        tracing::info!(%order_number, %status, "status set from cli");
        println!("✓ Order {} is now {}", order_number, status);
    } else {
        println!("Order {} was already {}", order_number, status);
    }
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(require_database(config)?).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");
    config.validate()?;

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: (unset, in-memory store)"),
    }
    println!("  NowPayments API URL: {}", config.nowpayments_api_url);
    println!(
        "  IPN signature check: {}",
        if config.nowpayments_ipn_secret.is_some() { "on" } else { "off" }
    );
    println!(
        "  Sheet logger: {}",
        config.sheet_logger_url.as_deref().unwrap_or("(disabled)")
    );
    println!("  Bootstrap admins: {}", config.admin_emails.len());

    println!("✓ Configuration is valid");
    Ok(())
}

pub fn handle_quote(amount: u32) -> anyhow::Result<()> {
    let quote = quote(amount)?;
    let display = quote.display();

    println!("Send:          {}", crate::utils::money::format_usd(&quote.send_amount));
    println!("Commission:    {}", display.commission);
    println!("Total to pay:  {}", display.total_to_pay);
    println!("Receiver gets: {}", display.receiver_gets);
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
