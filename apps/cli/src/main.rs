//! PayStream CLI
//!
//! Demo and diagnostic surface for the payment session engine. The demo
//! walks the full session lifecycle (create, pay, close, settle) and
//! works without a reachable coordinator by falling back to local-only
//! mode.

use std::collections::HashMap;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use paystream_core::{format_usdc, parse_usdc, Chain, PayStreamConfig};
use paystream_engine::{PaymentEngine, SettlementTarget};
use paystream_profile::{record_keys, ProfileRecord, StaticDirectory};
use paystream_settlement::MockBridge;
use paystream_signer::LocalSigner;

/// PayStream - Instant off-chain payment sessions
#[derive(Parser)]
#[command(name = "paystream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Coordinator WebSocket URL (falls back to local-only mode when
    /// unreachable)
    #[arg(long)]
    coordinator: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full session lifecycle against a demo payee
    Demo {
        /// Session deposit in USDC
        #[arg(short, long, default_value = "100")]
        deposit: String,

        /// Payment amounts in USDC, applied in order
        #[arg(short, long, default_values_t = vec!["30".to_string(), "20".to_string()])]
        pay: Vec<String>,

        /// Settlement target chain
        #[arg(short, long, default_value = "polygon")]
        chain: String,
    },

    /// List supported settlement chains
    Chains,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo { deposit, pay, chain } => run_demo(cli.coordinator, deposit, pay, chain).await,
        Commands::Chains => {
            for chain in Chain::all() {
                println!(
                    "{:<12} chain_id={:<10} usdc={}",
                    chain.key(),
                    chain.chain_id(),
                    chain.usdc_address()
                );
            }
            Ok(())
        }
    }
}

async fn run_demo(
    coordinator: Option<String>,
    deposit: String,
    pay: Vec<String>,
    chain: String,
) -> Result<()> {
    let deposit = parse_usdc(&deposit)?;
    let target_chain = Chain::from_key(&chain)
        .ok_or_else(|| anyhow::anyhow!("unknown chain: {chain}"))?;

    let mut config = PayStreamConfig::default();
    if let Some(url) = coordinator {
        config.coordinator.ws_url = url;
    }

    let mut directory = StaticDirectory::new();
    let mut records = HashMap::new();
    records.insert(record_keys::RATE.to_string(), "75".to_string());
    records.insert(
        record_keys::SERVICES.to_string(),
        "Web Development, Smart Contracts".to_string(),
    );
    records.insert(record_keys::CHAIN.to_string(), target_chain.key().to_string());
    records.insert(record_keys::AVAILABLE.to_string(), "true".to_string());
    directory.insert(ProfileRecord::from_records(
        "demo-freelancer.pay",
        "0xdemofreelancer",
        &records,
    ));

    let engine = PaymentEngine::new(
        "0xdemopayer".to_string(),
        LocalSigner::generate(),
        config,
        MockBridge::new(),
    );

    engine.connect().await;
    if engine.simulated() {
        info!("coordinator unreachable; running in local-only (simulated) mode");
    }

    let (session, profile) = engine
        .create_session_for(&directory, "demo-freelancer.pay", deposit)
        .await?;
    println!(
        "session {} opened with {} USDC for {} (rate ${}/hr)",
        session.id,
        format_usdc(deposit),
        profile.name,
        profile.rate
    );

    for raw in pay {
        let amount = parse_usdc(&raw)?;
        let payment = engine.send_payment(&session.id, amount).await?;
        let balance = engine.balance(&session.id)?;
        println!(
            "paid {} USDC ({}), balance now {} / {}",
            format_usdc(amount),
            payment.id,
            format_usdc(balance[0].amount),
            format_usdc(balance[1].amount),
        );
    }

    println!(
        "closing session, settling to {} (est. {})",
        target_chain,
        engine.settlement_estimate(target_chain),
    );
    let closed = engine
        .close_session(&session.id, SettlementTarget::from(target_chain))
        .await?;

    println!("session {}: {}", closed.id, closed.status);
    if let Some(outcome) = &closed.settlement {
        if let Some(source) = &outcome.source_ref {
            println!("  source ref:      {source}");
        }
        if let Some(dest) = &outcome.destination_ref {
            println!("  destination ref: {dest}");
        }
        if let Some(error) = &outcome.error {
            println!("  error:           {error}");
        }
    }
    for payment in engine.payments(&session.id) {
        println!(
            "  payment {} {} USDC [{}]",
            payment.id,
            format_usdc(payment.amount),
            match payment.status {
                paystream_core::PaymentStatus::Pending => "pending",
                paystream_core::PaymentStatus::Confirmed => "confirmed",
                paystream_core::PaymentStatus::Settled => "settled",
            }
        );
    }

    Ok(())
}
