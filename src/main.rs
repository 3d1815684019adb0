//! Shoptools CLI

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use shoptools::{
    cart::{Cart, SessionCart},
    checkout::{CheckoutDetails, checkout},
    config::ShopConfig,
    fixtures::Fixture,
    logging::{LogFormat, init_subscriber},
    orders::Address,
    receipt::Receipt,
    session::Session,
};

#[derive(Debug, Parser)]
#[command(name = "shoptools", about = "Shoptools CLI", long_about = None)]
struct Cli {
    /// Shop config YAML file
    #[arg(long, global = true, env = "SHOPTOOLS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overridden by `RUST_LOG`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Price a fixture cart and print the receipt
    Quote(QuoteArgs),

    /// Check out a fixture cart and print the outcome as JSON
    Checkout(CheckoutArgs),
}

#[derive(Debug, Args)]
struct FixtureArgs {
    /// Fixture set name
    #[arg(long, default_value = "demo")]
    set: String,

    /// Directory holding the fixture sets
    #[arg(long, env = "SHOPTOOLS_FIXTURES_DIR", default_value = "./fixtures")]
    fixtures_dir: PathBuf,

    /// Extra voucher code, may be repeated
    #[arg(long = "voucher")]
    vouchers: Vec<String>,

    /// Shipping method slug, overrides the fixture's
    #[arg(long)]
    shipping_option: Option<String>,
}

#[derive(Debug, Args)]
struct QuoteArgs {
    #[command(flatten)]
    fixture: FixtureArgs,

    /// Print the cart summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct CheckoutArgs {
    #[command(flatten)]
    fixture: FixtureArgs,

    /// Shipping address YAML file
    #[arg(long)]
    address: PathBuf,

    /// Delivery instructions
    #[arg(long, default_value = "")]
    delivery_notes: String,
}

fn main() -> anyhow::Result<()> {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ShopConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ShopConfig::default(),
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    init_subscriber(&level, cli.log_format)?;

    match cli.command {
        Commands::Quote(args) => quote(config, &args),
        Commands::Checkout(args) => run_checkout(config, &args),
    }
}

fn load_fixture(config: ShopConfig, args: &FixtureArgs) -> anyhow::Result<Fixture> {
    Fixture::with_base_path(&args.fixtures_dir)
        .with_config(config)
        .load_set(&args.set)
        .with_context(|| format!("failed to load fixture set {}", args.set))
}

fn quote(config: ShopConfig, args: &QuoteArgs) -> anyhow::Result<()> {
    let fixture = load_fixture(config, &args.fixture)?;
    let shop = fixture.shop()?;
    let mut session = Session::new();

    fixture.fill_session(
        &shop,
        &mut session,
        &args.fixture.vouchers,
        args.fixture.shipping_option.clone(),
    )?;

    let cart = SessionCart::load(&shop, &mut session)?;
    let mut out = io::stdout().lock();

    if args.json {
        serde_json::to_writer_pretty(&mut out, &cart.summary()?)?;
        writeln!(out)?;
    } else {
        Receipt::from_cart(&cart)?.write_to(&mut out)?;
    }

    Ok(())
}

fn run_checkout(config: ShopConfig, args: &CheckoutArgs) -> anyhow::Result<()> {
    let fixture = load_fixture(config, &args.fixture)?;
    let shop = fixture.shop()?;
    let mut session = Session::new();

    fixture.fill_session(
        &shop,
        &mut session,
        &args.fixture.vouchers,
        args.fixture.shipping_option.clone(),
    )?;

    let address: Address = serde_norway::from_str(
        &fs::read_to_string(&args.address)
            .with_context(|| format!("failed to read address {}", args.address.display()))?,
    )?;

    let mut cart = SessionCart::load(&shop, &mut session)?;

    let outcome = checkout(
        &shop,
        &mut cart,
        None,
        CheckoutDetails {
            shipping_address: Some(address),
            delivery_notes: args.delivery_notes.clone(),
            ..CheckoutDetails::default()
        },
    )?;

    let mut out = io::stdout().lock();

    serde_json::to_writer_pretty(&mut out, &outcome)?;
    writeln!(out)?;

    Ok(())
}
