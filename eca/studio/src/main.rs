//! `eca-studio` CLI: encode and decode artwork token ids offline, quote prices,
//! mint and draw cellular automaton artwork, or run the interactive shell.

mod shell;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use eca_core::config::{
    DEFAULT_ABI_PATH, ENV_ABI_PATH, ENV_CONTRACT_ADDRESS, ENV_POLL_INTERVAL_MS,
    ENV_RECEIPT_TIMEOUT_SECS, ENV_RPC_URL,
};
use eca_core::{load_dotenv, ArtworkStudio, GenerateRequest, MintPreview, StudioConfig};
use eca_spec::{
    decode_token_id, format_state, Address, Rule, SizeClass, TokenId, TokenParams, Wei,
};
use eca_transport::{ChainClient, HttpFetcher, InMemoryChain, JsonRpcChain};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Cellular automaton artwork studio.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase output verbosity.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Override log level (e.g. info, debug, trace).
    #[arg(long, env = "ECA_LOG_LEVEL", global = true)]
    log_level: Option<String>,
    /// Chain connection flags.
    #[command(flatten)]
    chain: ChainCli,
    /// Subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Chain selection flags.
#[derive(Args, Debug, Clone)]
struct ChainCli {
    /// Chain backend.
    #[arg(long = "chain", value_enum, default_value_t = ChainKind::Rpc, env = "ECA_CHAIN")]
    kind: ChainKind,
    /// JSON-RPC node endpoint.
    #[arg(long, env = ENV_RPC_URL, value_name = "URL")]
    rpc_url: Option<String>,
    /// Deployed artwork contract address.
    #[arg(long, env = ENV_CONTRACT_ADDRESS, value_name = "ADDRESS")]
    contract: Option<String>,
    /// Contract ABI artifact.
    #[arg(long, env = ENV_ABI_PATH, default_value = DEFAULT_ABI_PATH, value_name = "FILE")]
    abi: PathBuf,
    /// Seconds to wait for a mint receipt.
    #[arg(long, env = ENV_RECEIPT_TIMEOUT_SECS, default_value_t = 120)]
    receipt_timeout_secs: u64,
    /// Milliseconds between receipt polls.
    #[arg(long, env = ENV_POLL_INTERVAL_MS, default_value_t = 500)]
    poll_interval_ms: u64,
}

/// Supported chain backends.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ChainKind {
    /// JSON-RPC node.
    Rpc,
    /// In-process chain; state is lost on exit.
    Memory,
}

/// Raw artwork parameters, validated rule first, then state, then size.
#[derive(Args, Debug, Clone)]
struct ParamsArgs {
    /// Elementary automaton rule (0-255).
    #[arg(long, allow_negative_numbers = true)]
    rule: i64,
    /// Initial row as decimal, 0x, 0o or 0b.
    #[arg(long, allow_hyphen_values = true)]
    state: String,
    /// Size class (1-5).
    #[arg(long, allow_negative_numbers = true)]
    size: i64,
}

impl ParamsArgs {
    fn params(&self) -> anyhow::Result<TokenParams> {
        parse_params(self.rule, &self.state, self.size)
    }
}

fn parse_params(rule: i64, state: &str, size: i64) -> anyhow::Result<TokenParams> {
    let rule = Rule::new(rule)?;
    let state = state.parse()?;
    let size = SizeClass::new(size)?;
    Ok(TokenParams::new(rule, state, size))
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the token id for artwork parameters (offline).
    TokenId {
        #[command(flatten)]
        params: ParamsArgs,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Split a token id into its fields (offline).
    Decode {
        /// Token id, decimal or 0x hex.
        token_id: String,
    },
    /// List node accounts.
    Accounts,
    /// Show the base price and per-size minimum payments.
    Price {
        /// Only show the floor for this size class.
        #[arg(long, allow_negative_numbers = true)]
        size: Option<i64>,
    },
    /// Mint an artwork and print its receipt.
    Generate {
        #[command(flatten)]
        params: ParamsArgs,
        /// Paying account; defaults to the node's first account.
        #[arg(long, value_name = "ADDRESS")]
        from: Option<String>,
        /// Payment in ether; defaults to the size-class floor.
        #[arg(long, value_name = "ETHER")]
        payment: Option<String>,
    },
    /// Resolve a token URI and print its content.
    Draw {
        /// Token id, decimal or 0x hex.
        #[arg(long, conflicts_with_all = ["rule", "state", "size"])]
        token_id: Option<String>,
        /// Elementary automaton rule (0-255).
        #[arg(long, allow_negative_numbers = true, required_unless_present = "token_id")]
        rule: Option<i64>,
        /// Initial row as decimal, 0x, 0o or 0b.
        #[arg(long, allow_hyphen_values = true, required_unless_present = "token_id")]
        state: Option<String>,
        /// Size class (1-5).
        #[arg(long, allow_negative_numbers = true, required_unless_present = "token_id")]
        size: Option<i64>,
    },
    /// Launch interactive shell.
    Ui,
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .map(|lvl| lvl.to_ascii_uppercase())
        .map(|lvl| match lvl.as_str() {
            "TRACE" => Level::TRACE,
            "DEBUG" => Level::DEBUG,
            "WARN" => Level::WARN,
            "ERROR" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or_else(|| match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        });
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let applied = load_dotenv(Path::new(".env")).context("loading .env")?;
    let cli = Cli::parse();
    init_tracing(&cli)?;
    debug!(applied, "dotenv variables applied");

    match &cli.command {
        Commands::TokenId { params, json } => return print_token_id(params.params()?, *json),
        Commands::Decode { token_id } => return print_decoded(token_id),
        _ => {}
    }

    let studio = connect(&cli.chain)?;
    match cli.command {
        Commands::TokenId { .. } | Commands::Decode { .. } => {}
        Commands::Accounts => {
            for account in studio.accounts().await? {
                println!("{account}");
            }
        }
        Commands::Price { size: Some(size) } => {
            let size = SizeClass::new(size)?;
            let floor = studio.quote(size).await?;
            println!("size {size}: minimum {} ether", floor.to_ether_string());
        }
        Commands::Price { size: None } => {
            let base = studio.min_price().await?;
            println!("base price {} ether ({base})", base.to_ether_string());
            for (size, floor) in studio.price_table().await? {
                println!("size {size}: minimum {} ether", floor.to_ether_string());
            }
        }
        Commands::Generate {
            params,
            from,
            payment,
        } => {
            let params = params.params()?;
            let from = from
                .as_deref()
                .map(str::parse::<Address>)
                .transpose()
                .context("invalid --from address")?;
            let payment = payment
                .as_deref()
                .map(Wei::from_ether_str)
                .transpose()
                .context("invalid --payment amount")?;
            println!("{}", MintPreview::from(params).message());
            let outcome = studio
                .generate(GenerateRequest {
                    params,
                    from,
                    payment,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome.receipt)?);
        }
        Commands::Draw {
            token_id,
            rule,
            state,
            size,
        } => {
            let token_id = match (token_id, rule, state, size) {
                (Some(id), ..) => id.parse::<TokenId>()?,
                (None, Some(rule), Some(state), Some(size)) => {
                    parse_params(rule, &state, size)?.encode()
                }
                _ => anyhow::bail!("draw needs --token-id or --rule, --state and --size"),
            };
            println!("Drawing {token_id}");
            let art = studio.draw_token(token_id).await?;
            println!("{}", art.uri);
            println!("{}", art.content);
        }
        Commands::Ui => shell::run(studio).await?,
    }
    Ok(())
}

fn connect(chain: &ChainCli) -> anyhow::Result<ArtworkStudio> {
    let client: Arc<dyn ChainClient> = match chain.kind {
        ChainKind::Memory => Arc::new(InMemoryChain::with_defaults()),
        ChainKind::Rpc => {
            let config = StudioConfig {
                rpc_url: chain.rpc_url.clone().unwrap_or_default(),
                contract_address: chain.contract.clone().unwrap_or_default(),
                abi_path: chain.abi.clone(),
                poll_interval: Duration::from_millis(chain.poll_interval_ms),
                receipt_timeout: Duration::from_secs(chain.receipt_timeout_secs),
            };
            let settings = config.rpc_settings()?;
            let abi = config.load_abi()?;
            debug!(endpoint = %settings.endpoint, contract = %settings.contract, "connecting");
            Arc::new(JsonRpcChain::new(settings, abi))
        }
    };
    Ok(ArtworkStudio::new(client, Arc::new(HttpFetcher::new())))
}

fn print_token_id(params: TokenParams, json: bool) -> anyhow::Result<()> {
    let preview = MintPreview::from(params);
    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }
    let sizing = params.sizing();
    println!("token id    {} ({:#x})", preview.token_id, preview.token_id.get());
    println!("draw size   {}", sizing.draw_size);
    println!("state mask  {:#x}", sizing.state_mask);
    println!("state bits  {}", preview.state_bits);
    Ok(())
}

fn print_decoded(raw: &str) -> anyhow::Result<()> {
    let token_id: TokenId = raw.parse()?;
    let decoded = decode_token_id(token_id);
    println!("rule        {}", decoded.rule);
    println!("size class  {}", decoded.size_class);
    println!("state       {}", decoded.state);
    match decoded.params() {
        Ok(params) => {
            let draw_size = params.sizing().draw_size;
            println!("state bits  {}", format_state(decoded.state, draw_size));
            if params.encode() != token_id {
                println!("note        state exceeds {draw_size} bits; id is not canonical");
            }
        }
        Err(err) => println!("invalid     {err}"),
    }
    Ok(())
}
