//! Thin demonstration front-end over `zclassic-light-core`.
//!
//! Exercises the library's public surface: ingest a hex-encoded chunk of
//! headers into a datadir-rooted store, print a header by height, decode a
//! raw transaction, and parse a payment URI. This is not a wallet; it owns
//! no keys and does no network I/O of its own.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zclassic_light_core::checkpoints::CheckpointTable;
use zclassic_light_core::params::Network;
use zclassic_light_core::{ChainStore, Transaction};

#[derive(Parser, Debug)]
#[command(
    name = "zclassic-core-cli",
    version,
    about = "Demonstration harness for the ZClassic light-wallet chain core"
)]
struct Cli {
    /// Directory holding `blockchain_headers` and `forks/`.
    #[arg(long, global = true, default_value = "./headers")]
    datadir: PathBuf,

    /// Which network's consensus constants to use.
    #[arg(long, global = true, value_enum, default_value = "mainnet")]
    network: NetworkArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum NetworkArg {
    Mainnet,
    Testnet,
    Regtest,
}

impl From<NetworkArg> for Network {
    fn from(n: NetworkArg) -> Network {
        match n {
            NetworkArg::Mainnet => Network::Mainnet,
            NetworkArg::Testnet => Network::Testnet,
            NetworkArg::Regtest => Network::Regtest,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify and persist a contiguous run of hex-encoded headers.
    IngestChunk {
        /// Checkpoint (first height) of the branch this chunk extends.
        #[arg(long, default_value_t = 0)]
        branch: i64,
        /// Height of the first header in `hex`.
        #[arg(long)]
        start_height: i64,
        /// Concatenated wire-format headers, hex-encoded.
        hex: String,
    },
    /// Print a header at a given height, by its display hash.
    ShowHeader {
        #[arg(long)]
        branch: i64,
        height: i64,
    },
    /// Decode a raw transaction and print a summary.
    DecodeTx { hex: String },
    /// Parse a `zcash:` payment URI.
    ParseUri { uri: String },
}

fn init_logging() {
    use log4rs::append::console::ConsoleAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {l} [{T}] {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(log::LevelFilter::Info))
        .expect("static log4rs config is always valid");
    let _ = log4rs::init_config(config);
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let network: Network = cli.network.into();

    if let Err(err) = run(cli.datadir, network, cli.command) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(datadir: PathBuf, network: Network, command: Command) -> Result<(), String> {
    match command {
        Command::IngestChunk {
            branch: branch_checkpoint,
            start_height,
            hex: hex_str,
        } => {
            let bytes = hex::decode(hex_str.trim()).map_err(|e| e.to_string())?;
            let store = ChainStore::open(datadir, network, CheckpointTable::default())
                .map_err(|e| e.to_string())?;
            let branch = store
                .branch(branch_checkpoint)
                .ok_or_else(|| format!("no branch at checkpoint {}", branch_checkpoint))?;
            let headers =
                zclassic_light_core::verify::verify_chunk(&store, &branch, start_height, &bytes)
                    .map_err(|e| e.to_string())?;
            store
                .save_chunk(branch_checkpoint, start_height, &bytes)
                .map_err(|e| e.to_string())?;
            log::info!(
                "ingested {} header(s) starting at height {} on branch {}",
                headers.len(),
                start_height,
                branch_checkpoint
            );
            for (i, header) in headers.iter().enumerate() {
                println!("{}: {}", start_height + i as i64, header.hash_hex());
            }
            Ok(())
        }
        Command::ShowHeader {
            branch: branch_checkpoint,
            height,
        } => {
            let store = ChainStore::open(datadir, network, CheckpointTable::default())
                .map_err(|e| e.to_string())?;
            let branch = store
                .branch(branch_checkpoint)
                .ok_or_else(|| format!("no branch at checkpoint {}", branch_checkpoint))?;
            match store.read_header(&branch, height).map_err(|e| e.to_string())? {
                Some(header) => {
                    println!("height: {}", height);
                    println!("hash: {}", header.hash_hex());
                    println!("prev: {}", hex::encode(header.prev_block_hash));
                    println!("bits: {:#010x}", header.bits);
                    println!("timestamp: {}", header.timestamp);
                    Ok(())
                }
                None => Err(format!("no header at height {}", height)),
            }
        }
        Command::DecodeTx { hex: hex_str } => {
            let bytes = hex::decode(hex_str.trim()).map_err(|e| e.to_string())?;
            let tx = Transaction::deserialize(&bytes, network).map_err(|e| e.to_string())?;
            println!("version: {}", tx.version);
            println!("overwintered: {}", tx.is_overwintered());
            println!("inputs: {}", tx.inputs.len());
            println!("outputs: {}", tx.outputs.len());
            println!("lock_time: {}", tx.lock_time);
            for (i, output) in tx.outputs.iter().enumerate() {
                println!(
                    "  out[{}]: value={} kind={:?}",
                    i, output.value, output.kind
                );
            }
            Ok(())
        }
        Command::ParseUri { uri } => {
            let parsed = zclassic_light_core::uri::parse(&uri).map_err(|e| e.to_string())?;
            println!("address: {}", parsed.address);
            if let Some(amount) = parsed.amount {
                println!(
                    "amount: {} ({})",
                    amount,
                    zclassic_light_core::format::format_satoshis(amount, false)
                );
            }
            if let Some(label) = parsed.label {
                println!("label: {}", label);
            }
            if let Some(message) = parsed.message {
                println!("message: {}", message);
            }
            Ok(())
        }
    }
}
