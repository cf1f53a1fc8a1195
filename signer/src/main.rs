//! Hardware signer CLI.
//!
//! # Usage
//!
//! ```bash
//! # Address of account 0 on a Speculos emulator
//! hwsigner-cli --tcp 127.0.0.1:9999 address
//!
//! # First page of addresses on a real device
//! hwsigner-cli --hid addresses --from 0 --page-size 5
//!
//! # Sign a transfer with account 2
//! hwsigner-cli --index 2 sign --to 0x3535353535353535353535353535353535353535 \
//!     --value 1000000000000000000 --gas-price 20000000000 --gas-limit 21000 --nonce 0
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use hwsigner::config::{DEFAULT_CHAIN_ID, DEFAULT_DERIVATION_PATH};
use hwsigner::{
    HardwareSigner, OfflineProvider, Quantity, Signer, SignerConfig, TransactionRequest,
};
use sdk::transport::{Transport, TransportTcp, TransportWrapper};
use sdk::DeviceClient;

#[derive(Parser, Debug)]
#[command(
    name = "hwsigner-cli",
    about = "Derive addresses and sign transactions on a hardware wallet"
)]
struct Args {
    /// Address of a Speculos emulator
    #[arg(long, group = "interface", env = "HWSIGNER_TCP")]
    tcp: Option<SocketAddr>,

    /// Use the HID interface for a real device
    #[arg(long, group = "interface")]
    hid: bool,

    #[arg(long, env = "HWSIGNER_CHAIN_ID", default_value_t = DEFAULT_CHAIN_ID)]
    chain_id: u64,

    /// Derivation path template; the address index is appended
    #[arg(long, env = "HWSIGNER_DERIVATION_PATH", default_value = DEFAULT_DERIVATION_PATH)]
    derivation_path: String,

    /// Address index of the active account
    #[arg(long, env = "HWSIGNER_INDEX", default_value_t = 0)]
    index: u32,

    #[clap(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
#[clap(rename_all = "snake_case")]
enum CliCommand {
    /// Print the address of the active account
    Address,
    /// Print a page of addresses
    Addresses {
        #[clap(long)]
        from: Option<u32>,
        #[clap(long)]
        page_size: Option<u32>,
    },
    /// Sign a legacy transaction and print the raw signed transaction
    Sign(SignArgs),
}

#[derive(clap::Args, Debug)]
struct SignArgs {
    #[clap(long)]
    to: Option<String>,
    /// Amount in wei, decimal or 0x hex
    #[clap(long)]
    value: Option<String>,
    #[clap(long)]
    gas_price: String,
    #[clap(long)]
    gas_limit: Option<String>,
    #[clap(long)]
    nonce: Option<String>,
    /// Call data as hex
    #[clap(long)]
    data: Option<String>,
}

fn parse_quantity(s: &str) -> Result<Quantity, String> {
    if s.starts_with("0x") || s.starts_with("0X") {
        return Ok(Quantity::from(s));
    }
    num_bigint::BigUint::parse_bytes(s.as_bytes(), 10)
        .map(Quantity::from)
        .ok_or_else(|| format!("Invalid quantity: {}", s))
}

fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| format!("Invalid hex: {}", e))
}

impl SignArgs {
    fn to_request(&self) -> Result<TransactionRequest, String> {
        let mut request = TransactionRequest::new().gas_price(parse_quantity(&self.gas_price)?);
        if let Some(to) = &self.to {
            request = request.to(to.as_str());
        }
        if let Some(value) = &self.value {
            request = request.value(parse_quantity(value)?);
        }
        if let Some(gas_limit) = &self.gas_limit {
            request = request.gas_limit(parse_quantity(gas_limit)?);
        }
        if let Some(nonce) = &self.nonce {
            request = request.nonce(parse_quantity(nonce)?);
        }
        if let Some(data) = &self.data {
            request = request.data(parse_hex(data)?);
        }
        Ok(request)
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn open_transport(args: &Args) -> Result<TransportWrapper, BoxError> {
    let transport: Arc<dyn Transport<Error = BoxError> + Send + Sync> =
        if args.hid {
            #[cfg(feature = "hid")]
            {
                Arc::new(sdk::transport::TransportHID::open_first()?)
            }
            #[cfg(not(feature = "hid"))]
            {
                return Err("Built without HID support".into());
            }
        } else {
            Arc::new(TransportTcp::new(args.tcp.unwrap_or(TransportTcp::DEFAULT_ADDR)).await?)
        };
    Ok(TransportWrapper::new(transport))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let config = SignerConfig::default()
        .with_chain_id(args.chain_id)
        .with_derivation_path(args.derivation_path.clone())
        .with_address_index(args.index);

    let device = DeviceClient::new(Arc::new(open_transport(&args).await?));
    let signer = HardwareSigner::new(device, Arc::new(OfflineProvider), config);

    match &args.command {
        CliCommand::Address => {
            println!("{}", signer.get_address().await?);
        }
        CliCommand::Addresses { from, page_size } => {
            let from = from.unwrap_or(0);
            let page = signer.try_get_next_addresses(Some(from), *page_size).await?;
            for (i, address) in page.iter().enumerate() {
                println!("{}: {}", from as usize + i, address);
            }
        }
        CliCommand::Sign(sign_args) => {
            let request = sign_args.to_request()?;
            println!("{}", signer.sign(request).await?);
        }
    }
    Ok(())
}
