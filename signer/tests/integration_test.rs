use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hex_literal::hex;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use common::error::Error as AppError;
use common::hash::keccak256;
use common::rlp::{self, RlpItem};
use common::types::{to_checksum_address, Signature, TransactionFields};
use hwsigner::error::ProviderError;
use hwsigner::provider::TxHash;
use hwsigner::{
    HardwareSigner, OfflineProvider, Provider, Quantity, Signer, SignerConfig, SignerError,
    TransactionRequest,
};
use sdk::apdu::APDUCommand;
use sdk::test_utils::EmulatedDevice;
use sdk::transport::{Transport, TransportTcp};
use sdk::{DeviceClient, DeviceError};

const TEST_ADDRESS_0: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
const RECIPIENT: &str = "0x3535353535353535353535353535353535353535";

type EmulatedSigner<P> = HardwareSigner<DeviceClient<EmulatedDevice>, P>;

fn setup<P: Provider>(
    provider: P,
    config: SignerConfig,
) -> (Arc<EmulatedDevice>, EmulatedSigner<P>) {
    let device = Arc::new(EmulatedDevice::new());
    let signer = HardwareSigner::new(
        DeviceClient::new(device.clone()),
        Arc::new(provider),
        config,
    );
    (device, signer)
}

fn string_item<'a>(item: &RlpItem<'a>) -> &'a [u8] {
    item.as_string().expect("string item")
}

fn left_pad(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    out
}

/// Splits a raw legacy transaction into its fields (for `chain_id`) and signature.
fn decode_signed(raw_hex: &str, chain_id: u64) -> (TransactionFields, Signature) {
    let raw = hex::decode(raw_hex.strip_prefix("0x").expect("0x prefix")).unwrap();
    let item = rlp::decode_exact(&raw).unwrap();
    let items = item.as_list().expect("list");
    assert_eq!(items.len(), 9);

    let to = string_item(&items[3]);
    let fields = TransactionFields {
        nonce: string_item(&items[0]).to_vec(),
        gas_price: string_item(&items[1]).to_vec(),
        gas_limit: string_item(&items[2]).to_vec(),
        to: if to.is_empty() {
            None
        } else {
            Some(to.try_into().unwrap())
        },
        value: string_item(&items[4]).to_vec(),
        data: string_item(&items[5]).to_vec(),
        chain_id,
    };
    let signature = Signature {
        v: items[6].as_u64().unwrap(),
        r: left_pad(string_item(&items[7])),
        s: left_pad(string_item(&items[8])),
    };
    (fields, signature)
}

fn recover_signer(fields: &TransactionFields, signature: &Signature) -> String {
    let recid = signature
        .recovery_id(fields.chain_id)
        .expect("v matches the chain");
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);

    let key = VerifyingKey::recover_from_prehash(
        &fields.signing_hash(),
        &EcdsaSignature::from_slice(&rs).unwrap(),
        RecoveryId::from_byte(recid).unwrap(),
    )
    .unwrap();
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    to_checksum_address(&address)
}

#[tokio::test]
async fn test_address_of_test_seed() {
    let (_, signer) = setup(OfflineProvider, SignerConfig::default());
    assert_eq!(signer.get_address().await.unwrap(), TEST_ADDRESS_0);
}

#[tokio::test]
async fn test_sign_round_trip() {
    let (_, signer) = setup(OfflineProvider, SignerConfig::default());

    let request = TransactionRequest::new()
        .to(RECIPIENT)
        .value(1_000_000_000_000_000_000u64)
        .gas_price(20_000_000_000u64)
        .gas_limit(21_000u64);
    let raw = signer.sign(request).await.unwrap();
    assert!(raw.starts_with("0x"));

    let (fields, signature) = decode_signed(&raw, 1);
    assert_eq!(fields.to, Some(hex!("3535353535353535353535353535353535353535")));
    assert_eq!(fields.value, hex!("0de0b6b3a7640000").to_vec());
    assert_eq!(fields.gas_price, hex!("04a817c800").to_vec());
    assert_eq!(fields.gas_limit, hex!("5208").to_vec());
    assert!(fields.nonce.is_empty());
    assert!(signature.v == 37 || signature.v == 38);

    assert_eq!(recover_signer(&fields, &signature), TEST_ADDRESS_0);
}

#[tokio::test]
async fn test_sign_with_configured_chain_and_index() {
    let config = SignerConfig::default().with_chain_id(42);
    let (_, signer) = setup(OfflineProvider, config);
    signer.set_address_index(3);

    let raw = signer
        .sign(TransactionRequest::new().to(RECIPIENT).gas_price("0x3b9aca00"))
        .await
        .unwrap();
    let (fields, signature) = decode_signed(&raw, 42);
    assert!(signature.v == 119 || signature.v == 120);

    let expected = signer.get_address().await.unwrap();
    assert_eq!(recover_signer(&fields, &signature), expected);
    assert_ne!(expected, TEST_ADDRESS_0);
}

#[tokio::test]
async fn test_pages_agree_with_single_fetches() {
    let (device, signer) = setup(OfflineProvider, SignerConfig::default());

    let page = signer.get_next_addresses(None, None).await;
    assert_eq!(page.len(), 5);
    assert_eq!(page[0], TEST_ADDRESS_0);
    assert_eq!(device.requests_served(), 1);

    // served from the cache
    signer.set_address_index(4);
    assert_eq!(signer.get_address().await.unwrap(), page[4]);
    assert_eq!(signer.get_next_addresses(Some(1), Some(3)).await, page[1..4]);
    assert_eq!(device.requests_served(), 1);

    // a fresh signer derives the same addresses one by one
    let (_, fresh) = setup(OfflineProvider, SignerConfig::default());
    for (index, address) in page.iter().enumerate() {
        fresh.set_address_index(index as u32);
        assert_eq!(&fresh.get_address().await.unwrap(), address);
    }
}

#[tokio::test]
async fn test_user_rejection() {
    let (device, signer) = setup(OfflineProvider, SignerConfig::default());
    device.set_reject_signing(true);

    let result = signer
        .sign(TransactionRequest::new().to(RECIPIENT).gas_price(1u64))
        .await;
    assert!(matches!(
        result,
        Err(SignerError::SigningFailed(DeviceError::App(
            AppError::RejectedByUser
        )))
    ));
}

#[tokio::test]
async fn test_offline_device() {
    let (device, signer) = setup(OfflineProvider, SignerConfig::default());
    device.set_offline(true);

    assert!(signer.get_next_addresses(Some(0), Some(3)).await.is_empty());
    assert!(matches!(
        signer.get_address().await,
        Err(SignerError::DeviceUnavailable(_))
    ));

    // back online, the page fetch is not blocked by the failed one
    device.set_offline(false);
    assert_eq!(signer.get_next_addresses(Some(0), Some(3)).await.len(), 3);
}

/// Records broadcast transactions and answers with their hash.
#[derive(Default)]
struct MemoryProvider {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(1)
    }

    async fn gas_price(&self) -> Result<Quantity, ProviderError> {
        Ok(Quantity::from(30_000_000_000u64))
    }

    async fn transaction_count(&self, _address: &str) -> Result<u64, ProviderError> {
        Ok(12)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<Quantity, ProviderError> {
        Ok(Quantity::from(21_000u64))
    }

    async fn send_raw_transaction(&self, raw: &str) -> Result<TxHash, ProviderError> {
        self.sent.lock().unwrap().push(raw.to_string());
        let bytes = hex::decode(raw.trim_start_matches("0x"))?;
        Ok(format!("0x{}", hex::encode(keccak256(&bytes))))
    }
}

#[tokio::test]
async fn test_send_transaction() {
    let (_, signer) = setup(MemoryProvider::default(), SignerConfig::default());

    let hash = signer
        .send_transaction(TransactionRequest::new().to(RECIPIENT).value(1u64))
        .await
        .unwrap();

    let sent = signer.provider().sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let raw = hex::decode(sent[0].trim_start_matches("0x")).unwrap();
    assert_eq!(hash, format!("0x{}", hex::encode(keccak256(&raw))));

    let (fields, signature) = decode_signed(&sent[0], 1);
    assert_eq!(fields.nonce, vec![12]);
    assert_eq!(fields.gas_price, hex!("06fc23ac00").to_vec());
    assert_eq!(fields.value, vec![1]);
    assert_eq!(recover_signer(&fields, &signature), TEST_ADDRESS_0);
}

/// Serves `device` on a local port with the Speculos APDU framing, answering each APDU after
/// `delay`.
async fn serve_over_tcp(device: Arc<EmulatedDevice>, delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        loop {
            let mut len_buf = [0u8; 4];
            if socket.read_exact(&mut len_buf).await.is_err() {
                break;
            }
            let mut apdu = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            socket.read_exact(&mut apdu).await.unwrap();
            let command = APDUCommand {
                cla: apdu[0],
                ins: apdu[1],
                p1: apdu[2],
                p2: apdu[3],
                data: apdu[5..].to_vec(),
            };

            tokio::time::sleep(delay).await;
            let (sw, data) = device.exchange(&command).await.unwrap();

            let mut reply = (data.len() as u32).to_be_bytes().to_vec();
            reply.extend_from_slice(&data);
            reply.extend_from_slice(&sw.to_u16().to_be_bytes());
            if socket.write_all(&reply).await.is_err() {
                break;
            }
        }
    });
    addr
}

#[tokio::test]
async fn test_timed_out_page_does_not_poison_the_next() {
    let addr = serve_over_tcp(Arc::new(EmulatedDevice::new()), Duration::from_millis(100)).await;
    let transport = Arc::new(TransportTcp::new(addr).await.unwrap());
    let signer = HardwareSigner::new(
        DeviceClient::new(transport),
        Arc::new(OfflineProvider),
        SignerConfig::default(),
    );

    let timed_out = tokio::time::timeout(
        Duration::from_millis(30),
        signer.try_get_next_addresses(Some(0), Some(5)),
    )
    .await;
    assert!(timed_out.is_err());

    let page = signer.try_get_next_addresses(Some(5), Some(5)).await.unwrap();

    let (_, reference) = setup(OfflineProvider, SignerConfig::default());
    let expected = reference
        .try_get_next_addresses(Some(0), Some(10))
        .await
        .unwrap();
    assert_eq!(page, expected[5..]);

    // nothing was cached for the abandoned page
    signer.set_address_index(0);
    assert_eq!(signer.get_address().await.unwrap(), TEST_ADDRESS_0);
}
