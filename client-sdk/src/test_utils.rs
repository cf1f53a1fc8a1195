//! In-process emulator of a signing device, for tests.
//!
//! [`EmulatedDevice`] implements [`Transport`] at the APDU level: it reassembles chunked
//! requests exactly as a device would, derives keys from a BIP-32 seed and signs EIP-155
//! transactions with k256. Switches let tests simulate a user rejecting a signature or the
//! device disappearing from the bus.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bip32::{ChildNumber, XPrv};
use k256::{ecdsa::SigningKey, elliptic_curve::sec1::ToEncodedPoint, PublicKey};

use common::comm::{ACK, CHUNK_LENGTH};
use common::error::Error as AppError;
use common::hash::keccak256;
use common::message::{Request, Response};
use common::types::{Bip32Path, EthAddress, Signature, TransactionFields, MAX_BIP32_PATH_DEPTH};

use crate::apdu::{APDUCommand, StatusWord, CLA, INS_CONTINUE, INS_MESSAGE};
use crate::transport::Transport;

/// Seed of the BIP-39 test mnemonic "abandon abandon ... abandon about", empty passphrase.
///
/// Never use it for real funds.
pub const TEST_SEED: [u8; 64] = [
    0x5e, 0xb0, 0x0b, 0xbd, 0xdc, 0xf0, 0x69, 0x08, 0x48, 0x89, 0xa8, 0xab, 0x91, 0x55, 0x56, 0x81,
    0x65, 0xf5, 0xc4, 0x53, 0xcc, 0xb8, 0x5e, 0x70, 0x81, 0x1a, 0xae, 0xd6, 0xf6, 0xda, 0x5f, 0xc1,
    0x9a, 0x5a, 0xc4, 0x0b, 0x38, 0x9c, 0xd3, 0x70, 0xd0, 0x86, 0x20, 0x6d, 0xec, 0x8a, 0xa6, 0xc4,
    0x3d, 0xae, 0xa6, 0x69, 0x0f, 0x20, 0xad, 0x3d, 0x8d, 0x48, 0xb2, 0xd2, 0xce, 0x9e, 0x38, 0xe4,
];

#[derive(Default)]
struct Session {
    // request bytes received so far, length prefix included
    rx: Vec<u8>,
    // response bytes not yet pulled by the host
    tx: Vec<u8>,
}

pub struct EmulatedDevice {
    seed: [u8; 64],
    session: Mutex<Session>,
    reject_signing: AtomicBool,
    offline: AtomicBool,
    requests_served: AtomicU64,
}

impl Default for EmulatedDevice {
    fn default() -> Self {
        Self::with_seed(TEST_SEED)
    }
}

impl EmulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: [u8; 64]) -> Self {
        Self {
            seed,
            session: Mutex::new(Session::default()),
            reject_signing: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            requests_served: AtomicU64::new(0),
        }
    }

    /// When set, every signing request is answered as if the user pressed "reject".
    pub fn set_reject_signing(&self, reject: bool) {
        self.reject_signing.store(reject, Ordering::SeqCst);
    }

    /// When set, every exchange fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of complete requests the device answered.
    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::SeqCst)
    }

    fn derive_key(&self, path: &Bip32Path) -> Result<SigningKey, AppError> {
        if path.is_empty() || path.len() > MAX_BIP32_PATH_DEPTH {
            return Err(AppError::InvalidDerivationPath);
        }
        let mut xprv = XPrv::new(self.seed).map_err(|_| AppError::KeyDerivationFailed)?;
        for &component in path.as_slice() {
            let child = ChildNumber::new(
                component & !Bip32Path::HARDENED,
                component & Bip32Path::HARDENED != 0,
            )
            .map_err(|_| AppError::InvalidDerivationPath)?;
            xprv = xprv
                .derive_child(child)
                .map_err(|_| AppError::KeyDerivationFailed)?;
        }
        Ok(xprv.private_key().clone())
    }

    fn address_of(&self, path: &Bip32Path) -> Result<EthAddress, AppError> {
        let pubkey: PublicKey = self.derive_key(path)?.verifying_key().into();
        let encoded = pubkey.to_encoded_point(false);
        let hash = keccak256(&encoded.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Ok(address)
    }

    fn sign(&self, path: &Bip32Path, tx: &TransactionFields) -> Result<Signature, AppError> {
        if self.reject_signing.load(Ordering::SeqCst) {
            return Err(AppError::RejectedByUser);
        }
        let key = self.derive_key(path)?;
        let (sig, recid) = key
            .sign_prehash_recoverable(&tx.signing_hash())
            .map_err(|_| AppError::SigningFailed)?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig.r().to_bytes());
        s.copy_from_slice(&sig.s().to_bytes());

        let v = tx
            .chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + recid.to_byte() as u64))
            .ok_or(AppError::InvalidTransaction)?;
        Ok(Signature { v, r, s })
    }

    fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::GetAddress { path } => self.address_of(&path).map(Response::Address),
            Request::GetAddresses { paths } => paths
                .iter()
                .map(|path| self.address_of(path))
                .collect::<Result<Vec<_>, _>>()
                .map(Response::Addresses),
            Request::SignTransaction { path, tx } => self.sign(&path, &tx).map(Response::Signature),
            Request::Exit => Err(AppError::InvalidCommand),
        };
        result.unwrap_or_else(Response::Error)
    }

    fn process_request(&self, raw: &[u8]) -> Result<Vec<u8>, String> {
        let response = match postcard::from_bytes::<Request>(raw) {
            Ok(request) => self.handle(request),
            Err(_) => Response::Error(AppError::InvalidData),
        };
        self.requests_served.fetch_add(1, Ordering::SeqCst);
        postcard::to_allocvec(&response).map_err(|e| e.to_string())
    }
}

fn take_chunk(buf: &mut Vec<u8>) -> Vec<u8> {
    buf.drain(..buf.len().min(CHUNK_LENGTH)).collect()
}

#[async_trait]
impl Transport for EmulatedDevice {
    type Error = String;

    async fn exchange(&self, command: &APDUCommand) -> Result<(StatusWord, Vec<u8>), Self::Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err("device disconnected".to_string());
        }
        if command.cla != CLA {
            return Ok((StatusWord::ClaNotSupported, Vec::new()));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| "session state poisoned".to_string())?;

        match command.ins {
            INS_MESSAGE => {
                if command.data.len() > CHUNK_LENGTH {
                    return Ok((StatusWord::WrongDataLength, Vec::new()));
                }
                session.rx.extend_from_slice(&command.data);
                if session.rx.len() < 4 {
                    return Ok((StatusWord::OK, ACK.to_vec()));
                }
                let expected =
                    u32::from_be_bytes([session.rx[0], session.rx[1], session.rx[2], session.rx[3]])
                        as usize;
                if session.rx.len() < expected + 4 {
                    return Ok((StatusWord::OK, ACK.to_vec()));
                }
                if session.rx.len() > expected + 4 {
                    session.rx.clear();
                    return Ok((StatusWord::IncorrectData, Vec::new()));
                }

                let request = std::mem::take(&mut session.rx);
                let response = self.process_request(&request[4..])?;

                let mut framed = (response.len() as u32).to_be_bytes().to_vec();
                framed.extend_from_slice(&response);
                let first = take_chunk(&mut framed);
                session.tx = framed;
                Ok((StatusWord::OK, first))
            }
            INS_CONTINUE => {
                if session.tx.is_empty() {
                    return Ok((StatusWord::BadState, Vec::new()));
                }
                Ok((StatusWord::OK, take_chunk(&mut session.tx)))
            }
            _ => Ok((StatusWord::InsNotSupported, Vec::new())),
        }
    }
}
