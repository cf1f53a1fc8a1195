//! Sends a request to the device and collects its response over APDUs.
//!
//! A request is prefixed with its 4-byte big-endian length and split in chunks of
//! `CHUNK_LENGTH` bytes, each carried by an `INS_MESSAGE` APDU. The device answers every
//! chunk but the last with `ACK`. Its answer to the last chunk starts with the 4-byte length
//! of the response; further response chunks are pulled with `INS_CONTINUE`.

use std::fmt::Debug;

use common::comm::{ACK, CHUNK_LENGTH};

use crate::apdu::{apdu_continue, apdu_message, StatusWord};
use crate::transport::Transport;

/// Error types that can occur during message transmission.
#[derive(Debug)]
pub enum SendMessageError {
    /// Error when an ACK was expected but a different message was received.
    NotAckReceived,
    /// Error returned when the response is less than the expected 4 bytes.
    ResponseTooShort,
    /// The device answered with a status word other than OK.
    UnexpectedStatus(StatusWord),
    /// The transport failed.
    Transport(String),
}

impl core::fmt::Display for SendMessageError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            SendMessageError::NotAckReceived => write!(f, "ACK was expected but not received"),
            SendMessageError::ResponseTooShort => write!(f, "Response shorter than 4 bytes"),
            SendMessageError::UnexpectedStatus(sw) => {
                write!(f, "Unexpected status word {:04X}", sw.to_u16())
            }
            SendMessageError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl core::error::Error for SendMessageError {}

async fn exchange_ok<T: Transport + ?Sized>(
    transport: &T,
    apdu: &crate::apdu::APDUCommand,
) -> Result<Vec<u8>, SendMessageError> {
    let (status, data) = transport
        .exchange(apdu)
        .await
        .map_err(|e| SendMessageError::Transport(format!("{:?}", e)))?;
    if status != StatusWord::OK {
        return Err(SendMessageError::UnexpectedStatus(status));
    }
    Ok(data)
}

/// Sends `message` and returns the complete response.
///
/// # Errors
///
/// * `NotAckReceived` if a chunk other than the last is not acknowledged.
/// * `ResponseTooShort` if the answer to the last chunk lacks the length prefix.
/// * `UnexpectedStatus` if any APDU fails on the device.
/// * `Transport` if the underlying transport fails.
pub async fn send_message<T: Transport + ?Sized>(
    transport: &T,
    message: &[u8],
) -> Result<Vec<u8>, SendMessageError> {
    let mut full_message: Vec<u8> = Vec::with_capacity(message.len() + 4);
    full_message.extend_from_slice(&(message.len() as u32).to_be_bytes());
    full_message.extend_from_slice(message);

    let mut resp = ACK.to_vec();
    for chunk in full_message.chunks(CHUNK_LENGTH) {
        if resp != ACK {
            return Err(SendMessageError::NotAckReceived);
        }
        resp = exchange_ok(transport, &apdu_message(chunk.to_vec())).await?;
    }

    if resp.len() < 4 {
        return Err(SendMessageError::ResponseTooShort);
    }
    let response_data_len = u32::from_be_bytes([resp[0], resp[1], resp[2], resp[3]]) as usize;

    let mut response_data = resp[4..].to_vec();
    while response_data.len() < response_data_len {
        let resp = exchange_ok(transport, &apdu_continue()).await?;
        if resp.is_empty() {
            return Err(SendMessageError::ResponseTooShort);
        }
        response_data.extend_from_slice(&resp);
    }
    response_data.truncate(response_data_len);
    Ok(response_data)
}
