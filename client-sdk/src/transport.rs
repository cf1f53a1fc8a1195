use std::error::Error;
use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};

use crate::apdu::{APDUCommand, StatusWord};

/// Generic trait to abstract the communication layer between the host and a signing device.
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: Debug + Send + Sync;
    async fn exchange(&self, command: &APDUCommand) -> Result<(StatusWord, Vec<u8>), Self::Error>;
}

/// Transport with a Ledger-compatible device over USB HID.
#[cfg(feature = "hid")]
pub struct TransportHID(ledger_transport_hid::TransportNativeHID);

#[cfg(feature = "hid")]
impl TransportHID {
    pub fn new(t: ledger_transport_hid::TransportNativeHID) -> Self {
        Self(t)
    }

    /// Opens the first device found on the USB bus.
    pub fn open_first() -> Result<Self, Box<dyn Error + Send + Sync>> {
        let api = hidapi::HidApi::new()?;
        let transport = ledger_transport_hid::TransportNativeHID::new(&api)?;
        Ok(Self(transport))
    }
}

#[cfg(feature = "hid")]
#[async_trait]
impl Transport for TransportHID {
    type Error = Box<dyn Error + Send + Sync>;
    async fn exchange(&self, cmd: &APDUCommand) -> Result<(StatusWord, Vec<u8>), Self::Error> {
        // HID exchanges are blocking; the device answers within the USB poll interval
        // except while waiting for the user, which is the caller's timeout to bound.
        self.0
            .exchange(&ledger_apdu::APDUCommand {
                cla: cmd.cla,
                ins: cmd.ins,
                p1: cmd.p1,
                p2: cmd.p2,
                data: cmd.data.clone(),
            })
            .map(|answer| {
                (
                    StatusWord::try_from(answer.retcode()).unwrap_or(StatusWord::Unknown),
                    answer.data().to_vec(),
                )
            })
            .map_err(|e| e.into())
    }
}

/// Transport to communicate with the Speculos emulator.
pub struct TransportTcp {
    connection: Mutex<TcpStream>,
    total_exchanges: AtomicU64,
    total_sent: AtomicU64,
    total_received: AtomicU64,
}

impl TransportTcp {
    /// Default Speculos APDU port on localhost.
    pub const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9999);

    /// Create a new TCP transport connecting to the provided socket address.
    pub async fn new(addr: SocketAddr) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let stream = TcpStream::connect(addr).await?;
        log::debug!("connected to emulator at {}", addr);
        Ok(Self {
            connection: Mutex::new(stream),
            total_exchanges: AtomicU64::new(0),
            total_sent: AtomicU64::new(0),
            total_received: AtomicU64::new(0),
        })
    }

    /// Create a new TCP transport using the default Speculos address 127.0.0.1:9999.
    pub async fn new_default() -> Result<Self, Box<dyn Error + Send + Sync>> {
        Self::new(Self::DEFAULT_ADDR).await
    }

    // Number of exchanges made with this instance.
    pub fn total_exchanges(&self) -> u64 {
        self.total_exchanges.load(Ordering::Relaxed)
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent.load(Ordering::Relaxed)
    }

    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for TransportTcp {
    type Error = Box<dyn Error + Send + Sync>;
    async fn exchange(&self, command: &APDUCommand) -> Result<(StatusWord, Vec<u8>), Self::Error> {
        self.total_exchanges.fetch_add(1, Ordering::Relaxed);

        let mut stream = self.connection.lock().await;
        let command_bytes = command.encode();

        let mut req = Vec::with_capacity(command_bytes.len() + 4);
        req.extend_from_slice(&(command_bytes.len() as u32).to_be_bytes());
        req.extend_from_slice(&command_bytes);

        stream.write_all(&req).await?;
        self.total_sent.fetch_add(req.len() as u64, Ordering::Relaxed);

        // Speculos answers with a 4-byte length, the data, then the 2-byte status word.
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut resp = vec![0u8; len + 2];
        stream.read_exact(&mut resp).await?;
        self.total_received
            .fetch_add(4 + resp.len() as u64, Ordering::Relaxed);

        let sw = StatusWord::from_bytes(resp[len], resp[len + 1]);
        resp.truncate(len);
        Ok((sw, resp))
    }
}

/// Wrapper to handle both hid and tcp transport.
pub struct TransportWrapper(Arc<dyn Transport<Error = Box<dyn Error + Send + Sync>> + Sync + Send>);

impl TransportWrapper {
    pub fn new(t: Arc<dyn Transport<Error = Box<dyn Error + Send + Sync>> + Sync + Send>) -> Self {
        Self(t)
    }
}

#[async_trait]
impl Transport for TransportWrapper {
    type Error = Box<dyn Error + Send + Sync>;
    async fn exchange(&self, command: &APDUCommand) -> Result<(StatusWord, Vec<u8>), Self::Error> {
        self.0.exchange(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_framing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut len_buf = [0u8; 4];
            socket.read_exact(&mut len_buf).await.unwrap();
            let mut apdu = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            socket.read_exact(&mut apdu).await.unwrap();

            // echo the APDU data back with a success status word
            let data = &apdu[5..];
            let mut answer = (data.len() as u32).to_be_bytes().to_vec();
            answer.extend_from_slice(data);
            answer.extend_from_slice(&[0x90, 0x00]);
            socket.write_all(&answer).await.unwrap();
        });

        let transport = TransportTcp::new(addr).await.unwrap();
        let (sw, data) = transport
            .exchange(&crate::apdu::apdu_message(vec![1, 2, 3]))
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(sw, StatusWord::OK);
        assert_eq!(data, vec![1, 2, 3]);
        assert_eq!(transport.total_exchanges(), 1);
        assert_eq!(transport.total_sent(), 4 + 8);
        assert_eq!(transport.total_received(), 4 + 5);
    }
}
