use crate::error::{Result, TreefoldError};
use crate::transport::Transport;
use crate::types::Rank;
use futures::future::BoxFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};

/// Maximum accepted frame size (4 GiB).
const MAX_FRAME_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Connection attempts to a lower rank before giving up.
const CONNECT_ATTEMPTS: u32 = 50;

/// Pause between connection attempts.
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

/// One end of a peer link.
struct PeerLink {
    writer: Mutex<OwnedWriteHalf>,
    inbox: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    recv_handle: tokio::task::JoinHandle<()>,
}

/// Full-mesh TCP transport.
///
/// Every pair of ranks shares one stream carrying `[len: u64 LE][payload]`
/// frames. A background task per peer reads frames into a channel, so a
/// `send` never waits for the peer to call `recv`.
///
/// Mesh formation: rank `r` listens on `addrs[r]`, connects to every lower
/// rank and accepts a connection from every higher rank. Each connecting
/// side announces its rank with a 4-byte little-endian handshake.
pub struct TcpTransport {
    rank: Rank,
    world_size: u32,
    /// Indexed by peer rank; `None` at our own rank.
    peers: Vec<Option<PeerLink>>,
}

impl TcpTransport {
    /// Join the mesh described by `addrs` as `rank`.
    ///
    /// All ranks must call this with the same address list.
    pub async fn connect(rank: Rank, addrs: &[SocketAddr]) -> Result<Self> {
        let own = addrs
            .get(rank as usize)
            .ok_or(TreefoldError::InvalidRank {
                rank,
                world_size: addrs.len() as u32,
            })?;
        let listener = TcpListener::bind(*own)
            .await
            .map_err(|e| TreefoldError::transport_with_source(format!("bind {own}"), e))?;
        Self::from_listener(rank, listener, addrs).await
    }

    /// Build a loopback mesh of `world_size` ranks inside this process.
    pub async fn bootstrap_local(world_size: u32) -> Result<Vec<Self>> {
        let mut listeners = Vec::with_capacity(world_size as usize);
        let mut addrs = Vec::with_capacity(world_size as usize);
        for _ in 0..world_size {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            addrs.push(listener.local_addr()?);
            listeners.push(listener);
        }

        let addrs = &addrs;
        futures::future::try_join_all(
            listeners
                .into_iter()
                .enumerate()
                .map(|(rank, listener)| Self::from_listener(rank as Rank, listener, addrs)),
        )
        .await
    }

    async fn from_listener(
        rank: Rank,
        listener: TcpListener,
        addrs: &[SocketAddr],
    ) -> Result<Self> {
        let world_size = addrs.len() as u32;
        let mut peers: Vec<Option<PeerLink>> = (0..addrs.len()).map(|_| None).collect();

        for (peer, addr) in addrs.iter().enumerate().take(rank as usize) {
            let mut stream = connect_with_retry(*addr).await?;
            stream.write_all(&rank.to_le_bytes()).await?;
            tracing::trace!(rank, peer, %addr, "tcp mesh: connected");
            peers[peer] = Some(PeerLink::new(stream)?);
        }

        for _ in (rank + 1)..world_size {
            let (mut stream, from) = listener.accept().await?;
            let mut hello = [0u8; 4];
            stream.read_exact(&mut hello).await?;
            let peer = Rank::from_le_bytes(hello);
            let slot = peers
                .get_mut(peer as usize)
                .filter(|_| peer > rank)
                .ok_or(TreefoldError::UnknownPeer { rank: peer })?;
            if slot.is_some() {
                return Err(TreefoldError::transport(format!(
                    "duplicate connection from rank {peer} ({from})"
                )));
            }
            tracing::trace!(rank, peer, %from, "tcp mesh: accepted");
            *slot = Some(PeerLink::new(stream)?);
        }

        tracing::debug!(rank, world_size, "tcp mesh formed");
        Ok(Self {
            rank,
            world_size,
            peers,
        })
    }

    fn link(&self, peer: Rank) -> Result<&PeerLink> {
        self.peers
            .get(peer as usize)
            .and_then(Option::as_ref)
            .ok_or(TreefoldError::UnknownPeer { rank: peer })
    }
}

impl PeerLink {
    fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        let recv_handle = tokio::spawn(recv_loop(reader, tx));
        Ok(Self {
            writer: Mutex::new(writer),
            inbox: Mutex::new(rx),
            recv_handle,
        })
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.recv_handle.abort();
    }
}

async fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream> {
    let mut attempt = 0;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt + 1 < CONNECT_ATTEMPTS => {
                tracing::trace!(%addr, attempt, error = %e, "tcp mesh: connect retry");
                attempt += 1;
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
            Err(e) => {
                return Err(TreefoldError::transport_with_source(
                    format!("connect {addr} after {CONNECT_ATTEMPTS} attempts"),
                    e,
                ));
            }
        }
    }
}

/// Background loop: read frames from one peer into its inbox.
async fn recv_loop(mut reader: OwnedReadHalf, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut len_buf = [0u8; 8];
    loop {
        if let Err(e) = reader.read_exact(&mut len_buf).await {
            tracing::debug!("tcp recv loop ended: {e}");
            return;
        }
        let len = u64::from_le_bytes(len_buf);
        if len > MAX_FRAME_SIZE {
            tracing::warn!(len, "tcp: frame too large, closing connection");
            return;
        }

        let mut payload = vec![0u8; len as usize];
        if let Err(e) = reader.read_exact(&mut payload).await {
            tracing::debug!("tcp recv loop ended reading payload: {e}");
            return;
        }
        if tx.send(payload).is_err() {
            return;
        }
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn send<'a>(&'a self, dest: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let link = self.link(dest)?;
            let mut writer = link.writer.lock().await;
            writer
                .write_all(&(data.len() as u64).to_le_bytes())
                .await
                .map_err(|e| TreefoldError::transport(format!("tcp write len: {e}")))?;
            writer
                .write_all(data)
                .await
                .map_err(|e| TreefoldError::transport(format!("tcp write payload: {e}")))?;
            writer
                .flush()
                .await
                .map_err(|e| TreefoldError::transport(format!("tcp flush: {e}")))?;
            Ok(())
        })
    }

    fn recv<'a>(&'a self, src: Rank) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let link = self.link(src)?;
            link.inbox
                .lock()
                .await
                .recv()
                .await
                .ok_or(TreefoldError::PeerDisconnected { rank: src })
        })
    }
}
