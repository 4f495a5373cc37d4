use crate::error::{Result, TreefoldError};
use crate::transport::Transport;
use crate::types::Rank;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};

/// In-process transport: every rank is a task or thread of the same process.
///
/// [`LocalTransport::mesh`] wires one unbounded channel per ordered
/// `(src, dest)` pair, so sends never block and per-pair ordering holds.
/// Dropping a rank's transport closes its outgoing channels; peers waiting
/// on it get `PeerDisconnected`.
pub struct LocalTransport {
    rank: Rank,
    world_size: u32,
    /// Outgoing channel per destination rank.
    outboxes: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    /// Incoming channel per source rank.
    inboxes: Vec<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl LocalTransport {
    /// Build a fully connected group of `world_size` ranks.
    pub fn mesh(world_size: u32) -> Vec<LocalTransport> {
        let n = world_size as usize;
        let mut outboxes: Vec<Vec<_>> = (0..n).map(|_| Vec::with_capacity(n)).collect();
        let mut inboxes: Vec<Vec<_>> = (0..n).map(|_| Vec::with_capacity(n)).collect();

        // Source-major order leaves each inbox list indexed by source rank.
        for src_out in outboxes.iter_mut() {
            for dest_in in inboxes.iter_mut() {
                let (tx, rx) = mpsc::unbounded_channel();
                src_out.push(tx);
                dest_in.push(Mutex::new(rx));
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalTransport {
                rank: rank as Rank,
                world_size,
                outboxes,
                inboxes,
            })
            .collect()
    }

    fn check_peer(&self, peer: Rank) -> Result<usize> {
        if peer >= self.world_size {
            return Err(TreefoldError::UnknownPeer { rank: peer });
        }
        Ok(peer as usize)
    }
}

impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn send<'a>(&'a self, dest: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let idx = self.check_peer(dest)?;
            self.outboxes[idx]
                .send(data.to_vec())
                .map_err(|_| TreefoldError::PeerDisconnected { rank: dest })
        })
    }

    fn recv<'a>(&'a self, src: Rank) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let idx = self.check_peer(src)?;
            self.inboxes[idx]
                .lock()
                .await
                .recv()
                .await
                .ok_or(TreefoldError::PeerDisconnected { rank: src })
        })
    }
}
