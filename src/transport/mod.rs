//! Point-to-point byte transport consumed by the reduction engine.
//!
//! The engine is written strictly against [`Transport`]. Two
//! implementations ship with the crate: [`LocalTransport`] (in-process
//! channels) and [`TcpTransport`] (one TCP stream per peer pair).

mod local;
mod tcp;

pub use local::LocalTransport;
pub use tcp::TcpTransport;

use crate::error::Result;
use crate::types::Rank;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Rank/size discovery plus blocking exchange of whole byte messages.
///
/// Messages between one `(src, dest)` pair are delivered in the order they
/// were sent. A `recv` waits until the matching `send` happened; there is no
/// timeout at this level.
pub trait Transport: Send + Sync {
    /// This process's rank within the group.
    fn rank(&self) -> Rank;

    /// Number of processes in the group.
    fn world_size(&self) -> u32;

    /// Send one message to `dest`.
    fn send<'a>(&'a self, dest: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<()>>;

    /// Receive the next message from `src`.
    fn recv<'a>(&'a self, src: Rank) -> BoxFuture<'a, Result<Vec<u8>>>;

    /// Send `data` to `peer`, then receive `peer`'s next message.
    fn exchange<'a>(&'a self, peer: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.send(peer, data).await?;
            self.recv(peer).await
        })
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn rank(&self) -> Rank {
        (**self).rank()
    }

    fn world_size(&self) -> u32 {
        (**self).world_size()
    }

    fn send<'a>(&'a self, dest: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        (**self).send(dest, data)
    }

    fn recv<'a>(&'a self, src: Rank) -> BoxFuture<'a, Result<Vec<u8>>> {
        (**self).recv(src)
    }

    fn exchange<'a>(&'a self, peer: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>>> {
        (**self).exchange(peer, data)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn rank(&self) -> Rank {
        (**self).rank()
    }

    fn world_size(&self) -> u32 {
        (**self).world_size()
    }

    fn send<'a>(&'a self, dest: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        (**self).send(dest, data)
    }

    fn recv<'a>(&'a self, src: Rank) -> BoxFuture<'a, Result<Vec<u8>>> {
        (**self).recv(src)
    }

    fn exchange<'a>(&'a self, peer: Rank, data: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>>> {
        (**self).exchange(peer, data)
    }
}
