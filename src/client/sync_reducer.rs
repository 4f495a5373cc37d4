use crate::config::ReduceConfig;
use crate::element::Element;
use crate::error::{Result, TreefoldError};
use crate::layout::Layout;
use crate::output::ReduceOutput;
use crate::reduce::Operator;
use crate::transport::{TcpTransport, Transport};
use crate::types::Rank;
use std::net::SocketAddr;

/// Blocking wrapper around [`Reducer`](super::Reducer).
///
/// Owns a `tokio::runtime::Runtime` and calls `block_on()` for each
/// operation, so a call returns only once this process's part of the
/// collective is finished.
pub struct SyncReducer<T> {
    inner: super::Reducer<T>,
    rt: tokio::runtime::Runtime,
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TreefoldError::transport_with_source("tokio runtime", e))
}

impl SyncReducer<TcpTransport> {
    /// Join a TCP mesh as `rank` and return a blocking reducer over it.
    ///
    /// The transport's background readers live on this reducer's runtime.
    pub fn connect(rank: Rank, addrs: &[SocketAddr], config: ReduceConfig) -> Result<Self> {
        let rt = runtime()?;
        let transport = rt.block_on(TcpTransport::connect(rank, addrs))?;
        Ok(Self {
            inner: super::Reducer::with_config(transport, config),
            rt,
        })
    }
}

impl<T: Transport> SyncReducer<T> {
    pub fn new(transport: T) -> Result<Self> {
        Self::from_async(super::Reducer::new(transport))
    }

    pub fn with_config(transport: T, config: ReduceConfig) -> Result<Self> {
        Self::from_async(super::Reducer::with_config(transport, config))
    }

    /// Wrap an existing async reducer with a new tokio runtime.
    pub fn from_async(inner: super::Reducer<T>) -> Result<Self> {
        Ok(Self {
            inner,
            rt: runtime()?,
        })
    }

    pub fn rank(&self) -> Rank {
        self.inner.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.inner.world_size()
    }

    /// See [`Reducer::reduce`](super::Reducer::reduce).
    pub fn reduce<'a, E, O>(
        &self,
        op: &O,
        send: &[E],
        recv: Option<&'a mut [E]>,
        layout: &Layout,
        root: Rank,
    ) -> Result<ReduceOutput<'a, E>>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        self.rt
            .block_on(self.inner.reduce(op, send, recv, layout, root))
    }

    /// See [`Reducer::reduce_in_place`](super::Reducer::reduce_in_place).
    pub fn reduce_in_place<E, O>(
        &self,
        op: &O,
        buf: &mut [E],
        layout: &Layout,
        root: Rank,
    ) -> Result<()>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        self.rt
            .block_on(self.inner.reduce_in_place(op, buf, layout, root))
    }

    /// See [`Reducer::reduce_vec`](super::Reducer::reduce_vec).
    pub fn reduce_vec<E, O>(
        &self,
        op: &O,
        send: &[E],
        recv: &mut Vec<E>,
        layout: &Layout,
        root: Rank,
    ) -> Result<()>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        self.rt
            .block_on(self.inner.reduce_vec(op, send, recv, layout, root))
    }

    /// See [`Reducer::reduce_vec_in_place`](super::Reducer::reduce_vec_in_place).
    pub fn reduce_vec_in_place<E, O>(
        &self,
        op: &O,
        buf: &mut Vec<E>,
        layout: &Layout,
        root: Rank,
    ) -> Result<()>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        self.rt
            .block_on(self.inner.reduce_vec_in_place(op, buf, layout, root))
    }

    pub fn reduce_scalar<E, O>(&self, op: &O, value: E, root: Rank) -> Result<Option<E>>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        self.rt.block_on(self.inner.reduce_scalar(op, value, root))
    }
}
