use crate::collective::tree_reduce;
use crate::config::ReduceConfig;
use crate::element::Element;
use crate::error::{Result, TreefoldError};
use crate::layout::{Layout, Partial};
use crate::output::{ReduceOutput, allocate, check_capacity, check_usage, grow};
use crate::reduce::Operator;
use crate::transport::Transport;
use crate::types::Rank;

/// The async API for reducing buffers to a root process.
///
/// Every method is a collective: all processes of the group must call the
/// same method with the same `root`, stride and operator, each with its own
/// send data. Only the root observes the folded result.
///
/// Errors detected locally (bad layout, buffer too small, nothing to reduce)
/// are returned on the detecting process alone. Peers are not told and may
/// wait forever for its contribution unless a collective timeout is set in
/// [`ReduceConfig`].
///
/// # Example
///
/// ```no_run
/// use treefold::{Layout, LocalTransport, ReduceOp, Reducer};
///
/// # async fn example() -> treefold::Result<()> {
/// let mut handles = Vec::new();
/// for transport in LocalTransport::mesh(4) {
///     handles.push(tokio::spawn(async move {
///         let reducer = Reducer::new(transport);
///         let send = [reducer.rank() as i64 + 1; 3];
///         let out = reducer
///             .reduce(&ReduceOp::Sum, &send, None, &Layout::dense(3), 0)
///             .await?;
///         Ok::<_, treefold::TreefoldError>(out.into_allocated())
///     }));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Reducer<T> {
    transport: T,
    config: ReduceConfig,
}

impl<T: Transport> Reducer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ReduceConfig::default())
    }

    pub fn with_config(transport: T, config: ReduceConfig) -> Self {
        Self { transport, config }
    }

    /// This process's rank (0-indexed).
    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    /// Total number of processes in the group.
    pub fn world_size(&self) -> u32 {
        self.transport.world_size()
    }

    pub fn config(&self) -> &ReduceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reduce `send` into the root's receive buffer.
    ///
    /// With `recv = None` the root gets a freshly allocated buffer of exactly
    /// the output extent and every other process gets [`ReduceOutput::Null`].
    /// With `recv = Some(buf)` the root fills `buf`, which must already hold
    /// the output extent, and other processes get `buf` back untouched.
    pub async fn reduce<'a, E, O>(
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
        let is_root = self.prepare(layout, root, send.len(), recv.as_deref().map(<[E]>::len))?;
        if is_root && let Some(buf) = recv.as_deref() {
            check_capacity(layout.local_output_len()?, buf.len())?;
        }
        tracing::debug!(
            rank = self.rank(),
            root,
            op = op.name(),
            count = layout.count(),
            stride = layout.stride(),
            "reduce: start"
        );

        let folded = self.fold(op, layout.gather(send)?, root).await?;
        let out = match (folded, recv) {
            (None, None) => ReduceOutput::Null,
            (None, Some(buf)) => ReduceOutput::Provided(buf),
            (Some(result), Some(buf)) => {
                layout.scatter(&result, buf)?;
                ReduceOutput::Provided(buf)
            }
            (Some(result), None) => {
                let mut buf = allocate(layout.output_len(result.slots())?)?;
                layout.scatter(&result, &mut buf)?;
                ReduceOutput::Allocated(buf)
            }
        };

        tracing::debug!(rank = self.rank(), root, "reduce: done");
        Ok(out)
    }

    /// Reduce with the send data and receive buffer being the same slice.
    ///
    /// The local contribution is read before anything is written. On the root
    /// the slice is overwritten with the result and must be large enough for
    /// it; everywhere else it is left unchanged.
    pub async fn reduce_in_place<E, O>(
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
        let is_root = self.prepare(layout, root, buf.len(), Some(buf.len()))?;
        if is_root {
            check_capacity(layout.local_output_len()?, buf.len())?;
        }
        tracing::debug!(
            rank = self.rank(),
            root,
            op = op.name(),
            count = layout.count(),
            "reduce_in_place: start"
        );

        let local = layout.gather(buf)?;
        if let Some(result) = self.fold(op, local, root).await? {
            layout.scatter(&result, buf)?;
        }
        Ok(())
    }

    /// Reduce `send` into a growable output vector.
    ///
    /// On the root `recv` is grown to the output extent when it is shorter
    /// (an empty vector ends up with exactly that length) and then filled.
    /// Other processes leave `recv` as it was.
    pub async fn reduce_vec<E, O>(
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
        self.prepare(layout, root, send.len(), Some(recv.len()))?;
        tracing::debug!(
            rank = self.rank(),
            root,
            op = op.name(),
            count = layout.count(),
            "reduce_vec: start"
        );

        let local = layout.gather(send)?;
        if let Some(result) = self.fold(op, local, root).await? {
            store(layout, &result, recv)?;
        }
        Ok(())
    }

    /// [`reduce_vec`](Self::reduce_vec) where the output vector also holds the
    /// send data.
    pub async fn reduce_vec_in_place<E, O>(
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
        self.prepare(layout, root, buf.len(), Some(buf.len()))?;
        tracing::debug!(
            rank = self.rank(),
            root,
            op = op.name(),
            count = layout.count(),
            "reduce_vec_in_place: start"
        );

        let local = layout.gather(buf)?;
        if let Some(result) = self.fold(op, local, root).await? {
            store(layout, &result, buf)?;
        }
        Ok(())
    }

    /// Reduce one value per process. Returns `Some` on the root.
    pub async fn reduce_scalar<E, O>(&self, op: &O, value: E, root: Rank) -> Result<Option<E>>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        let out = self
            .reduce(op, &[value], None, &Layout::dense(1), root)
            .await?;
        Ok(out.into_allocated().and_then(|v| v.first().copied()))
    }

    /// Checks shared by every call shape. Returns whether this process is
    /// the root.
    fn prepare(
        &self,
        layout: &Layout,
        root: Rank,
        send_len: usize,
        recv_len: Option<usize>,
    ) -> Result<bool> {
        layout.validate()?;
        let world_size = self.world_size();
        if root >= world_size {
            return Err(TreefoldError::InvalidRank {
                rank: root,
                world_size,
            });
        }
        check_usage(send_len, recv_len)?;
        Ok(self.rank() == root)
    }

    async fn fold<E, O>(&self, op: &O, local: Partial<E>, root: Rank) -> Result<Option<Partial<E>>>
    where
        E: Element,
        O: Operator<E> + ?Sized,
    {
        tree_reduce(&self.transport, op, local, root, &self.config).await
    }
}

/// Root side of the vector forms: size the vector, then write the result.
fn store<E: Element>(layout: &Layout, result: &Partial<E>, out: &mut Vec<E>) -> Result<()> {
    grow(out, layout.output_len(result.slots())?)?;
    layout.scatter(result, out)
}
