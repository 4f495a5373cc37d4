use crate::collective::helpers::{collective_recv, collective_send};
use crate::config::ReduceConfig;
use crate::element::Element;
use crate::error::{Result, TreefoldError};
use crate::layout::Partial;
use crate::protocol::codec::{encode_partial, frame_to_partial};
use crate::protocol::decode_frame;
use crate::reduce::Operator;
use crate::transport::Transport;
use crate::types::Rank;

const OPERATION: &str = "reduce";

/// Tree reduce: fold the partial results of all ranks into the root.
///
/// Uses a binomial tree over ranks renumbered relative to the root, with
/// O(log N) steps. Non power-of-two world sizes first fold the excess ranks
/// into the lower power-of-two set.
///
/// Partials are sparse, so ranks may hold different slot sets; the root ends
/// up with the union of all slots, each slot folded over every rank that
/// held it. Returns `Some` on the root and `None` everywhere else.
pub(crate) async fn tree_reduce<T, E, O>(
    transport: &T,
    op: &O,
    local: Partial<E>,
    root: Rank,
    config: &ReduceConfig,
) -> Result<Option<Partial<E>>>
where
    T: Transport + ?Sized,
    E: Element,
    O: Operator<E> + ?Sized,
{
    let world = transport.world_size() as usize;
    let rank = transport.rank() as usize;
    if root as usize >= world {
        return Err(TreefoldError::InvalidRank {
            rank: root,
            world_size: world as u32,
        });
    }
    let root = root as usize;

    if world <= 1 {
        return Ok(Some(local));
    }

    let stride = local.stride();
    let mut acc = local;

    let vrank = (rank + world - root) % world;
    let real = |v: usize| ((v + root) % world) as Rank;

    let p2 = if world.is_power_of_two() {
        world
    } else {
        world.next_power_of_two() >> 1
    };
    let excess = world - p2;

    let mut participating = true;
    if vrank < excess {
        let partner = real(vrank + p2);
        let received = recv_partial::<T, E>(transport, partner, root as Rank, stride, config).await?;
        tracing::trace!(rank, partner, slots = received.len(), "reduce: folded excess rank");
        acc = acc.merge(received, op)?;
    } else if vrank >= p2 {
        let partner = real(vrank - p2);
        send_partial(transport, partner, &acc, root as Rank, config).await?;
        tracing::trace!(rank, partner, "reduce: handed off to lower rank");
        participating = false;
    }

    if participating {
        let log2 = p2.trailing_zeros() as usize;

        for round in 0..log2 {
            let mask = 1 << round;
            let partner = real(vrank ^ mask);
            if vrank & mask != 0 {
                send_partial(transport, partner, &acc, root as Rank, config).await?;
                tracing::trace!(rank, round, partner, "reduce: sent partial to parent");
                break;
            }
            let received =
                recv_partial::<T, E>(transport, partner, root as Rank, stride, config).await?;
            tracing::trace!(rank, round, partner, slots = received.len(), "reduce: folded child");
            acc = acc.merge(received, op)?;
        }
    }

    Ok((rank == root).then_some(acc))
}

async fn send_partial<T, E>(
    transport: &T,
    dest: Rank,
    partial: &Partial<E>,
    root: Rank,
    config: &ReduceConfig,
) -> Result<()>
where
    T: Transport + ?Sized,
    E: Element,
{
    let bytes = encode_partial(partial, root)?;
    collective_send(transport, dest, &bytes, OPERATION, config).await
}

async fn recv_partial<T, E>(
    transport: &T,
    src: Rank,
    root: Rank,
    stride: usize,
    config: &ReduceConfig,
) -> Result<Partial<E>>
where
    T: Transport + ?Sized,
    E: Element,
{
    let bytes = collective_recv(transport, src, OPERATION, config).await?;
    let (_, frame) = decode_frame(&bytes)?;

    if config.verify_agreement {
        let mismatch = if frame.root != root {
            Some(format!("root {} differs from local root {root}", frame.root))
        } else if frame.stride as usize != stride {
            Some(format!(
                "stride {} differs from local stride {stride}",
                frame.stride
            ))
        } else if frame.elem_size as usize != E::SIZE {
            Some(format!(
                "element size {} differs from local element size {}",
                frame.elem_size,
                E::SIZE
            ))
        } else {
            None
        };
        if let Some(reason) = mismatch {
            tracing::warn!(src, %reason, "reduce: peer disagrees about the call");
            return Err(TreefoldError::ProtocolViolation { rank: src, reason });
        }
    }

    frame_to_partial(frame)
}
