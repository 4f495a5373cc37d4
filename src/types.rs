/// Rank of a participant in a process group (0-indexed).
pub type Rank = u32;

/// Built-in reduction operations.
///
/// Each variant is an [`Operator`](crate::Operator) for every
/// [`Reducible`](crate::Reducible) element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Prod,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
}

impl ReduceOp {
    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u8 = 1;
