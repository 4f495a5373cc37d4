pub mod client;
mod collective;
pub mod config;
pub mod element;
pub mod error;
pub mod layout;
pub mod output;
pub mod protocol;
pub mod reduce;
pub mod transport;
pub mod types;

pub use client::{Reducer, SyncReducer};
pub use config::ReduceConfig;
pub use element::Element;
pub use error::{Result, TreefoldError};
pub use layout::{IndexMap, Layout, Partial};
pub use output::ReduceOutput;
pub use reduce::{FnOp, Operator, Reducible, from_fn};
pub use transport::{LocalTransport, TcpTransport, Transport};
pub use types::{Rank, ReduceOp};
