mod helpers;
mod reduce;

pub(crate) use reduce::tree_reduce;
