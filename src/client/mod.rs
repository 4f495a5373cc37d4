mod reducer;
mod sync_reducer;

pub use reducer::Reducer;
pub use sync_reducer::SyncReducer;
