//! References: HEAD, branches and tags, plus their reflogs.

pub mod head;
pub mod store;

pub use head::Head;
pub use store::{is_valid_branch_name, RefStore, RefValue, ResolvedRef};
