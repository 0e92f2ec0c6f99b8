mod conversation;
mod statement;
mod store;

pub use conversation::*;
pub use statement::*;
pub use store::*;
