pub mod conversation;
pub mod fragment;
pub mod framing;
pub mod jsonl;
pub mod record;

pub use conversation::*;
pub use fragment::*;
pub use framing::Framing;
pub use record::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
