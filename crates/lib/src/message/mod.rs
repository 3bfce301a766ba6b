//! Inbound message chains: typed content segments and their classification.
//!
//! A chain is the ordered list of segments the host delivers with a normal message.
//! Classification is pure so it can be exercised without any event plumbing.

mod chain;
mod classifier;

pub use chain::{MessageChain, MessageType, Segment, SourceMeta};
pub use classifier::{classify, Classification};
