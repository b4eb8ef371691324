pub mod decoder;
pub mod stdin;
pub mod ws_client;

// Re-export commonly used items
pub use decoder::{RawFrame, decode_frame};
pub use ws_client::{FeedStats, OptionChainFeed, SubscribeMessage};
