mod adapter;

pub use adapter::{GmailAdapter, GmailConfig};
