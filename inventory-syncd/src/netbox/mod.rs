pub mod client;
pub mod slug;
pub mod types;
