pub mod content;
pub mod request;
