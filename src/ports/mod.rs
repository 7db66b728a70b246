pub mod catalog;
pub mod media;
pub mod thumbnail;
