pub mod acquisition;
pub mod audio_library;
pub mod media_acquirer;
pub mod piped;
pub mod provider_selector;
pub mod range_server;
pub mod search;
pub mod thumbnail;
pub mod ytdlp;
