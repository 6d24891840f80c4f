//! Concrete implementations of the pipeline ports for the CLI.

pub mod game_info_store;
pub mod http_engine;
pub mod terminal;
mod throttle;

pub use game_info_store::JsonGameInfoRepository;
pub use http_engine::HttpDownloadEngine;
pub use terminal::ProgressView;
pub use throttle::ProgressThrottle;
