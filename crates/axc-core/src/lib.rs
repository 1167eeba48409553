pub mod config;
pub mod error;
pub mod logging;
pub mod progress;

pub use config::AxcConfig;
pub use error::{AxcError, AxcResult, ErrorStatus};
pub use progress::{CancelToken, Progress};
