// Library surface shared by the binary and the integration tests.
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_log;
pub mod history;
pub mod keybinds;
pub mod runs;
pub mod runtime;
pub mod split;
pub mod storage;
pub mod timer;
pub mod ui;

pub use app::App;
pub use error::TimerError;
pub use timer::{Action, SplitTimer, TimerState, TimerStatus};
