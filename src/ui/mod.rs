//! UI module for consistent CLI output
//!
//! Uses `cliclack` framing with automatic fallback to plain output in
//! CI/non-interactive environments. The pipeline usually runs in CI, so the
//! plain path is the one most users see.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    captured_block, intro, key_value, key_value_status, outro_error, outro_success, remark,
    section, step_error, step_info, step_ok, step_warn_hint,
};
pub use progress::{StageProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, PipelineTheme};
