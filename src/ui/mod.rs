//! Plain styled output shared by the CLI commands

mod output;

pub use output::{key_value, section, step_info, step_ok, step_ok_detail, step_warn_hint};
