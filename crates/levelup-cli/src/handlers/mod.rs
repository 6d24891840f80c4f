//! Command handlers.
//!
//! Handlers follow the pattern `pub async fn execute(ctx: &CliContext, ...)`:
//! they turn CLI input into pipeline calls and format the results for the
//! terminal. Pipeline behaviour stays in levelup-update.

pub mod info;
pub mod update;
