//! apito server binary.
//!
//! ```text
//!     .env → EnvVars → ConfigService → LogService → DatabaseService
//!          → panic hook → metrics → ApiServer + routers → listen
//! ```
//!
//! No flags: everything is driven by `NODE_ENV`, `CONFIG_DIR`, the config
//! documents and `SECTION__KEY` overrides.

use std::process::ExitCode;

use apito::config::EnvVars;
use apito::lifecycle::startup;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    match startup::run(EnvVars::from_process()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                tracing::error!(error = %err, "Startup failed");
            } else {
                eprintln!("apito: {err}");
            }
            ExitCode::FAILURE
        }
    }
}
