//! Client core for the ActiSathi community app: the registration wizard,
//! mock sign-in and the karma service client.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod karma;
pub mod notification;
pub mod services;
pub mod store;
pub mod uploads;

pub use api::KarmaClient;
pub use config::{ClientConfig, Configuration};
pub use errors::{Error, Result};
pub use services::{ActiSathiService, AppCmd, UiEvent};

/// Install `env_logger` as the console logger, honouring `RUST_LOG`.
/// Calling it more than once is harmless.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
