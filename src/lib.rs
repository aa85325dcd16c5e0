//! usersvc - User Record Service
//!
//! RPC façade over a [`userstore_core::StorageBackend`]. Each call decodes a
//! request, runs exactly one storage operation, and encodes the result or a
//! typed error.
//!
//! Routes (all `POST`, JSON bodies):
//! - `/user.User/GetUser`
//! - `/user.User/GetUsers`
//! - `/user.User/CreateUser`
//! - `/user.User/UpdateUser`
//! - `/user.User/DeleteUser`

pub mod api;
pub mod config;
pub mod service;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default bind address when neither `--bind` nor `PORT` is given
pub const BIND_ADDRESS_DEFAULT: &str = "127.0.0.1:50051";

/// Default env file path
pub const CONFIG_PATH_DEFAULT: &str = "configs/.env";

/// Application name
pub const APP_NAME: &str = "usersvc";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
