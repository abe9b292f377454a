//! CLI subcommand implementations that don't start the server.
//!
//! - [`keygen`] - VAPID keypair generation

pub mod keygen;
