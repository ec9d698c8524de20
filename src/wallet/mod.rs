//! Wallet credential management
//!
//! The externally-owned wallet that proves control of an address when
//! requesting session signatures and minting PKPs. The private key never
//! leaves this module.

mod signer;

pub use signer::{WalletCredential, DERIVED_VIA_PERSONAL_SIGN};
