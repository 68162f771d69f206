//! Metadata-driven client for substrate-based blockchains.
//!
//! Nothing about the runtime is known at compile time. The node's metadata is
//! fetched on connection and turned into a [`Registry`], which encodes and
//! decodes dynamic [`Value`]s against the runtime's types. On top of that, the
//! [`transaction`] module builds, signs and tracks extrinsics.
//!
//! # Example
//!
//! ```no_run
//! use kite::common::{KeyPairBuilder, Sr25519};
//! use kite::signer::PairSigner;
//! use kite::{Call, Client, ClientConfig, Value};
//!
//! # async fn run() -> kite::Result<()> {
//! let client = Client::connect(ClientConfig::default()).await?;
//!
//! // In this example, a random key is generated. You probably want to *import* one.
//! let (keypair, _) = KeyPairBuilder::<Sr25519>::generate();
//! let signer = PairSigner::new(keypair);
//!
//! let call = Call::new(
//!     "Balances",
//!     "transfer_keep_alive",
//!     vec![
//!         ("dest", Value::variant("Id", vec![Value::bytes([1; 32])])),
//!         ("value", Value::u128(1_000_000_000)),
//!     ],
//! );
//!
//! let tx = client.create_signed(call, &signer).await?;
//! let hash = client.submit(&tx).await?;
//! # Ok(())
//! # }
//! ```

pub use self::client::Client;
pub use self::config::ClientConfig;
pub use self::error::{Error, Result};
pub use self::registry::{Call, Registry};
pub use self::value::{Composite, Number, Value, Variant};
pub use kite_metadata as metadata;
pub use kite_rpc as rpc;

pub mod chain;
pub mod client;
pub mod codec;
pub mod common;
pub mod compact;
pub mod config;
pub mod error;
pub mod extension;
pub mod negotiate;
pub mod registry;
pub mod signer;
pub mod transaction;
pub mod value;

#[cfg(test)]
pub(crate) mod test_utils;

pub(crate) fn blake2b<const N: usize>(data: &[u8]) -> [u8; N] {
    let hash = blake2_rfc::blake2b::blake2b(N, &[], data);

    let mut out = [0; N];
    out.copy_from_slice(hash.as_bytes());
    out
}
