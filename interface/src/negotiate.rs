//! Fetching metadata in the highest version both sides understand.
//!
//! Nodes exposing the `Metadata` runtime API list the versions they can
//! produce, so the client picks one. Older nodes only have
//! `state_getMetadata`, which returns whatever version the runtime was built
//! with.

use crate::{Error, Result};
use kite_metadata::{parse_raw_metadata_with, LegacyTypes, Metadata};
use kite_rpc::{Rpc, Transport};
use parity_scale_codec::{Decode, Encode};
use sp_core::H256;

const METADATA_VERSIONS: &str = "Metadata_metadata_versions";
const METADATA_AT_VERSION: &str = "Metadata_metadata_at_version";

/// The highest version in both `offered` and `supported`.
pub fn negotiate_version(offered: &[u32], supported: &[u32]) -> Result<u32> {
    offered
        .iter()
        .filter(|version| supported.contains(version))
        .max()
        .copied()
        .ok_or_else(|| Error::UnsupportedMetadataVersion {
            offered: offered.to_vec(),
            supported: supported.to_vec(),
        })
}

fn decode_response<T: Decode>(function: &str, bytes: &[u8]) -> Result<T> {
    T::decode(&mut &bytes[..]).map_err(|err| {
        Error::Metadata(kite_metadata::Error::InvalidMetadata(format!(
            "invalid response of {}: {}",
            function, err
        )))
    })
}

/// Fetches the metadata at block `at` (best block if `None`) in the highest
/// version of `supported` the node offers.
pub async fn fetch_metadata<T: Transport>(
    rpc: &Rpc<T>,
    supported: &[u32],
    legacy: &LegacyTypes,
    at: Option<H256>,
) -> Result<Metadata> {
    let offered = match rpc.state_call(METADATA_VERSIONS, &[], at).await {
        Ok(bytes) => decode_response::<Vec<u32>>(METADATA_VERSIONS, &bytes)?,
        Err(err) => {
            log::warn!(
                "Runtime API {} unavailable ({}), falling back to state_getMetadata",
                METADATA_VERSIONS,
                err
            );
            return fetch_legacy(rpc, supported, legacy, at).await;
        }
    };

    log::debug!("Node offers metadata versions {:?}", offered);
    let version = negotiate_version(&offered, supported)?;
    log::info!("Negotiated metadata V{}", version);

    let bytes = rpc
        .state_call(METADATA_AT_VERSION, &version.encode(), at)
        .await?;

    let raw = decode_response::<Option<Vec<u8>>>(METADATA_AT_VERSION, &bytes)?
        .ok_or(Error::MetadataUnavailable(version))?;

    let metadata = parse_raw_metadata_with(raw, legacy)?;
    if metadata.version != version {
        log::warn!(
            "Requested metadata V{}, node returned V{}",
            version,
            metadata.version
        );
    }

    Ok(metadata)
}

async fn fetch_legacy<T: Transport>(
    rpc: &Rpc<T>,
    supported: &[u32],
    legacy: &LegacyTypes,
    at: Option<H256>,
) -> Result<Metadata> {
    let raw = rpc.metadata(at).await?;

    // The version tag follows the magic number.
    let version = raw
        .strip_prefix(b"meta")
        .unwrap_or(&raw)
        .first()
        .map(|v| u32::from(*v))
        .ok_or(Error::Metadata(kite_metadata::Error::EmptyMetadata))?;

    if !supported.contains(&version) {
        return Err(Error::UnsupportedMetadataVersion {
            offered: vec![version],
            supported: supported.to_vec(),
        });
    }

    log::info!("Fetched metadata V{} via state_getMetadata", version);
    Ok(parse_raw_metadata_with(raw, legacy)?)
}
