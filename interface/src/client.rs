//! The async client: bootstraps a [`Registry`] from the node and drives
//! transactions through fetch nonce, sign, dry-run and submit.

use crate::chain::{Chain, Component, TypedValue};
use crate::common::{AccountId32, Era};
use crate::config::ClientConfig;
use crate::extension::ExtensionParams;
use crate::negotiate::fetch_metadata;
use crate::registry::{Call, Registry};
use crate::signer::Signer;
use crate::transaction::{
    DecodedExtrinsic, Extrinsic, SignedTransaction, TransactionProgress, UnsignedTransaction,
};
use crate::value::Value;
use crate::{Error, Result};
use kite_metadata::TypeId;
use kite_rpc::{HttpTransport, Rpc, RuntimeVersion, Transport, TransportError};
use sp_core::H256;
use std::sync::Arc;

/// Variants of `InvalidTransaction`, by index.
const INVALID_TRANSACTION: &[&str] = &[
    "Call",
    "Payment",
    "Future",
    "Stale",
    "BadProof",
    "AncientBirthBlock",
    "ExhaustsResources",
    "Custom",
    "BadMandatory",
    "MandatoryValidation",
    "BadSigner",
];

/// Variants of `UnknownTransaction`, by index.
const UNKNOWN_TRANSACTION: &[&str] = &["CannotLookup", "NoUnsignedValidator", "Custom"];

fn invalid_response(msg: String) -> Error {
    Error::TransportFailed(TransportError::InvalidResponse(msg))
}

pub struct Client<T> {
    rpc: Rpc<T>,
    config: ClientConfig,
    genesis: H256,
    runtime: RuntimeVersion,
    registry: Arc<Registry>,
}

impl Client<HttpTransport> {
    /// Connects to `config.url` over HTTP.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let rpc = Rpc::new(HttpTransport::new(config.url.clone()));
        Self::new(rpc, config).await
    }
}

impl<T: Transport> Client<T> {
    /// Fetches the genesis hash, the runtime version and the metadata.
    pub async fn new(rpc: Rpc<T>, config: ClientConfig) -> Result<Self> {
        let genesis = rpc
            .block_hash(Some(0))
            .await?
            .ok_or_else(|| invalid_response("node has no genesis block".to_string()))?;

        let runtime = rpc.runtime_version(None).await?;
        log::info!(
            "Connected to {} (spec version {}, genesis {:?})",
            runtime.spec_name,
            runtime.spec_version,
            genesis
        );

        let registry = Self::fetch_registry(&rpc, &config).await?;

        Ok(Client {
            rpc,
            config,
            genesis,
            runtime,
            registry,
        })
    }
    async fn fetch_registry(rpc: &Rpc<T>, config: &ClientConfig) -> Result<Arc<Registry>> {
        let metadata = fetch_metadata(
            rpc,
            &config.metadata_versions,
            &config.legacy_types(),
            None,
        )
        .await?;

        Ok(Arc::new(Registry::new(metadata)?))
    }
    pub fn rpc(&self) -> &Rpc<T> {
        &self.rpc
    }
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
    pub fn genesis(&self) -> H256 {
        self.genesis
    }
    pub fn runtime_version(&self) -> &RuntimeVersion {
        &self.runtime
    }
    /// The current registry. Transactions built from it stay valid after a
    /// refresh, they hold their own reference.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
    /// Swaps in fresh metadata if the runtime was upgraded. Returns whether
    /// it did.
    pub async fn refresh_metadata(&mut self) -> Result<bool> {
        let runtime = self.rpc.runtime_version(None).await?;
        if runtime.spec_version == self.runtime.spec_version {
            return Ok(false);
        }

        log::info!(
            "Runtime upgraded from spec version {} to {}, refreshing metadata",
            self.runtime.spec_version,
            runtime.spec_version
        );

        self.registry = Self::fetch_registry(&self.rpc, &self.config).await?;
        self.runtime = runtime;

        Ok(true)
    }
    /// The next nonce of `account`, including transactions in the pool.
    pub async fn account_nonce(&self, account: &AccountId32) -> Result<u64> {
        let address = account.to_ss58_address(self.registry.address_format());

        self.rpc
            .account_next_index(&address)
            .await
            .map_err(Error::NonceFetchFailed)
    }
    /// Extension parameters for a transaction of `account` at the best block:
    /// nonce, versions, genesis, tip and the configured mortality.
    pub async fn extension_params(&self, account: &AccountId32) -> Result<ExtensionParams> {
        let nonce = self.account_nonce(account).await?;

        let mut params = ExtensionParams::new()
            .nonce(nonce)
            .spec_version(self.runtime.spec_version)
            .tx_version(self.runtime.transaction_version)
            .genesis(self.genesis)
            .tip(u128::from(self.config.tip));

        if let Some(period) = self.config.mortality_period {
            let header = self
                .rpc
                .header(None)
                .await?
                .ok_or_else(|| invalid_response("no best block header".to_string()))?;

            let current = u64::from(header.number()?);
            let era = Era::mortal(period, current);
            let birth = era.birth(current);

            let birth_number = u32::try_from(birth)
                .map_err(|_| invalid_response(format!("block number {} out of range", birth)))?;
            let checkpoint = self
                .rpc
                .block_hash(Some(birth_number))
                .await?
                .ok_or_else(|| invalid_response(format!("no block hash at {}", birth)))?;

            log::debug!("Mortal era {:?} born at block {}", era, birth);
            params = params.era(era, checkpoint);
        }

        Ok(params)
    }
    /// Builds and signs `call`. The nonce is fetched first; if that fails,
    /// nothing is signed.
    pub async fn create_signed<S: Signer + ?Sized>(
        &self,
        call: Call,
        signer: &S,
    ) -> Result<SignedTransaction> {
        let params = self.extension_params(&signer.account_id()).await?;
        self.create_signed_with(call, signer, &params).await
    }
    /// Builds and signs `call` with caller-provided extension parameters.
    pub async fn create_signed_with<S: Signer + ?Sized>(
        &self,
        call: Call,
        signer: &S,
        params: &ExtensionParams,
    ) -> Result<SignedTransaction> {
        UnsignedTransaction::new(self.registry(), call)
            .with_extensions(params)?
            .sign(signer)
            .await
    }
    /// Applies `tx` on top of the best block without submitting it. Nodes
    /// without `system_dryRun` pass every transaction.
    pub async fn dry_run(&self, tx: &SignedTransaction) -> Result<()> {
        let result = match self.rpc.dry_run(tx.encoded(), None).await {
            Ok(result) => result,
            Err(err) if err.is_method_not_found() => {
                log::warn!("Node does not support dry runs, skipping");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        self.check_apply_result(&result)
    }
    /// Interprets an encoded `ApplyExtrinsicResult`.
    fn check_apply_result(&self, result: &[u8]) -> Result<()> {
        let truncated = || invalid_response(format!("truncated dry run result 0x{}", hex::encode(result)));

        match result {
            // Ok(Ok(()))
            [0x00, 0x00, ..] => Ok(()),
            // Ok(Err(DispatchError))
            [0x00, 0x01, error @ ..] => Err(Error::Rejected(self.dispatch_error(error)?)),
            // Err(Invalid(InvalidTransaction))
            [0x01, 0x00, index, ..] => Err(Error::Rejected(format!(
                "invalid transaction: {}",
                INVALID_TRANSACTION
                    .get(usize::from(*index))
                    .copied()
                    .unwrap_or("unknown")
            ))),
            // Err(Unknown(UnknownTransaction))
            [0x01, 0x01, index, ..] => Err(Error::Rejected(format!(
                "unknown transaction validity: {}",
                UNKNOWN_TRANSACTION
                    .get(usize::from(*index))
                    .copied()
                    .unwrap_or("unknown")
            ))),
            _ => Err(truncated()),
        }
    }
    /// Describes an encoded `DispatchError`, resolving module errors to
    /// `Pallet.Error`.
    fn dispatch_error(&self, bytes: &[u8]) -> Result<String> {
        let ty = match self.registry.types().find_by_path(&["DispatchError"]) {
            Some(ty) => ty,
            None => return Ok(format!("dispatch error 0x{}", hex::encode(bytes))),
        };

        let mut input = bytes;
        let error = self.registry.decode(ty, &mut input)?;
        let variant = match error.as_variant() {
            Some(variant) => variant,
            None => return Ok(format!("{:?}", error)),
        };

        if variant.name != "Module" {
            return Ok(variant.name.clone());
        }

        let module = variant.fields.at(0).map(Value::peel).and_then(Value::as_composite);
        let index = module
            .and_then(|m| m.get("index"))
            .and_then(Value::as_u128)
            .and_then(|i| u8::try_from(i).ok());
        let error = module.and_then(|m| m.get("error")).and_then(|e| match e {
            Value::Bytes(bytes) => bytes.first().copied(),
            other => other.as_u128().and_then(|i| u8::try_from(i).ok()),
        });

        match (index, error) {
            (Some(index), Some(error)) => Ok(match self.registry.error_by_index(index, error)? {
                Some(desc) => format!("{}.{}", desc.pallet, desc.variant.name),
                None => format!("module error {}:{}", index, error),
            }),
            _ => Ok(format!("{:?}", variant)),
        }
    }
    async fn precheck(&self, tx: &SignedTransaction) -> Result<()> {
        if self.config.dry_run {
            self.dry_run(tx).await?;
        }
        Ok(())
    }
    /// Submits `tx` and returns its hash as reported by the node.
    pub async fn submit(&self, tx: &SignedTransaction) -> Result<H256> {
        self.precheck(tx).await?;

        let hash = self.rpc.submit_extrinsic(tx.encoded()).await?;
        log::info!("Submitted {}::{} as {:?}", tx.call().pallet, tx.call().name, hash);

        Ok(hash)
    }
    pub async fn submit_and_watch(&self, tx: &SignedTransaction) -> Result<TransactionProgress> {
        self.precheck(tx).await?;

        let subscription = self.rpc.submit_and_watch_extrinsic(tx.encoded()).await?;
        log::info!(
            "Submitted {}::{} as {:?}, watching",
            tx.call().pallet,
            tx.call().name,
            tx.hash()
        );

        Ok(TransactionProgress::new(tx.hash(), subscription))
    }
    pub async fn sign_and_submit_then_watch<S: Signer + ?Sized>(
        &self,
        call: Call,
        signer: &S,
    ) -> Result<TransactionProgress> {
        let tx = self.create_signed(call, signer).await?;
        self.submit_and_watch(&tx).await
    }
    /// Reads `pallet::item` at `keys`. Entries with a default never return
    /// `None`.
    pub async fn storage(
        &self,
        pallet: &str,
        item: &str,
        keys: &[Value],
        at: Option<H256>,
    ) -> Result<Option<Value>> {
        let key = self.registry.storage_key(pallet, item, keys)?;
        let raw = self.rpc.storage(&key, at).await?;

        self.registry
            .decode_storage_value(pallet, item, raw.as_deref())
    }
    pub fn constant(&self, pallet: &str, name: &str) -> Result<Value> {
        self.registry.constant(pallet, name)
    }
    /// Calls the runtime API `function`, e.g. `AccountNonceApi_account_nonce`,
    /// and decodes the result as `output`.
    pub async fn runtime_api_call(
        &self,
        function: &str,
        args: Vec<TypedValue>,
        output: TypeId,
        at: Option<H256>,
    ) -> Result<Value> {
        let data = Chain::new(args).encode(&self.registry)?;
        let result = self.rpc.state_call(function, &data, at).await?;

        self.registry.decode_all(output, &result)
    }
    /// The extrinsics of block `hash` (best block if `None`), decoded.
    pub async fn block_extrinsics(&self, hash: Option<H256>) -> Result<Vec<DecodedExtrinsic>> {
        let block = self
            .rpc
            .block(hash)
            .await?
            .ok_or_else(|| invalid_response(format!("block {:?} not found", hash)))?;

        block
            .block
            .extrinsics()?
            .iter()
            .map(|ext| Extrinsic::decode(&self.registry, ext))
            .collect()
    }
}
