//! The session orchestrator (spec.md §4 intro, §5, §6): binds the
//! verifier, the resource-key manager, the streaming codec, and the
//! key-publish planner behind the minimal surface an SDK shell calls.
//!
//! Mirrors the teacher's "global session state... model as an
//! explicit session value owned by the orchestrator" redesign note
//! (spec.md §9): there is no nullable facade singleton, just a
//! `Session` value the caller owns and drives.
//!
//! All block verification is serialized on one logical lane (spec.md
//! §5 "Scheduling model"), implemented here as a `tokio::Mutex` around
//! the [`Verifier`] — the same primitive the teacher's order-sensitive
//! paths use (spec.md §9 "Promise chains... order-sensitive paths use
//! a mutex").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use ward_core::crypto::{AeadKey, Ed25519SigningKey};
use ward_core::{DeviceId, ResourceId, TrustchainId, UserId, WardError};
use ward_resource::{plan_key_publish, try_promote_group, ResourceKeyManager};
use ward_store::safe::ProvisionalIdentityKeyPair;
use ward_store::{KeySafeContents, Table};
use ward_verify::{IngestOutcome, Verifier};

use crate::config::SessionConfig;
use crate::transport::Transport;

pub use ward_resource::Recipient;

/// One user/device's live connection to a trust chain: the verified
/// [`ward_verify::ChainState`], the local key safe, the resource-key
/// cache, and whatever [`Transport`] moves blocks to and from the
/// server.
///
/// Generic over the resource-key cache table so callers can plug in a
/// real persistent `Table` impl; tests use `ward_store::MemoryTable`.
pub struct Session<C: Table<ResourceId, Vec<u8>>> {
    config: SessionConfig,
    trustchain_id: TrustchainId,
    local_device_id: DeviceId,
    local_user_id: UserId,
    signing_key: Ed25519SigningKey,
    transport: Arc<dyn Transport>,
    verifier: Mutex<Verifier>,
    safe: Mutex<KeySafeContents>,
    resource_keys: ResourceKeyManager<C>,
    /// Set once this device's own revocation block verifies (spec.md
    /// §7 "Security events: DeviceRevoked"). Every public operation
    /// checks this first and fails with `InvalidSessionStatus` once set.
    revoked: AtomicBool,
}

impl<C: Table<ResourceId, Vec<u8>>> Session<C> {
    /// Build a session around an already-unsealed local key safe. A
    /// real SDK shell unseals the safe (`SealedKeySafe::unseal`)
    /// before constructing the session; this type never touches the
    /// sealed-record format itself.
    pub fn new(
        config: SessionConfig,
        trustchain_id: TrustchainId,
        local_device_id: DeviceId,
        local_user_id: UserId,
        signing_key: Ed25519SigningKey,
        transport: Arc<dyn Transport>,
        resource_key_cache: C,
        resource_key_cache_key: AeadKey,
        safe: KeySafeContents,
    ) -> Self {
        let max_queue = config.max_unverified_queue_per_subject;
        Self {
            config,
            trustchain_id,
            local_device_id,
            local_user_id,
            signing_key,
            transport,
            verifier: Mutex::new(Verifier::new(max_queue)),
            safe: Mutex::new(safe),
            resource_keys: ResourceKeyManager::new(resource_key_cache, resource_key_cache_key, local_device_id),
            revoked: AtomicBool::new(false),
        }
    }

    fn ensure_active(&self) -> Result<(), WardError> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(WardError::invalid_session_status(
                "local device was revoked; session is closed",
            ));
        }
        Ok(())
    }

    /// Pull every block the transport currently has for this user and
    /// feed it through the verifier (spec.md §5 "Suspension points:
    /// network RPCs to fetch missing history"). Blocks are ingested
    /// one at a time under the verification lane's single lock, so
    /// concurrent `sync` calls serialize rather than race.
    #[tracing::instrument(skip(self))]
    pub async fn sync(&self) -> Result<(), WardError> {
        self.ensure_active()?;
        let blocks = self
            .transport
            .get_user_history_by_user_ids(&[self.local_user_id])
            .await?;

        let mut verifier = self.verifier.lock().await;
        for block in blocks {
            match verifier.ingest(block) {
                IngestOutcome::Verified | IngestOutcome::Queued(_) => {}
                IngestOutcome::Dropped(err) => {
                    tracing::warn!(error = %err, "sync dropped an invalid block");
                }
            }
        }

        let locally_revoked = verifier
            .state
            .device(&self.local_device_id)
            .is_some_and(|device| device.revoked_at.is_some());
        drop(verifier);

        if locally_revoked {
            self.handle_local_device_revoked().await;
        }
        Ok(())
    }

    /// spec.md §7 "the core wipes the local safe and raises a
    /// one-shot event; all further operations fail with
    /// InvalidSessionStatus". The "event" is `revoked` flipping to
    /// `true`; a real SDK shell observes it via [`Session::is_revoked`].
    async fn handle_local_device_revoked(&self) {
        if self.revoked.swap(true, Ordering::SeqCst) {
            return; // already handled
        }
        tracing::warn!(device_id = %self.local_device_id, "local device revoked; wiping local safe");
        let mut safe = self.safe.lock().await;
        *safe = KeySafeContents {
            device_keys: ward_store::DeviceKeyPair {
                signature_private_key: [0u8; 32],
                encryption_private_key: [0u8; 32],
            },
            user_key_history: Vec::new(),
            provisional_identities: Vec::new(),
        };
    }

    /// Whether the `DeviceRevoked` security event has fired for this
    /// session.
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Encrypt `reader` into `writer` for `recipients`, minting a
    /// fresh resource key and id, planning and pushing the
    /// corresponding key-publish blocks, and streaming the ciphertext
    /// (spec.md §2 "Resource-key manager: issues new resource keys on
    /// encrypt", §4.4 key-publish planner).
    ///
    /// `share_with_self` additionally caches the key locally so this
    /// device can decrypt its own output without waiting on a
    /// key-publish round trip (spec.md §4.4).
    #[tracing::instrument(skip(self, recipients, reader, writer))]
    pub async fn encrypt<R, W>(
        &self,
        recipients: &[Recipient],
        share_with_self: bool,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<ResourceId, WardError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.ensure_active()?;
        let resource_id = ResourceId::new(ward_core::crypto::random::bytes::<16>());
        let resource_key = AeadKey::generate();

        let blocks = plan_key_publish(
            resource_id,
            &resource_key,
            recipients,
            self.trustchain_id,
            self.local_device_id,
            &self.signing_key,
        )?;
        if !blocks.is_empty() {
            self.transport.push_blocks(blocks).await?;
        }
        if share_with_self {
            self.resource_keys.cache_key_locally(resource_id, &resource_key).await?;
        }

        ward_stream::encrypt(resource_id, &resource_key, self.config.chunk_size, reader, writer).await?;
        Ok(resource_id)
    }

    /// Resolve `resource_id`'s key (spec.md §4.3 lookup order) and
    /// decrypt `reader` into `writer`.
    #[tracing::instrument(skip(self, reader, writer))]
    pub async fn decrypt<R, W>(&self, resource_id: ResourceId, reader: &mut R, writer: &mut W) -> Result<(), WardError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.ensure_active()?;
        let verifier = self.verifier.lock().await;
        let safe = self.safe.lock().await;
        let key = self
            .resource_keys
            .find_key_for_resource(resource_id, &verifier.state, &safe)
            .await?;
        drop(safe);
        drop(verifier);

        let decoded_id = ward_stream::decrypt(&key, reader, writer).await?;
        if decoded_id != resource_id {
            return Err(WardError::invalid_format(
                "stream's embedded resource id does not match the requested one",
            ));
        }
        Ok(())
    }

    /// Claim a provisional identity this device now controls,
    /// retroactively promoting any external group it unlocks (spec.md
    /// §4.5 "External -> Internal: ... claimProvisionalIdentity").
    #[tracing::instrument(skip(self, identity))]
    pub async fn claim_provisional_identity(
        &self,
        identity: ProvisionalIdentityKeyPair,
    ) -> Result<Vec<ward_core::GroupId>, WardError> {
        self.ensure_active()?;
        let mut verifier = self.verifier.lock().await;
        let mut safe = self.safe.lock().await;
        ward_resource::claim_provisional_identity(identity, &mut safe, &mut verifier.state)
    }

    /// Retry promoting one group from External to Internal using
    /// whatever is currently in the local safe (spec.md §4.5). Useful
    /// after a user-key rotation makes a previously-unreachable slot
    /// reachable.
    pub async fn try_promote_group(&self, group_id: &ward_core::GroupId) -> Result<bool, WardError> {
        self.ensure_active()?;
        let mut verifier = self.verifier.lock().await;
        let safe = self.safe.lock().await;
        try_promote_group(group_id, &mut verifier.state, &safe)
    }

    /// This device's id, for callers building `Recipient`s or
    /// inspecting verified state directly.
    pub fn local_device_id(&self) -> DeviceId {
        self.local_device_id
    }
}
