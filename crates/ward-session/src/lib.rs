#![forbid(unsafe_code)]
//! Ties the lower crates together behind the surface an SDK shell
//! actually calls (spec.md §4 intro, §5 concurrency model, §6 external
//! interfaces): sync, encrypt, decrypt, share, and provisional-identity
//! claiming, all serialized on one verification lane per [`Session`].

pub mod config;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use session::{Recipient, Session};
pub use transport::{InMemoryTransport, ProvisionalIdentityPublicKeys, Transport};

/// Install a `tracing` subscriber reading `RUST_LOG` (or `info` by
/// default), the way the teacher's binaries wire up logging at
/// startup. Idempotent: a second call is a harmless no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
