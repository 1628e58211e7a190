pub mod repository;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use repository::{DeliveryLog, SubscriptionStore};

use rand::rngs::OsRng;
use rand::RngCore;

/// Length of generated signing secrets in bytes (256 bits of entropy).
const SECRET_LEN: usize = 32;

/// Generate a fresh signing secret: 32 bytes from the OS CSPRNG, hex-encoded.
pub(crate) fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
