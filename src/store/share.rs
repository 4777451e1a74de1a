use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of a share code
pub const SHARE_CODE_LEN: usize = 10;

/// Attempts at drawing an unused share code before giving up
pub(crate) const SHARE_CODE_ATTEMPTS: u32 = 5;

/// Opaque alphanumeric token for public access to a stored result
pub fn generate_share_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_CODE_LEN)
        .map(char::from)
        .collect()
}

pub fn generate_result_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Stable client key that keeps raw addresses out of storage and logs
pub fn hash_client_ip(ip: &str) -> String {
    blake3::hash(ip.as_bytes()).to_hex().to_string()
}
