pub mod constants;
pub mod hashing;
pub mod url_utils;

pub use constants::*;
pub use hashing::{artifact_hash, user_bucket};
pub use url_utils::{absolutize, host_slug, is_valid_url, same_host};
