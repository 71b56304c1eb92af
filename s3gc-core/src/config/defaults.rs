//! Default values used by the environment loader.

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_VAULT_PATH: &str = "/var/lib/s3gc/vault";
