#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod attach;
pub mod broker;
pub mod identity;
pub mod tls;
pub mod transport;

/// Well-known agent gRPC port.
pub const AGENT_PORT: u16 = 50051;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build metadata stamped by the release pipeline; local builds report
/// "none"/"unknown".
pub fn build_commit() -> &'static str {
    option_env!("PULSAAR_BUILD_COMMIT").unwrap_or("none")
}

pub fn build_date() -> &'static str {
    option_env!("PULSAAR_BUILD_DATE").unwrap_or("unknown")
}
