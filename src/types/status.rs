//! Numeric status codes returned by the remote management service.
//!
//! Codes follow the usual 32-bit convention: the sign bit marks failure,
//! zero and positive values are success (some of them informational).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer result of a remote call. Defaults to `OK`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub i32);

// The failure constants are specified by their unsigned bit pattern.
const fn code(bits: u32) -> StatusCode {
    StatusCode(bits as i32)
}

impl StatusCode {
    pub const OK: StatusCode = code(0x0000_0000);
    /// Success, but fewer items than requested.
    pub const FALSE: StatusCode = code(0x0000_0001);
    pub const TIMED_OUT: StatusCode = code(0x0004_0004);

    pub const FAILED: StatusCode = code(0x8004_1001);
    pub const NOT_FOUND: StatusCode = code(0x8004_1002);
    pub const ACCESS_DENIED: StatusCode = code(0x8004_1003);
    pub const TYPE_MISMATCH: StatusCode = code(0x8004_1005);
    pub const INVALID_PARAMETER: StatusCode = code(0x8004_1008);
    pub const INVALID_NAMESPACE: StatusCode = code(0x8004_100E);
    pub const INVALID_CLASS: StatusCode = code(0x8004_1010);
    pub const TRANSPORT_FAILURE: StatusCode = code(0x8004_1015);
    pub const INVALID_METHOD: StatusCode = code(0x8004_102E);
    pub const INVALID_METHOD_PARAMETERS: StatusCode = code(0x8004_102F);
    pub const CALL_CANCELLED: StatusCode = code(0x8004_1032);

    pub const UNEXPECTED: StatusCode = code(0x8000_FFFF);
    pub const E_FAIL: StatusCode = code(0x8000_4005);
    pub const CLASS_NOT_REGISTERED: StatusCode = code(0x8004_0154);
    /// Security was already initialized for the process.
    pub const TOO_LATE: StatusCode = code(0x8001_0119);

    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Unsigned bit pattern, the form codes are usually quoted in.
    pub fn bits(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.bits())
    }
}

impl From<i32> for StatusCode {
    fn from(value: i32) -> Self {
        StatusCode(value)
    }
}
