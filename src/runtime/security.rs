//! Security and call-authorization profiles.
//!
//! Discriminants are the numeric values the remote runtime expects.

use serde::{Deserialize, Serialize};

/// Authentication level for calls (`RPC_C_AUTHN_LEVEL_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationLevel {
    Default = 0,
    None = 1,
    Connect = 2,
    Call = 3,
    Packet = 4,
    PacketIntegrity = 5,
    PacketPrivacy = 6,
}

/// How much of the caller's identity the server may assume (`RPC_C_IMP_LEVEL_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpersonationLevel {
    Default = 0,
    Anonymous = 1,
    Identify = 2,
    Impersonate = 3,
    Delegate = 4,
}

/// Authentication package used on a connection (`RPC_C_AUTHN_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationService {
    None = 0,
    Negotiate = 9,
    WinNt = 10,
    Kerberos = 16,
}

/// Authorization service used on a connection (`RPC_C_AUTHZ_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationService {
    None = 0,
    Name = 1,
    Dce = 2,
}

impl AuthenticationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticationLevel::Default => "default",
            AuthenticationLevel::None => "none",
            AuthenticationLevel::Connect => "connect",
            AuthenticationLevel::Call => "call",
            AuthenticationLevel::Packet => "packet",
            AuthenticationLevel::PacketIntegrity => "packet_integrity",
            AuthenticationLevel::PacketPrivacy => "packet_privacy",
        }
    }
}

impl ImpersonationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ImpersonationLevel::Default => "default",
            ImpersonationLevel::Anonymous => "anonymous",
            ImpersonationLevel::Identify => "identify",
            ImpersonationLevel::Impersonate => "impersonate",
            ImpersonationLevel::Delegate => "delegate",
        }
    }
}

impl AuthenticationService {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticationService::None => "none",
            AuthenticationService::Negotiate => "negotiate",
            AuthenticationService::WinNt => "win_nt",
            AuthenticationService::Kerberos => "kerberos",
        }
    }
}

/// Process-wide default security, applied once after runtime init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityProfile {
    pub authentication_level: AuthenticationLevel,
    pub impersonation_level: ImpersonationLevel,
}

impl Default for SecurityProfile {
    fn default() -> Self {
        Self {
            authentication_level: AuthenticationLevel::Default,
            impersonation_level: ImpersonationLevel::Impersonate,
        }
    }
}

/// Per-connection authorization, applied to a fresh connection handle
/// before any other call is issued on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallAuthorization {
    pub authentication_service: AuthenticationService,
    pub authorization_service: AuthorizationService,
    /// Server principal; `None` lets the runtime pick.
    pub server_principal: Option<String>,
    pub authentication_level: AuthenticationLevel,
    pub impersonation_level: ImpersonationLevel,
}

impl Default for CallAuthorization {
    fn default() -> Self {
        Self {
            authentication_service: AuthenticationService::WinNt,
            authorization_service: AuthorizationService::None,
            server_principal: None,
            authentication_level: AuthenticationLevel::Call,
            impersonation_level: ImpersonationLevel::Impersonate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(AuthenticationLevel::Call as u32, 3);
        assert_eq!(ImpersonationLevel::Impersonate as u32, 3);
        assert_eq!(AuthenticationService::WinNt as u32, 10);
        assert_eq!(AuthorizationService::None as u32, 0);
    }

    #[test]
    fn test_snake_case_names() {
        let json = serde_json::to_string(&CallAuthorization::default()).unwrap();
        assert!(json.contains(r#""authentication_service":"win_nt""#));
        assert!(json.contains(r#""impersonation_level":"impersonate""#));
    }
}
