//! Single-operator authorization gate.
//!
//! Exactly one Telegram identity may drive the desktop. The gate is shared by
//! every ingress (text commands and panel buttons) through the dispatcher's
//! interceptor pipelines.

use crate::dispatcher::Invocation;
use std::fmt;
use tracing::{debug, warn};

/// Opaque numeric operator identifier (the Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity(pub i64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Sender is the configured operator.
    Authorized,
    /// Sender is missing or someone else.
    Denied,
}

/// Identity check against the operator fixed at startup.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    operator: Identity,
}

impl AuthorizationGate {
    /// Create a gate that admits only `operator`. Operator `0` admits nobody.
    #[must_use]
    pub const fn new(operator: Identity) -> Self {
        Self { operator }
    }

    /// The configured operator.
    #[must_use]
    pub const fn operator(&self) -> Identity {
        self.operator
    }

    /// Check an invocation. Every denial emits one warning-level audit record.
    #[must_use]
    pub fn check(&self, invocation: &Invocation) -> AuthDecision {
        match invocation.sender {
            Some(id) if id == self.operator && self.operator.0 != 0 => {
                debug!(user = %id, command = %invocation.command, "Auth OK");
                AuthDecision::Authorized
            }
            sender => {
                let user = sender.map_or_else(|| "unknown".to_string(), |id| id.to_string());
                warn!(
                    user = %user,
                    command = %invocation.command,
                    ingress = ?invocation.ingress,
                    "Unauthorized access attempt"
                );
                AuthDecision::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Ingress;

    fn invocation(sender: Option<i64>) -> Invocation {
        Invocation {
            command: "screen".to_string(),
            args: Vec::new(),
            sender: sender.map(Identity),
            ingress: Ingress::Command,
        }
    }

    #[test]
    fn test_operator_is_authorized() {
        let gate = AuthorizationGate::new(Identity(42));
        assert_eq!(gate.check(&invocation(Some(42))), AuthDecision::Authorized);
    }

    #[test]
    fn test_other_users_are_denied() {
        let gate = AuthorizationGate::new(Identity(42));
        assert_eq!(gate.check(&invocation(Some(7))), AuthDecision::Denied);
        assert_eq!(gate.check(&invocation(Some(-42))), AuthDecision::Denied);
    }

    #[test]
    fn test_unresolved_sender_is_denied() {
        let gate = AuthorizationGate::new(Identity(42));
        assert_eq!(gate.check(&invocation(None)), AuthDecision::Denied);
    }

    #[test]
    fn test_unset_operator_admits_nobody() {
        let gate = AuthorizationGate::new(Identity(0));
        assert_eq!(gate.check(&invocation(None)), AuthDecision::Denied);
        assert_eq!(gate.check(&invocation(Some(0))), AuthDecision::Denied);
    }
}
