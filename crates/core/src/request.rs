use serde::{Deserialize, Serialize};

/// Optional transport details attached to audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl RequestMetadata {
    /// Creates request metadata from transport values.
    #[must_use]
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address: ip_address.filter(|value| !value.trim().is_empty()),
            user_agent: user_agent.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Returns the client IP address, if captured.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the client user agent, if captured.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns whether no transport detail was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ip_address.is_none() && self.user_agent.is_none()
    }
}
