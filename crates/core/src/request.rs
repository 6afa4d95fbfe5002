use serde::{Deserialize, Serialize};

/// Transport metadata captured alongside an authorization decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl RequestContext {
    /// Creates request metadata from optional transport values.
    #[must_use]
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address: ip_address.filter(|value| !value.trim().is_empty()),
            user_agent: user_agent.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Returns the caller IP address, if known.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the caller user agent, if known.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
