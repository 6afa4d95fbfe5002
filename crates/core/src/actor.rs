use serde::{Deserialize, Serialize};

use crate::{OrganizationId, RequestContext, UserId};

/// Authenticated caller acting inside one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    user_id: UserId,
    organization_id: OrganizationId,
    #[serde(default)]
    context: RequestContext,
}

impl ActorIdentity {
    /// Creates an actor identity from authentication and tenancy data.
    #[must_use]
    pub fn new(user_id: UserId, organization_id: OrganizationId) -> Self {
        Self {
            user_id,
            organization_id,
            context: RequestContext::default(),
        }
    }

    /// Attaches transport metadata.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the acting user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the organization the actor is operating in.
    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// Returns the transport metadata of the current request.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }
}
