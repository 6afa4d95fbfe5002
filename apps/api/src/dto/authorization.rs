use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, OrganizationId, UserId};
use tasklane_domain::{
    Action, AuthorizationTarget, Explanation, OwnerField, Permission, ResourceInstance,
    ResourceType, RuleSource,
};

/// Resource addressed by a check; omitting `resource_id` checks the whole type.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetRequest {
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Organization owning the instance; defaults to the path organization.
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub owners: BTreeMap<OwnerField, UserId>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub role_key: Option<String>,
    /// Only read for organization instances.
    #[serde(default)]
    pub active: Option<bool>,
}

impl TargetRequest {
    pub fn into_target(
        self,
        organization_id: OrganizationId,
    ) -> Result<AuthorizationTarget, AppError> {
        let resource_type = ResourceType::from_transport(self.resource_type.trim())?;
        let Some(resource_id) = self.resource_id.filter(|id| !id.trim().is_empty()) else {
            return Ok(AuthorizationTarget::from(resource_type));
        };
        let owning_organization = self.organization_id.unwrap_or(organization_id);

        let mut instance = if resource_type == ResourceType::Organization {
            ResourceInstance::organization(
                OrganizationId::parse(resource_id.as_str())?,
                self.active.unwrap_or(true),
            )
        } else {
            ResourceInstance::new(resource_type, resource_id, owning_organization)
        };
        for (field, user_id) in self.owners {
            instance = instance.with_owner(field, user_id);
        }
        if let Some(team_id) = self.team_id {
            instance = instance.with_team(team_id);
        }
        if let Some(service_id) = self.service_id {
            instance = instance.with_service(service_id);
        }
        if let Some(role_key) = self.role_key {
            instance = instance.with_role_key(role_key);
        }

        Ok(instance.into())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationRequest {
    pub action: String,
    pub target: TargetRequest,
}

impl AuthorizationRequest {
    pub fn action(&self) -> Result<Action, AppError> {
        self.action.trim().parse()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    pub permitted: bool,
    pub matching_rule_source: Option<RuleSource>,
}

impl From<Explanation> for DecisionResponse {
    fn from(value: Explanation) -> Self {
        Self {
            permitted: value.permitted,
            matching_rule_source: value.matching_rule_source,
        }
    }
}

/// Class-level permissions in `resource_type.action` form.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitiesResponse {
    pub permissions: Vec<String>,
}

impl From<Vec<Permission>> for CapabilitiesResponse {
    fn from(value: Vec<Permission>) -> Self {
        Self {
            permissions: value
                .into_iter()
                .map(|permission| permission.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tasklane_core::{OrganizationId, UserId};
    use tasklane_domain::{AuthorizationTarget, OwnerField, ResourceType};

    use super::TargetRequest;

    fn parse(value: serde_json::Value) -> TargetRequest {
        serde_json::from_value(value).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn missing_resource_id_targets_the_class() {
        let target = parse(serde_json::json!({ "resource_type": "task" }))
            .into_target(OrganizationId::new());

        assert_eq!(
            target.ok(),
            Some(AuthorizationTarget::from(ResourceType::Task))
        );
    }

    #[test]
    fn instance_attributes_are_carried() {
        let organization_id = OrganizationId::new();
        let assignee = UserId::new();
        let target = parse(serde_json::json!({
            "resource_type": "task",
            "resource_id": "task-1",
            "owners": { "assignee_id": assignee.to_string() },
            "team_id": "team-a",
        }))
        .into_target(organization_id);

        let Ok(AuthorizationTarget::Instance(instance)) = target else {
            panic!("expected an instance target");
        };
        assert_eq!(instance.organization_id(), organization_id);
        assert_eq!(instance.owner(OwnerField::AssigneeId), Some(assignee));
        assert_eq!(instance.team_id(), Some("team-a"));
    }

    #[test]
    fn unknown_resource_types_are_rejected() {
        let target = parse(serde_json::json!({ "resource_type": "invoice" }))
            .into_target(OrganizationId::new());

        assert!(target.is_err());
    }
}
