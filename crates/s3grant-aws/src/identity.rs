use crate::error::from_sdk;

use s3grant::backend::{IdentityRecord, PolicyList};
use s3grant::{BackendError, BackendResult, IdentityBackend};

use aws_sdk_iam::Client;
use aws_smithy_types::date_time::Format;
use tracing::debug;

/// An [`IdentityBackend`] backed by `aws-sdk-iam`.
#[derive(Debug, Clone)]
pub struct IamIdentity {
    client: Client,
}

impl IamIdentity {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Client> for IamIdentity {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait::async_trait]
impl IdentityBackend for IamIdentity {
    async fn get_identity(&self, name: &str) -> BackendResult<IdentityRecord> {
        let output = self
            .client
            .get_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("GetUser", e))?;

        let user = output
            .user()
            .ok_or_else(|| BackendError::not_found(format!("GetUser: no user named {name}")))?;

        Ok(IdentityRecord {
            user_name: user.user_name().to_owned(),
            user_id: user.user_id().to_owned(),
            arn: user.arn().to_owned(),
            path: user.path().to_owned(),
            create_date: user.create_date().fmt(Format::DateTime).ok(),
        })
    }

    async fn list_attached_policies(&self, name: &str) -> BackendResult<PolicyList> {
        let inline = self
            .client
            .list_user_policies()
            .user_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("ListUserPolicies", e))?;

        let managed = self
            .client
            .list_attached_user_policies()
            .user_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("ListAttachedUserPolicies", e))?;

        let policies = PolicyList {
            policy_names: inline.policy_names().to_vec(),
            attached_policies: managed
                .attached_policies()
                .iter()
                .filter_map(|p| p.policy_name().map(str::to_owned))
                .collect(),
        };
        debug!(name, %policies, "listed policies");
        Ok(policies)
    }
}
