//! Identity check
//!
//! Confirms that the cluster's admin identity exists and has policies attached. Customers
//! sometimes withhold IAM read permission even when storage access is correct, so the
//! pipeline turns every failure here into a warning.

use crate::backend::{BackendError, IdentityBackend, IdentityRecord, PolicyList};

use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity {name} was not found")]
    NotFound { name: String },

    #[error("identity {name} does not appear to have an administrative policy attached")]
    NoPolicies { name: String },

    #[error("could not verify identity {name}: {source}")]
    Backend {
        name: String,
        #[source]
        source: BackendError,
    },
}

/// Fetches the identity and its policies.
///
/// # Errors
/// Returns an error if the identity is missing, has no policies, or the backend fails.
#[tracing::instrument(skip(backend))]
pub async fn check_identity(backend: &dyn IdentityBackend, name: &str) -> Result<(IdentityRecord, PolicyList), IdentityError> {
    info!("checking account setup for {name} and policies");

    let backend_err = |source: BackendError| match source {
        BackendError::NotFound(_) => IdentityError::NotFound { name: name.to_owned() },
        source => IdentityError::Backend {
            name: name.to_owned(),
            source,
        },
    };

    let identity = backend.get_identity(name).await.map_err(backend_err)?;
    if identity.user_name.is_empty() {
        return Err(IdentityError::NotFound { name: name.to_owned() });
    }
    debug!(arn = %identity.arn, "found identity");

    let policies = backend.list_attached_policies(name).await.map_err(backend_err)?;
    if policies.is_empty() {
        return Err(IdentityError::NoPolicies { name: name.to_owned() });
    }
    debug!(%policies, "found policies");

    Ok((identity, policies))
}
