use serde::{Deserialize, Serialize};

use crate::error::VestingError;
use crate::types::AccountId;

/// The single identity allowed to issue grants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(pub AccountId);

impl Authority {
    pub fn new(id: AccountId) -> Self {
        Self(id)
    }

    pub fn id(&self) -> &AccountId {
        &self.0
    }

    /// Rejects every caller except the stored authority.
    pub fn ensure(&self, caller: &AccountId) -> Result<(), VestingError> {
        if *caller == self.0 {
            Ok(())
        } else {
            Err(VestingError::Unauthorized(caller.to_string()))
        }
    }
}
