use serde::{Deserialize, Serialize};

use crate::authority::Authority;
use crate::curve::VestingWindow;
use crate::error::VestingError;
use crate::types::{AccountId, Percent, Timestamp};

/// Configuration of a fixed-grant ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedLedgerConfig {
    /// The only account allowed to issue grants.
    pub authority: AccountId,
    /// Account holding the staked receipts that pay out claims.
    pub custody: AccountId,
}

impl FixedLedgerConfig {
    pub fn validate(&self) -> Result<(), VestingError> {
        if self.authority == self.custody {
            return Err(VestingError::InvalidConfig(
                "custody account must differ from the authority".into(),
            ));
        }
        Ok(())
    }

    pub fn authority(&self) -> Authority {
        Authority::new(self.authority.clone())
    }
}

/// Configuration of a percent-of-supply ledger. The vesting window is shared
/// by every beneficiary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyLedgerConfig {
    pub authority: AccountId,
    /// Receives the payment asset on every claim.
    pub treasury: AccountId,
    pub start_vest: Timestamp,
    pub full_vest: Timestamp,
    /// Ceiling on the sum of all granted percents.
    pub max_allocation: Percent,
}

impl SupplyLedgerConfig {
    pub fn validate(&self) -> Result<(), VestingError> {
        if self.full_vest <= self.start_vest {
            return Err(VestingError::InvalidConfig(format!(
                "full_vest {} must be after start_vest {}",
                self.full_vest, self.start_vest
            )));
        }
        if self.max_allocation.is_zero() || self.max_allocation > Percent::FULL {
            return Err(VestingError::InvalidConfig(format!(
                "max_allocation {} must be within (0%, 100%]",
                self.max_allocation
            )));
        }
        Ok(())
    }

    pub fn window(&self) -> Result<VestingWindow, VestingError> {
        VestingWindow::between(self.start_vest, self.full_vest)
    }

    pub fn authority(&self) -> Authority {
        Authority::new(self.authority.clone())
    }
}
