use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::Currency;

/// Host-wide accounting totals. Only ever moved by deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub space_remaining: i64,
    pub anticipated_revenue: Currency,
    pub revenue: Currency,
    pub lost_revenue: Currency,
}

impl Ledger {
    pub fn new(total_storage: i64) -> Self {
        Self {
            space_remaining: total_storage,
            ..Default::default()
        }
    }

    /// Takes on a new obligation's terms.
    pub fn commit(&mut self, file_size: u64, value: Currency) {
        self.space_remaining -= file_size as i64;
        self.anticipated_revenue += value;
    }

    /// Swaps an obligation's old terms for revised ones.
    pub fn revise(&mut self, old_size: u64, old_value: Currency, new_size: u64, new_value: Currency) {
        self.space_remaining += old_size as i64;
        self.space_remaining -= new_size as i64;
        self.anticipated_revenue = self.withdraw_anticipated(old_value);
        self.anticipated_revenue += new_value;
    }

    pub fn release_space(&mut self, bytes: u64) {
        self.space_remaining += bytes as i64;
    }

    /// Moves a resolved obligation's value out of anticipated revenue.
    pub fn resolve(&mut self, value: Currency, successful: bool) {
        self.anticipated_revenue = self.withdraw_anticipated(value);
        if successful {
            self.revenue += value;
        } else {
            self.lost_revenue += value;
        }
    }

    fn withdraw_anticipated(&self, value: Currency) -> Currency {
        self.anticipated_revenue
            .checked_sub(value)
            .unwrap_or_else(|| {
                error!(
                    "Anticipated revenue {} is smaller than withdrawn value {}",
                    self.anticipated_revenue, value
                );
                Currency::ZERO
            })
    }
}
