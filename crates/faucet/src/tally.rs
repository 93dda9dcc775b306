//! Per-network daily issuance budget.

use chrono::NaiveDate;
use std::collections::HashMap;

/// Running tally of the amount reserved or issued today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTally {
    pub active_day: NaiveDate,
    pub day_tally: u128,
}

/// Tracks each network's daily budget. The tally resets lazily on the
/// first reservation of a new calendar day; no background timer.
#[derive(Debug, Default)]
pub struct DailyCapTracker {
    tallies: HashMap<String, DailyTally>,
}

impl DailyCapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tentatively reserve `amount` against the cap. A fresh day (or
    /// an unseen network) always succeeds and starts the tally at
    /// `amount`; otherwise the reservation fails without mutation when
    /// it would push the tally over `cap`.
    pub fn try_reserve(
        &mut self,
        network_id: &str,
        amount: u128,
        cap: u128,
        today: NaiveDate,
    ) -> bool {
        match self.tallies.get_mut(network_id) {
            Some(tally) if tally.active_day == today => {
                if tally.day_tally + amount > cap {
                    return false;
                }
                tally.day_tally += amount;
                true
            }
            _ => {
                self.tallies.insert(
                    network_id.to_string(),
                    DailyTally {
                        active_day: today,
                        day_tally: amount,
                    },
                );
                true
            }
        }
    }

    /// Undo a reservation. Best-effort counter, not a hard accounting
    /// ledger: it saturates at zero and is a no-op for unseen
    /// networks.
    pub fn rollback(&mut self, network_id: &str, amount: u128) {
        if let Some(tally) = self.tallies.get_mut(network_id) {
            tally.day_tally = tally.day_tally.saturating_sub(amount);
        }
    }

    /// Today's tally for a network, if any reservation happened.
    pub fn day_tally(&self, network_id: &str) -> Option<u128> {
        self.tallies.get(network_id).map(|tally| tally.day_tally)
    }
}
