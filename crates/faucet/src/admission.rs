//! Per-network rate-limit windows.
//!
//! The ledger tracks one [`RateLimitEntry`] per live principal — the
//! requester identity and the destination address are gated
//! independently, so blocking either blocks the net effect. Entries
//! are lazily deleted when a lookup finds them expired.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::REJECT_EMOJI;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected {
        retry_after: Duration,
        /// Pre-formatted reply for the requester.
        reply: String,
    },
}

/// One live rate-limit window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub expires_at: DateTime<Utc>,
    pub request_count: u32,
}

/// In-memory admission state, keyed by network id then principal.
#[derive(Debug, Default)]
pub struct AdmissionLedger {
    windows: HashMap<String, HashMap<String, RateLimitEntry>>,
}

impl AdmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `(requester, address)` may receive funds on
    /// `network_id` right now, and reserve the admission if so.
    ///
    /// A principal with a live entry at `cap` rejects the request; a
    /// live entry under `cap` is incremented (consuming one more use
    /// of its window). Fresh entries for both principals are created
    /// only when neither holds a live entry afterwards.
    pub fn check_and_reserve(
        &mut self,
        network_id: &str,
        requester: &str,
        address: &str,
        cap: u32,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Admission {
        let entries = self.windows.entry(network_id.to_string()).or_default();

        if let Some(rejection) = gate(entries, requester, cap, timeout, now) {
            return rejection;
        }
        if let Some(rejection) = gate(entries, address, cap, timeout, now) {
            return rejection;
        }

        if !entries.contains_key(requester) && !entries.contains_key(address) {
            let fresh = RateLimitEntry {
                expires_at: now + timeout,
                request_count: 1,
            };
            entries.insert(requester.to_string(), fresh.clone());
            entries.insert(address.to_string(), fresh);
        }

        Admission::Admitted
    }

    /// Undo one admission after a later-stage failure: decrement the
    /// counts and drop entries that reach zero. `expires_at` is left
    /// untouched so a rolled-back principal does not regain a fresh
    /// full window early.
    pub fn rollback(&mut self, network_id: &str, requester: &str, address: &str) {
        let Some(entries) = self.windows.get_mut(network_id) else {
            return;
        };
        for principal in [requester, address] {
            if let Some(entry) = entries.get_mut(principal) {
                entry.request_count = entry.request_count.saturating_sub(1);
                if entry.request_count == 0 {
                    entries.remove(principal);
                }
            }
        }
    }

    /// The live request count for a principal, if its window has not
    /// expired.
    pub fn live_count(
        &self,
        network_id: &str,
        principal: &str,
        now: DateTime<Utc>,
    ) -> Option<u32> {
        self.windows
            .get(network_id)?
            .get(principal)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.request_count)
    }
}

/// Check one principal's window: reject at cap, increment under cap,
/// drop when expired.
fn gate(
    entries: &mut HashMap<String, RateLimitEntry>,
    principal: &str,
    cap: u32,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Option<Admission> {
    match entries.get_mut(principal) {
        Some(entry) if now < entry.expires_at => {
            if entry.request_count >= cap {
                let retry_after = entry.expires_at - now;
                Some(Admission::Rejected {
                    retry_after,
                    reply: rate_limit_reply(cap, timeout, retry_after),
                })
            } else {
                entry.request_count += 1;
                None
            }
        }
        Some(_) => {
            entries.remove(principal);
            None
        }
        None => None,
    }
}

fn rate_limit_reply(cap: u32, timeout: Duration, retry_after: Duration) -> String {
    let minutes_left = retry_after.num_minutes();
    let wait_time = if minutes_left > 120 {
        format!("{} hours", minutes_left / 60)
    } else {
        format!("{minutes_left} minutes")
    };

    let how_many = match cap {
        0 | 1 => "once".to_string(),
        2 => "twice".to_string(),
        n => format!("{n} times"),
    };

    format!(
        "{REJECT_EMOJI} You can request coins no more than {how_many} every {} hours, \
         please try again in {wait_time}",
        timeout.num_hours()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: &str = "dymension_100-1";
    const TIMEOUT_HOURS: i64 = 6;

    fn timeout() -> Duration {
        Duration::hours(TIMEOUT_HOURS)
    }

    fn check(
        ledger: &mut AdmissionLedger,
        requester: &str,
        address: &str,
        cap: u32,
        now: DateTime<Utc>,
    ) -> Admission {
        ledger.check_and_reserve(NET, requester, address, cap, timeout(), now)
    }

    #[test]
    fn test_cap_two_window_scenario() {
        let mut ledger = AdmissionLedger::new();
        let t0 = Utc::now();

        assert_eq!(check(&mut ledger, "alice", "dym1a", 2, t0), Admission::Admitted);
        assert_eq!(ledger.live_count(NET, "alice", t0), Some(1));

        let t1 = t0 + Duration::seconds(1);
        assert_eq!(check(&mut ledger, "alice", "dym1a", 2, t1), Admission::Admitted);
        assert_eq!(ledger.live_count(NET, "alice", t1), Some(2));

        let t2 = t0 + Duration::seconds(2);
        match check(&mut ledger, "alice", "dym1a", 2, t2) {
            Admission::Rejected { retry_after, reply } => {
                assert!(retry_after <= timeout());
                assert!(retry_after > timeout() - Duration::minutes(1));
                assert!(reply.contains("twice"));
                assert!(reply.contains("6 hours"));
            }
            Admission::Admitted => panic!("third request must be rejected"),
        }

        // Fresh window after expiry.
        let t3 = t0 + timeout() + Duration::seconds(1);
        assert_eq!(check(&mut ledger, "alice", "dym1a", 2, t3), Admission::Admitted);
        assert_eq!(ledger.live_count(NET, "alice", t3), Some(1));
    }

    #[test]
    fn test_address_gate_is_independent() {
        let mut ledger = AdmissionLedger::new();
        let now = Utc::now();

        assert_eq!(check(&mut ledger, "alice", "dym1shared", 1, now), Admission::Admitted);

        // A different requester reusing the address is blocked by the
        // address window alone.
        match check(&mut ledger, "bob", "dym1shared", 1, now) {
            Admission::Rejected { reply, .. } => assert!(reply.contains("once")),
            Admission::Admitted => panic!("shared address must be rejected"),
        }
        // And bob got no entry of his own.
        assert_eq!(ledger.live_count(NET, "bob", now), None);
    }

    #[test]
    fn test_requester_gate_blocks_fresh_address() {
        let mut ledger = AdmissionLedger::new();
        let now = Utc::now();

        assert_eq!(check(&mut ledger, "alice", "dym1a", 1, now), Admission::Admitted);
        assert!(matches!(
            check(&mut ledger, "alice", "dym1b", 1, now),
            Admission::Rejected { .. }
        ));
        assert_eq!(ledger.live_count(NET, "dym1b", now), None);
    }

    #[test]
    fn test_expired_entries_are_lazily_deleted() {
        let mut ledger = AdmissionLedger::new();
        let t0 = Utc::now();
        assert_eq!(check(&mut ledger, "alice", "dym1a", 1, t0), Admission::Admitted);

        let later = t0 + timeout() + Duration::seconds(1);
        assert_eq!(ledger.live_count(NET, "alice", later), None);
        assert_eq!(check(&mut ledger, "alice", "dym1a", 1, later), Admission::Admitted);
        assert_eq!(ledger.live_count(NET, "alice", later), Some(1));
    }

    #[test]
    fn test_rollback_is_inverse_of_fresh_admission() {
        let mut ledger = AdmissionLedger::new();
        let now = Utc::now();
        assert_eq!(check(&mut ledger, "alice", "dym1a", 2, now), Admission::Admitted);

        ledger.rollback(NET, "alice", "dym1a");
        assert_eq!(ledger.live_count(NET, "alice", now), None);
        assert_eq!(ledger.live_count(NET, "dym1a", now), None);
    }

    #[test]
    fn test_rollback_preserves_window_expiry() {
        let mut ledger = AdmissionLedger::new();
        let t0 = Utc::now();
        assert_eq!(check(&mut ledger, "alice", "dym1a", 3, t0), Admission::Admitted);
        assert_eq!(check(&mut ledger, "alice", "dym1a", 3, t0), Admission::Admitted);

        // Undoing the second admission leaves the first window intact.
        ledger.rollback(NET, "alice", "dym1a");
        assert_eq!(ledger.live_count(NET, "alice", t0), Some(1));
        assert_eq!(ledger.live_count(NET, "dym1a", t0), Some(1));
    }

    #[test]
    fn test_networks_do_not_share_windows() {
        let mut ledger = AdmissionLedger::new();
        let now = Utc::now();
        assert_eq!(check(&mut ledger, "alice", "dym1a", 1, now), Admission::Admitted);
        assert_eq!(
            ledger.check_and_reserve("rollapp_2-1", "alice", "dym1a", 1, timeout(), now),
            Admission::Admitted
        );
    }
}
