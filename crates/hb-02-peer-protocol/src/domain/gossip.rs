//! # Announce Relay Rules
//!
//! Pure decisions for the fire-and-forget announce relay. Delivery and
//! dialing live in the session and node layers.

use shared_types::{Address, Hostname};

/// Whether a peer reachable at `target` should be told about `announced`.
///
/// A peer is never told about itself.
pub fn should_announce_to(target: Option<&Hostname>, announced: &Hostname) -> bool {
    target.is_some_and(|target| target != announced)
}

/// Outcome of evaluating a received announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceDecision {
    Dial,
    SkipSelf,
    SkipConnected,
}

/// Decide whether an announced hostname is worth dialing.
///
/// `is_connected` reports whether a session to that hostname already exists.
/// The address-level checks happen again after the `/auth` fetch, when the
/// announced node's address is known.
pub fn evaluate_announce(
    announced: &Hostname,
    own_hostname: &Hostname,
    is_connected: impl FnOnce(&Hostname) -> bool,
) -> AnnounceDecision {
    if announced == own_hostname {
        AnnounceDecision::SkipSelf
    } else if is_connected(announced) {
        AnnounceDecision::SkipConnected
    } else {
        AnnounceDecision::Dial
    }
}

/// Address-level check once the announced node proved its address.
pub fn evaluate_address(
    address: &Address,
    own_address: &Address,
    is_connected: impl FnOnce(&Address) -> bool,
) -> AnnounceDecision {
    if address == own_address {
        AnnounceDecision::SkipSelf
    } else if is_connected(address) {
        AnnounceDecision::SkipConnected
    } else {
        AnnounceDecision::Dial
    }
}
