//! Principal identifiers.

use serde::{Deserialize, Serialize};

/// Stable identifier of an interacting user.
///
/// The value is the chat platform's numeric user id; it is never created or
/// destroyed by Lifeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct Principal(pub i64);

impl Principal {
    /// Raw numeric id.
    pub fn id(&self) -> i64 {
        self.0
    }
}
