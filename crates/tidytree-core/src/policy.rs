//! Retention policy selector.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which member of a duplicate class survives.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KeepPolicy {
    /// Keep the first-discovered file.
    #[default]
    KeepFirst,
    /// Keep the last-discovered file.
    KeepLast,
}
