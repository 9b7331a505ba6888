//! Query results returned by the chain node.

use serde::{Deserialize, Serialize};
use shared_types::{AccountId, BlockNumber, CollectionId};

/// Collection metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection id.
    pub id: CollectionId,
    /// Collection owner.
    pub owner: AccountId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Token prefix shown in wallets.
    #[serde(default)]
    pub token_prefix: String,
}

/// Chain head as reported by the node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadInfo {
    /// Best block number.
    pub number: BlockNumber,
}

/// Identifier the node assigns to a submitted call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionId(pub String);
