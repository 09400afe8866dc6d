//! Weighted signer definitions

use crate::authority::error::AuthorityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a signer within a wallet
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    /// Wallet owner, votes with its weight
    Owner,
    /// Regular signer, votes with its weight
    Signer,
    /// Read-only participant, always weight 0 and never votes
    Viewer,
}

impl SignerRole {
    /// Whether signers with this role receive a vote on new transactions
    pub fn can_vote(&self) -> bool {
        !matches!(self, SignerRole::Viewer)
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignerRole::Owner => "owner",
            SignerRole::Signer => "signer",
            SignerRole::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for SignerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Ok(SignerRole::Owner),
            "signer" => Ok(SignerRole::Signer),
            "viewer" => Ok(SignerRole::Viewer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Request to register a signer
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewSigner {
    /// Opaque identity key (typically a public key or account address)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: SignerRole,
    pub weight: u64,
}

impl NewSigner {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: SignerRole, weight: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            role,
            weight,
        }
    }

    /// Attach a contact email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A registered signer
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Signer {
    /// Unique identity within the roster
    pub id: String,
    /// Display name
    pub name: String,
    pub email: Option<String>,
    pub role: SignerRole,
    /// Voting weight toward the threshold
    pub weight: u64,
    pub is_active: bool,
    pub added_at: DateTime<Utc>,
    /// Last time this signer cast a vote
    pub last_active: Option<DateTime<Utc>>,
}

impl Signer {
    /// Create an active signer from a registration request
    pub fn new(request: NewSigner, added_at: DateTime<Utc>) -> Result<Self, AuthorityError> {
        validate_weight(&request.id, request.role, request.weight)?;

        Ok(Self {
            id: request.id,
            name: request.name,
            email: request.email,
            role: request.role,
            weight: request.weight,
            is_active: true,
            added_at,
            last_active: None,
        })
    }

    /// Weight this signer contributes to the active total
    pub fn active_weight(&self) -> u64 {
        if self.is_active {
            self.weight
        } else {
            0
        }
    }
}

/// Check the weight rules for a role
///
/// Viewers must carry weight 0. Weights are unsigned so negatives cannot be
/// represented.
pub fn validate_weight(signer: &str, role: SignerRole, weight: u64) -> Result<(), AuthorityError> {
    if role == SignerRole::Viewer && weight != 0 {
        return Err(AuthorityError::InvalidWeight {
            signer: signer.to_string(),
            weight,
            reason: "viewers must have weight 0".to_string(),
        });
    }
    Ok(())
}
