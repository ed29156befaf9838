//! Claims extracted from source material.

use serde::{Deserialize, Serialize};

/// Role a claim plays in the source argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// The central thesis of the source
    CoreThesis,
    /// An analytical framework the source applies
    Framework,
    /// A meta-observation about the argument itself
    Meta,
    /// A counterargument acknowledged by the source
    Counter,
    /// Any other supporting claim
    Claim,
}

impl Default for ClaimKind {
    fn default() -> Self {
        Self::Claim
    }
}

impl std::fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoreThesis => write!(f, "core_thesis"),
            Self::Framework => write!(f, "framework"),
            Self::Meta => write!(f, "meta"),
            Self::Counter => write!(f, "counter"),
            Self::Claim => write!(f, "claim"),
        }
    }
}

impl std::str::FromStr for ClaimKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core_thesis" => Ok(Self::CoreThesis),
            "framework" => Ok(Self::Framework),
            "meta" => Ok(Self::Meta),
            "counter" => Ok(Self::Counter),
            "claim" => Ok(Self::Claim),
            _ => Err(()),
        }
    }
}

/// A claim extracted from source material. Immutable once added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Unique id (e.g. "CLAIM-1")
    pub id: String,
    /// Role tag
    #[serde(rename = "type", default)]
    pub kind: ClaimKind,
    /// Summary text (1-2 sentences)
    pub text: String,
    /// Verbatim source quote
    #[serde(default)]
    pub snippet: String,
    /// Byte offsets of the quote in the source text, when located
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<(usize, usize)>,
}

impl Claim {
    /// Create a claim without source offsets.
    pub fn new(
        id: impl Into<String>,
        kind: ClaimKind,
        text: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
            snippet: snippet.into(),
            offsets: None,
        }
    }

    /// Attach the quote offsets located in the source text.
    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.offsets = Some((start, end));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_kind_roundtrip() {
        for kind in [
            ClaimKind::CoreThesis,
            ClaimKind::Framework,
            ClaimKind::Meta,
            ClaimKind::Counter,
            ClaimKind::Claim,
        ] {
            let parsed: ClaimKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_claim_serde_uses_type_field() {
        let claim = Claim::new("CLAIM-1", ClaimKind::CoreThesis, "text", "quote");
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["type"], "core_thesis");

        let back: Claim = serde_json::from_value(json).unwrap();
        assert_eq!(back, claim);
    }
}
