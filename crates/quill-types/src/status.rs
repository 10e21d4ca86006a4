use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Lifecycle status of a document.
///
/// ```text
/// draft -> awaiting_signatures -> partially_signed -> completed
///                  |                     |
///                  +------> rejected | expired <-----+
/// ```
///
/// Transitions only move forward; nothing ever returns to `Draft`, and the
/// three terminal states accept no further transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    AwaitingSignatures,
    PartiallySigned,
    Completed,
    Rejected,
    Expired,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::AwaitingSignatures => "awaiting_signatures",
            Self::PartiallySigned => "partially_signed",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Returns `true` for states that accept no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Expired)
    }

    /// Returns `true` if a new signed version may be appended.
    pub fn accepts_signatures(&self) -> bool {
        matches!(self, Self::AwaitingSignatures | Self::PartiallySigned)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::AwaitingSignatures => 1,
            Self::PartiallySigned => 2,
            Self::Completed | Self::Rejected | Self::Expired => 3,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic state
    /// machine. Re-entering the same non-terminal state is allowed (a second
    /// partial signature leaves the document `PartiallySigned`).
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        if self.is_terminal() || next == Self::Draft {
            return false;
        }
        next.rank() >= self.rank()
    }

    /// Status of a document once it holds `signed_versions` signed versions
    /// out of `required` signatures.
    pub fn after_signature(signed_versions: u32, required: u32) -> Self {
        if signed_versions >= required.max(1) {
            Self::Completed
        } else {
            Self::PartiallySigned
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "awaiting_signatures" => Ok(Self::AwaitingSignatures),
            "partially_signed" => Ok(Self::PartiallySigned),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            other => Err(TypeError::UnknownStatus(other.into())),
        }
    }
}

/// Lifecycle stage a version's content belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStage {
    /// Prepared document before any signature is applied.
    Unsigned,
    /// Document with one or more signature overlays applied.
    Signed,
}

impl VersionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
        }
    }
}

impl fmt::Display for VersionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStage {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsigned" => Ok(Self::Unsigned),
            "signed" => Ok(Self::Signed),
            other => Err(TypeError::UnknownStage(other.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DocumentStatus; 6] = [
        DocumentStatus::Draft,
        DocumentStatus::AwaitingSignatures,
        DocumentStatus::PartiallySigned,
        DocumentStatus::Completed,
        DocumentStatus::Rejected,
        DocumentStatus::Expired,
    ];

    #[test]
    fn nothing_returns_to_draft() {
        for status in ALL {
            assert!(!status.can_transition_to(DocumentStatus::Draft));
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            for next in ALL {
                assert!(!status.can_transition_to(next), "{status} -> {next}");
            }
        }
    }

    #[test]
    fn forward_transitions_allowed() {
        use DocumentStatus::*;
        assert!(Draft.can_transition_to(AwaitingSignatures));
        assert!(AwaitingSignatures.can_transition_to(PartiallySigned));
        assert!(AwaitingSignatures.can_transition_to(Completed));
        assert!(PartiallySigned.can_transition_to(PartiallySigned));
        assert!(PartiallySigned.can_transition_to(Completed));
        assert!(PartiallySigned.can_transition_to(Rejected));
        assert!(AwaitingSignatures.can_transition_to(Expired));
    }

    #[test]
    fn backward_transitions_refused() {
        use DocumentStatus::*;
        assert!(!PartiallySigned.can_transition_to(AwaitingSignatures));
    }

    #[test]
    fn signature_count_decides_completion() {
        use DocumentStatus::*;
        assert_eq!(DocumentStatus::after_signature(1, 1), Completed);
        assert_eq!(DocumentStatus::after_signature(1, 3), PartiallySigned);
        assert_eq!(DocumentStatus::after_signature(3, 3), Completed);
        assert_eq!(DocumentStatus::after_signature(1, 0), Completed);
    }

    #[test]
    fn string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
        assert!("signed".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&DocumentStatus::AwaitingSignatures).unwrap();
        assert_eq!(json, "\"awaiting_signatures\"");
    }

    #[test]
    fn stage_roundtrip() {
        assert_eq!("signed".parse::<VersionStage>().unwrap(), VersionStage::Signed);
        assert!("draft".parse::<VersionStage>().is_err());
    }
}
