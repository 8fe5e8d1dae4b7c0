use std::fmt;

/// Stage of a headphone check run.
///
/// Pages are zero-indexed. `Paging` means the page is ready to be shown;
/// `AwaitingResponses` means it has been presented and the machine waits
/// for the host's continue signal.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckPhase {
    #[default]
    Uninitialized,
    AwaitingStimuli,
    Calibrating,
    Paging { page: usize },
    AwaitingResponses { page: usize },
    Complete,
}

impl CheckPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::AwaitingResponses { .. })
    }

    pub fn requires_calibration(&self) -> bool {
        matches!(self, Self::Calibrating)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Active page, if the run is inside the paged section.
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::Paging { page } | Self::AwaitingResponses { page } => Some(*page),
            _ => None,
        }
    }
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::AwaitingStimuli => f.write_str("awaiting stimuli"),
            Self::Calibrating => f.write_str("calibrating"),
            Self::Paging { page } => write!(f, "paging (page {page})"),
            Self::AwaitingResponses { page } => write!(f, "awaiting responses (page {page})"),
            Self::Complete => f.write_str("complete"),
        }
    }
}
