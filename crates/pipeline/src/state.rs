use std::fmt;

/// Where a requester's transfer stands.
///
/// `Done`, `Failed` and `Cancelled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    Idle,
    AwaitingLink,
    LinkSubmitted,
    AwaitingNameChoice,
    Downloading,
    SizeCheck,
    Uploading,
    Done,
    Failed,
    Cancelled,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: TransferState) -> bool {
        use TransferState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, AwaitingLink)
                | (Idle, LinkSubmitted)
                | (AwaitingLink, LinkSubmitted)
                | (LinkSubmitted, AwaitingLink)
                | (LinkSubmitted, AwaitingNameChoice)
                | (AwaitingNameChoice, AwaitingNameChoice)
                | (AwaitingNameChoice, Downloading)
                | (Downloading, SizeCheck)
                | (SizeCheck, Uploading)
                | (Uploading, Done)
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingLink => "awaiting_link",
            Self::LinkSubmitted => "link_submitted",
            Self::AwaitingNameChoice => "awaiting_name_choice",
            Self::Downloading => "downloading",
            Self::SizeCheck => "size_check",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
