use parley_bridge::Epoch;

/// Lifecycle of the single in-flight chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    /// Request sent, no tokens yet.
    Loading(Epoch),
    /// Scratch entry holds the latest cumulative snapshot.
    Streaming(Epoch),
    /// End-of-stream received; settles to `Idle` once the turn is committed.
    Finalizing(Epoch),
    /// User cancelled. Epoch-less host envelopes are dropped until a new turn.
    Stopped(Epoch),
}

/// State transition input for the turn lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransition {
    Begin(Epoch),
    Token(Epoch),
    End(Epoch),
    Stop,
    Settle,
}

/// Rejection reason for illegal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyGenerating { active: Epoch, attempted: Epoch },
    NoActiveTurn,
    EpochMismatch { active: Epoch, attempted: Epoch },
    NotFinalizing,
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    /// Epoch of a turn that still accepts host envelopes.
    pub fn live_epoch(&self) -> Option<Epoch> {
        match self {
            Self::Loading(epoch) | Self::Streaming(epoch) => Some(*epoch),
            Self::Idle | Self::Finalizing(_) | Self::Stopped(_) => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.live_epoch().is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }

    /// True when an envelope tagged with `epoch` belongs to the live turn.
    pub fn accepts(&self, epoch: Epoch) -> bool {
        self.live_epoch() == Some(epoch)
    }

    /// Applies one transition.
    ///
    /// A new turn may begin from any non-generating state. Token and end
    /// transitions must match the live epoch exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Begin(epoch) => self.apply_begin(epoch),
            StreamTransition::Token(epoch) => self.apply_live(epoch, Self::Streaming),
            StreamTransition::End(epoch) => self.apply_live(epoch, Self::Finalizing),
            StreamTransition::Stop => self.apply_stop(),
            StreamTransition::Settle => self.apply_settle(),
        }
    }

    fn apply_begin(&self, epoch: Epoch) -> StreamTransitionResult {
        match self.live_epoch() {
            Some(active) if active != epoch => Err(StreamTransitionRejection::AlreadyGenerating {
                active,
                attempted: epoch,
            }),
            Some(_) => Ok(*self),
            None => Ok(Self::Loading(epoch)),
        }
    }

    fn apply_live(&self, epoch: Epoch, next: fn(Epoch) -> Self) -> StreamTransitionResult {
        match self.live_epoch() {
            Some(active) if active == epoch => Ok(next(epoch)),
            Some(active) => Err(StreamTransitionRejection::EpochMismatch {
                active,
                attempted: epoch,
            }),
            None => Err(StreamTransitionRejection::NoActiveTurn),
        }
    }

    fn apply_stop(&self) -> StreamTransitionResult {
        match self.live_epoch() {
            Some(active) => Ok(Self::Stopped(active)),
            None => Err(StreamTransitionRejection::NoActiveTurn),
        }
    }

    fn apply_settle(&self) -> StreamTransitionResult {
        match self {
            Self::Finalizing(_) => Ok(Self::Idle),
            Self::Idle | Self::Loading(_) | Self::Streaming(_) | Self::Stopped(_) => {
                Err(StreamTransitionRejection::NotFinalizing)
            }
        }
    }
}
