use uuid::Uuid;

use whisper_types::models::{Comment, LikeState, LikeTarget, Whisper};

use crate::cache::QueryScope;
use crate::session::Session;
use crate::store::{Result, WallStore};

/// Something that can be liked, with enough context to know which cached
/// queries show its counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeSubject {
    Whisper(Uuid),
    Comment { id: Uuid, whisper_id: Uuid },
}

impl LikeSubject {
    pub fn target(&self) -> LikeTarget {
        match self {
            Self::Whisper(_) => LikeTarget::Whisper,
            Self::Comment { .. } => LikeTarget::Comment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Whisper(id) => *id,
            Self::Comment { id, .. } => *id,
        }
    }

    /// Cached queries that render this subject's counter.
    pub fn affected_scopes(&self) -> Vec<QueryScope> {
        match self {
            Self::Whisper(id) => vec![QueryScope::AllWhisperLists, QueryScope::Whisper(*id)],
            Self::Comment { whisper_id, .. } => vec![QueryScope::Comments(*whisper_id)],
        }
    }
}

/// Local like button state.
///
/// Toggling asks the store for the opposite of what is shown and then
/// adopts whatever the store reports back, so a stale local view heals on
/// the next click instead of drifting the counter.
#[derive(Debug, Clone)]
pub struct LikeToggle {
    subject: LikeSubject,
    state: LikeState,
}

impl LikeToggle {
    pub fn new(subject: LikeSubject, state: LikeState) -> Self {
        Self { subject, state }
    }

    pub fn for_whisper(whisper: &Whisper) -> Self {
        Self::new(LikeSubject::Whisper(whisper.id), whisper.like_state())
    }

    pub fn for_comment(comment: &Comment) -> Self {
        Self::new(
            LikeSubject::Comment {
                id: comment.id,
                whisper_id: comment.whisper_id,
            },
            comment.like_state(),
        )
    }

    pub fn subject(&self) -> LikeSubject {
        self.subject
    }

    pub fn state(&self) -> LikeState {
        self.state
    }

    /// On failure the local state is left as it was.
    pub async fn toggle<S: WallStore + ?Sized>(&mut self, store: &S, session: &Session) -> Result<LikeState> {
        let desired = !self.state.liked;
        let state = store
            .set_like(session, self.subject.target(), self.subject.id(), desired)
            .await?;
        self.state = state;
        Ok(state)
    }
}
