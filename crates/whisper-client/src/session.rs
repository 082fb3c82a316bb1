use uuid::Uuid;

/// An authenticated identity. Passed explicitly to every store call that
/// needs one; there is no ambient current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

impl Session {
    pub fn new(user_id: Uuid, email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            token: token.into(),
        }
    }
}
