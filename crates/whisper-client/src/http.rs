use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use whisper_types::api::{
    ClearHistoryResponse, CreateCommentRequest, CreateWhisperRequest, ErrorBody, LoginRequest, LoginResponse,
    RecordSearchRequest, RegisterRequest, RegisterResponse, UpdateProfileRequest, WhisperListQuery,
};
use whisper_types::models::{Comment, LikeState, LikeTarget, Profile, SearchHistoryItem, Whisper};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::Session;
use crate::store::{Result, WallStore};

/// `WallStore` over the wall's REST API.
#[derive(Clone)]
pub struct HttpStore {
    http: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match session {
            Some(session) => builder.bearer_auth(&session.token),
            None => builder,
        }
    }

    fn like_path(target: LikeTarget, id: Uuid) -> String {
        match target {
            LikeTarget::Whisper => format!("/whispers/{}/like", id),
            LikeTarget::Comment => format!("/comments/{}/like", id),
        }
    }
}

/// Turns a non-success response into `ClientError::Rejected`, keeping the
/// server's error message when it sent one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    debug!("Request rejected with {}: {}", status, message);

    Err(ClientError::Rejected { status, message })
}

async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
    let response = check(builder.send().await?).await?;
    Ok(response.json().await?)
}

/// Like `send`, but a 404 from the API itself becomes `Ok(None)`.
async fn send_optional<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Option<T>> {
    let response = builder.send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        absent(response).await?;
        return Ok(None);
    }
    Ok(Some(check(response).await?.json().await?))
}

/// Accepts a 404 only when it carries the API's JSON error body. A bare 404,
/// such as an unmatched route behind a wrong base URL, stays an error.
async fn absent(response: Response) -> Result<()> {
    let path = response.url().path().to_string();
    let text = response.text().await.unwrap_or_default();
    if serde_json::from_str::<ErrorBody>(&text).is_ok() {
        return Ok(());
    }

    let message = if text.is_empty() {
        format!("no route for {}", path)
    } else {
        text
    };
    debug!("Request rejected with 404: {}", message);
    Err(ClientError::Rejected {
        status: StatusCode::NOT_FOUND,
        message,
    })
}

async fn send_empty(builder: RequestBuilder) -> Result<()> {
    check(builder.send().await?).await?;
    Ok(())
}

#[async_trait]
impl WallStore for HttpStore {
    async fn register(&self, email: &str, password: &str, full_name: Option<&str>) -> Result<Session> {
        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.map(str::to_string),
        };
        let resp: RegisterResponse = send(self.request(Method::POST, "/auth/register", None).json(&req)).await?;
        Ok(Session::new(resp.user_id, email.trim().to_lowercase(), resp.token))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = send(self.request(Method::POST, "/auth/login", None).json(&req)).await?;
        Ok(Session::new(resp.user_id, resp.email, resp.token))
    }

    async fn list_whispers(&self, session: Option<&Session>, query: &WhisperListQuery) -> Result<Vec<Whisper>> {
        send(self.request(Method::GET, "/whispers", session).query(query)).await
    }

    async fn get_whisper(&self, session: Option<&Session>, id: Uuid) -> Result<Option<Whisper>> {
        send_optional(self.request(Method::GET, &format!("/whispers/{}", id), session)).await
    }

    async fn create_whisper(&self, session: &Session, req: &CreateWhisperRequest) -> Result<Whisper> {
        send(self.request(Method::POST, "/whispers", Some(session)).json(req)).await
    }

    async fn delete_whisper(&self, session: &Session, id: Uuid) -> Result<()> {
        send_empty(self.request(Method::DELETE, &format!("/whispers/{}", id), Some(session))).await
    }

    async fn list_comments(&self, session: Option<&Session>, whisper_id: Uuid) -> Result<Option<Vec<Comment>>> {
        send_optional(self.request(Method::GET, &format!("/whispers/{}/comments", whisper_id), session)).await
    }

    async fn add_comment(&self, session: &Session, whisper_id: Uuid, req: &CreateCommentRequest) -> Result<Comment> {
        send(
            self.request(Method::POST, &format!("/whispers/{}/comments", whisper_id), Some(session))
                .json(req),
        )
        .await
    }

    async fn set_like(&self, session: &Session, target: LikeTarget, id: Uuid, liked: bool) -> Result<LikeState> {
        let method = if liked { Method::PUT } else { Method::DELETE };
        send(self.request(method, &Self::like_path(target, id), Some(session))).await
    }

    async fn get_profile(&self, session: &Session) -> Result<Option<Profile>> {
        send_optional(self.request(Method::GET, "/profile", Some(session))).await
    }

    async fn update_profile(&self, session: &Session, req: &UpdateProfileRequest) -> Result<Profile> {
        send(self.request(Method::PATCH, "/profile", Some(session)).json(req)).await
    }

    async fn list_search_history(&self, session: &Session) -> Result<Vec<SearchHistoryItem>> {
        send(self.request(Method::GET, "/search-history", Some(session))).await
    }

    async fn record_search(&self, session: &Session, req: &RecordSearchRequest) -> Result<SearchHistoryItem> {
        send(self.request(Method::POST, "/search-history", Some(session)).json(req)).await
    }

    async fn delete_search_item(&self, session: &Session, id: Uuid) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/search-history/{}", id), Some(session))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Already gone is as good as deleted
            return absent(response).await;
        }
        check(response).await?;
        Ok(())
    }

    async fn clear_search_history(&self, session: &Session) -> Result<usize> {
        let resp: ClearHistoryResponse = send(self.request(Method::DELETE, "/search-history", Some(session))).await?;
        Ok(resp.deleted)
    }
}
