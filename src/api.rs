//! HTTP client for the remote access-control service.
//!
//! Implements [`RoleClient`] and [`MemberClient`] over a small JSON REST
//! surface rooted at the configured API URL:
//!
//! | Call                 | Request                          |
//! |----------------------|----------------------------------|
//! | `list_roles`         | `GET /roles`                     |
//! | `get_role`           | `GET /roles/{name}`              |
//! | `create_role`        | `POST /roles`                    |
//! | `update_role`        | `PUT /roles/{name}`              |
//! | `delete_role`        | `DELETE /roles/{name}`           |
//! | `get_team_members`   | `GET /members`                   |
//! | `assign_member_role` | `PUT /members/{email}/role`      |
//! | `invite_user`        | `POST /invites`                  |
//! | `delete_invite`      | `DELETE /invites/{email}`        |

use rolekit::{ClientError, InviteStatus, MemberClient, Role, RoleClient, TeamMember};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Body, RequestBuilder};

/// Timeout for a whole request, connect to last byte.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking JSON client for the role service
pub struct HttpClient {
    agent: ureq::Agent,
    base: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            base: base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn role_url(&self, name: &str) -> String {
        self.url(&format!("/roles/{}", encode_segment(name)))
    }

    fn member_role_url(&self, email: &str) -> String {
        self.url(&format!("/members/{}/role", encode_segment(email)))
    }

    fn invite_url(&self, email: &str) -> String {
        self.url(&format!("/invites/{}", encode_segment(email)))
    }

    fn authorize<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        log::trace!("GET {url}");
        let response = self
            .authorize(self.agent.get(url))
            .call()
            .map_err(transport)?;
        let mut response = check(response)?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<Response<Body>, ClientError> {
        log::trace!("POST {url}");
        let response = self
            .authorize(self.agent.post(url))
            .send_json(body)
            .map_err(transport)?;
        check(response)
    }

    fn put_json<B: Serialize>(&self, url: &str, body: &B) -> Result<Response<Body>, ClientError> {
        log::trace!("PUT {url}");
        let response = self
            .authorize(self.agent.put(url))
            .send_json(body)
            .map_err(transport)?;
        check(response)
    }

    fn delete(&self, url: &str) -> Result<(), ClientError> {
        log::trace!("DELETE {url}");
        let response = self
            .authorize(self.agent.delete(url))
            .call()
            .map_err(transport)?;
        check(response).map(|_| ())
    }
}

impl RoleClient for HttpClient {
    fn list_roles(&self) -> Result<Vec<Role>, ClientError> {
        self.get_json(&self.url("/roles"))
    }

    fn get_role(&self, name: &str) -> Result<Role, ClientError> {
        self.get_json(&self.role_url(name))
    }

    fn create_role(&self, role: &Role) -> Result<(), ClientError> {
        self.post_json(&self.url("/roles"), role).map(|_| ())
    }

    fn update_role(&self, role: &Role) -> Result<(), ClientError> {
        self.put_json(&self.role_url(&role.name), role).map(|_| ())
    }

    fn delete_role(&self, name: &str) -> Result<(), ClientError> {
        self.delete(&self.role_url(name))
    }
}

#[derive(Serialize)]
struct AssignRequest<'a> {
    role_id: &'a str,
}

#[derive(Serialize)]
struct InviteRequest<'a> {
    email: &'a str,
    role_id: &'a str,
}

impl MemberClient for HttpClient {
    fn get_team_members(&self) -> Result<Vec<TeamMember>, ClientError> {
        self.get_json(&self.url("/members"))
    }

    fn assign_member_role(&self, email: &str, role_id: &str) -> Result<(), ClientError> {
        self.put_json(&self.member_role_url(email), &AssignRequest { role_id })
            .map(|_| ())
    }

    fn invite_user(&self, email: &str, role_id: &str) -> Result<InviteStatus, ClientError> {
        let mut response = self.post_json(&self.url("/invites"), &InviteRequest { email, role_id })?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn delete_invite(&self, email: &str) -> Result<(), ClientError> {
        self.delete(&self.invite_url(email))
    }
}

fn transport(e: ureq::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// Turn a non-success response into a `ClientError`
fn check(mut response: Response<Body>) -> Result<Response<Body>, ClientError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let message = response
        .body_mut()
        .read_to_string()
        .unwrap_or_default()
        .trim()
        .to_string();
    Err(status_error(status, message))
}

fn status_error(status: u16, message: String) -> ClientError {
    match status {
        404 => ClientError::NotFound(message),
        _ => ClientError::Http { status, message },
    }
}

/// Percent-encode a path segment (RFC 3986 unreserved characters pass through)
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'@' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
