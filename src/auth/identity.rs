//! The ways a caller can prove who they are. Each route picks one.

/// Google credential presented by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleGrant {
    /// OAuth access token obtained by the client itself
    AccessToken(String),
    /// Authorization code returned to our callback by the redirect flow
    AuthorizationCode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Credentials { email: String, password: String },
    Bearer(String),
    Google(GoogleGrant),
}

impl Identity {
    /// Short label for logs; never includes secrets
    pub fn strategy(&self) -> &'static str {
        match self {
            Identity::Credentials { .. } => "credentials",
            Identity::Bearer(_) => "bearer",
            Identity::Google(GoogleGrant::AccessToken(_)) => "google_token",
            Identity::Google(GoogleGrant::AuthorizationCode(_)) => "google_code",
        }
    }
}
