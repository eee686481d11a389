//! Auth-path selection.

use std::time::Duration;

/// Default service-path timeout for reads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Per-call forwarding options.
///
/// `require_auth` and `prefer_user_auth` together with the presence of a
/// user token fully determine the auth path; `timeout` only bounds the
/// service-identity path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardOptions {
    pub timeout: Duration,
    pub require_auth: bool,
    pub prefer_user_auth: bool,
}

impl ForwardOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_require_auth(mut self, require_auth: bool) -> Self {
        self.require_auth = require_auth;
        self
    }

    pub fn with_prefer_user_auth(mut self, prefer_user_auth: bool) -> Self {
        self.prefer_user_auth = prefer_user_auth;
        self
    }
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            require_auth: false,
            prefer_user_auth: true,
        }
    }
}

/// How one request reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPath {
    /// Forward with the end user's bearer token.
    User,
    /// Forward with a freshly minted service identity token.
    Service,
    /// Reject with 401 before any outbound call.
    Rejected,
}

impl AuthPath {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthPath::User => "user",
            AuthPath::Service => "service",
            AuthPath::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AuthPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the auth path for one request.
///
/// ```text
/// token  prefer  require   path
///   yes    any     yes     User
///   yes    yes     no      User
///   yes    no      no      Service
///   no     any     yes     Rejected
///   no     any     no      Service
/// ```
pub fn select_auth_path(token_present: bool, opts: &ForwardOptions) -> AuthPath {
    if token_present && (opts.prefer_user_auth || opts.require_auth) {
        AuthPath::User
    } else if opts.require_auth && !token_present {
        AuthPath::Rejected
    } else {
        AuthPath::Service
    }
}
