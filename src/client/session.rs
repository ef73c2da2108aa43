//! Client-side session: the bearer token, the caller's role, and where the
//! role lands after login.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{ApiClient, ClientError, Credentials};
use crate::db::{Role, UnknownRole};

/// Where a signed-in user is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Bookings,
    Dashboard,
}

impl Landing {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Accountant => Landing::Bookings,
            Role::Admin | Role::Manager => Landing::Dashboard,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Landing::Bookings => "/bookings",
            Landing::Dashboard => "/dashboard",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("signed in, but {0} has no landing view")]
    UnknownRole(#[from] UnknownRole),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("token file {}: {source}", path.display())]
    TokenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub role: Option<Role>,
    /// Role string as reported by the server, kept when it does not parse
    pub role_name: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug)]
pub struct SessionStore {
    state: SessionState,
    token_file: Option<PathBuf>,
}

impl SessionStore {
    /// Session kept in memory only; nothing survives the process
    pub fn in_memory() -> Self {
        Self {
            state: SessionState::default(),
            token_file: None,
        }
    }

    /// Session whose token is persisted to `path` across runs
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            state: SessionState::default(),
            token_file: Some(path.into()),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn token_file(&self) -> Option<&Path> {
        self.token_file.as_deref()
    }

    /// Credentials for the current session, if signed in
    pub fn credentials(&self) -> Option<Credentials> {
        self.state.token.as_deref().map(Credentials::bearer)
    }

    /// `client` configured with this session's credentials
    pub fn authorize(&self, client: &ApiClient) -> Result<ApiClient, SessionError> {
        let credentials = self.credentials().ok_or(SessionError::NotAuthenticated)?;
        Ok(client.with_credentials(credentials))
    }

    /// Log in, remember the token and resolve the landing view.
    ///
    /// An unrecognised role still leaves the session signed in; the caller
    /// gets [`SessionError::UnknownRole`] to report instead of a landing view.
    pub async fn login(
        &mut self,
        client: &ApiClient,
        email: &str,
        password: &str,
    ) -> Result<Landing, SessionError> {
        let token = client.login(email, password).await?;
        if let Err(e) = self.adopt(client, token.clone()).await {
            // The token was issued but is unusable here; revoke it server-side.
            if let Err(revoke) = client
                .with_credentials(Credentials::bearer(token))
                .logout()
                .await
            {
                tracing::debug!(error = %revoke, "Failed to revoke token after login error");
            }
            return Err(e);
        }
        self.persist()?;
        tracing::debug!("Session established");
        self.landing()
    }

    /// Adopt a token obtained elsewhere (flag or environment) without persisting it.
    pub async fn adopt(&mut self, client: &ApiClient, token: String) -> Result<(), SessionError> {
        let user = client
            .with_credentials(Credentials::bearer(token.clone()))
            .current_user()
            .await?;

        self.state = SessionState {
            is_authenticated: true,
            role: user.role.parse().ok(),
            role_name: Some(user.role),
            token: Some(token),
        };
        Ok(())
    }

    /// Reload a persisted token. A token the server no longer accepts is discarded.
    pub async fn restore(&mut self, client: &ApiClient) -> Result<bool, SessionError> {
        let Some(token) = self.read_token()? else {
            return Ok(false);
        };

        match self.adopt(client, token).await {
            Ok(()) => Ok(true),
            Err(SessionError::Client(ClientError::Unauthorized(_))) => {
                tracing::debug!("Stored token rejected, clearing session");
                self.clear()?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke the token server-side and forget it locally
    pub async fn logout(&mut self, client: &ApiClient) -> Result<(), SessionError> {
        let authed = self.authorize(client)?;
        match authed.logout().await {
            // Already revoked or expired: nothing left to do server-side
            Ok(()) | Err(ClientError::Unauthorized(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.clear()
    }

    pub fn landing(&self) -> Result<Landing, SessionError> {
        if !self.state.is_authenticated {
            return Err(SessionError::NotAuthenticated);
        }
        match (self.state.role, &self.state.role_name) {
            (Some(role), _) => Ok(Landing::for_role(role)),
            (None, name) => Err(UnknownRole(name.clone().unwrap_or_default()).into()),
        }
    }

    /// Forget the session and remove any persisted token
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::default();
        if let Some(path) = &self.token_file {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(SessionError::TokenFile {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }

    fn read_token(&self) -> Result<Option<String>, SessionError> {
        let Some(path) = &self.token_file else {
            return Ok(None);
        };
        match fs::read_to_string(path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::TokenFile {
                path: path.clone(),
                source,
            }),
        }
    }

    fn persist(&self) -> Result<(), SessionError> {
        let (Some(path), Some(token)) = (&self.token_file, &self.state.token) else {
            return Ok(());
        };
        write_private(path, token).map_err(|source| SessionError::TokenFile {
            path: path.clone(),
            source,
        })
    }
}

/// Write `contents` readable by the owner only
fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents.as_bytes())
}
