//! Repository access credentials.

use std::fmt;
use std::path::PathBuf;

use git2::{Cred, CredentialType, RemoteCallbacks};

/// Default user for SSH remotes.
pub const DEFAULT_GIT_USER: &str = "gitevents";

/// SSH key material handed to git when talking to the remote.
///
/// Keys are loaded by path and passed straight to libgit2.
#[derive(Clone)]
pub struct Credentials {
    /// User for SSH authentication when the URL does not name one.
    pub user: String,
    /// Private key file; the SSH agent is used when absent.
    pub private_key: Option<PathBuf>,
    /// Public key file matching `private_key`.
    pub public_key: Option<PathBuf>,
    /// Passphrase unlocking `private_key`.
    pub passphrase: Option<String>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: DEFAULT_GIT_USER.to_string(),
            private_key: None,
            public_key: None,
            passphrase: None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("private_key", &self.private_key)
            .field("public_key", &self.public_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Build libgit2 callbacks that answer credential requests.
    ///
    /// libgit2 asks again after every rejected credential, so each
    /// credential type is offered at most once per operation.
    #[must_use]
    pub fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut attempts = Attempts::new(self);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts.next(url, username_from_url, allowed)
        });
        callbacks
    }
}

/// Credential types already offered during one remote operation.
struct Attempts<'a> {
    credentials: &'a Credentials,
    ssh_key: bool,
    username: bool,
    default: bool,
}

impl<'a> Attempts<'a> {
    const fn new(credentials: &'a Credentials) -> Self {
        Self {
            credentials,
            ssh_key: false,
            username: false,
            default: false,
        }
    }

    fn next(
        &mut self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, git2::Error> {
        let creds = self.credentials;
        let user = username_from_url.unwrap_or(&creds.user);
        tracing::debug!(%url, %user, ?allowed, "Remote requested credentials");

        if allowed.contains(CredentialType::SSH_KEY) && !self.ssh_key {
            self.ssh_key = true;
            return match &creds.private_key {
                Some(private_key) => Cred::ssh_key(
                    user,
                    creds.public_key.as_deref(),
                    private_key,
                    creds.passphrase.as_deref(),
                ),
                None => Cred::ssh_key_from_agent(user),
            };
        }
        if allowed.contains(CredentialType::USERNAME) && !self.username {
            self.username = true;
            return Cred::username(user);
        }
        if allowed.contains(CredentialType::DEFAULT) && !self.default {
            self.default = true;
            return Cred::default();
        }

        tracing::warn!(%url, %user, "Authentication failed, no credentials left to try");
        Err(git2::Error::from_str("authentication failed: no usable credentials"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user() {
        let creds = Credentials::default();
        assert_eq!(creds.user, "gitevents");
        assert!(creds.private_key.is_none());
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let creds = Credentials {
            passphrase: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug_str = format!("{creds:?}");
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn test_rejected_ssh_key_is_not_offered_again() {
        let creds = Credentials::default();
        let mut attempts = Attempts::new(&creds);

        let first = attempts.next("ssh://host/repo.git", Some("git"), CredentialType::SSH_KEY);
        assert!(first.is_ok());

        let second = attempts.next("ssh://host/repo.git", Some("git"), CredentialType::SSH_KEY);
        let err = second.err().unwrap();
        assert!(err.message().contains("authentication failed"));
    }

    #[test]
    fn test_each_credential_type_offered_once() {
        let creds = Credentials::default();
        let mut attempts = Attempts::new(&creds);
        let url = "ssh://host/repo.git";

        assert!(attempts.next(url, None, CredentialType::USERNAME).is_ok());
        assert!(attempts.next(url, None, CredentialType::USERNAME).is_err());

        // A different type is still available after the username was used.
        assert!(attempts.next(url, None, CredentialType::SSH_KEY).is_ok());
        assert!(attempts
            .next(url, None, CredentialType::SSH_KEY | CredentialType::USERNAME)
            .is_err());
    }
}
