//! Credentials shared by the change source and the download transport.

use std::fmt;

/// Account used to authenticate against the change log site and file URLs.
///
/// The password is never printed by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name, without domain.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Account domain.
    pub domain: String,
}

impl Credentials {
    /// Builds credentials only when all three parts are non-blank.
    ///
    /// Returns `None` otherwise, meaning requests go out without an
    /// `Authorization` header and rely on ambient access.
    #[must_use]
    pub fn from_parts(username: &str, password: &str, domain: &str) -> Option<Self> {
        if [username, password, domain]
            .iter()
            .any(|part| part.trim().is_empty())
        {
            return None;
        }
        Some(Self {
            username: username.to_owned(),
            password: password.to_owned(),
            domain: domain.to_owned(),
        })
    }

    /// Returns the `DOMAIN\user` login name.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}\\{}", self.domain, self.username)
    }

    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(self.login(), Some(&self.password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}
