use crate::external::LoginEmail;
use serde::{Deserialize, Serialize};

pub const SEND_LOGIN_EMAIL: &str = "send_login_email";

/// Payload of a `send_login_email` job as stored in the broker.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SendLoginEmail {
    pub to_email: String,
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_link: Option<String>,
}

impl std::fmt::Debug for SendLoginEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendLoginEmail")
            .field("to_email", &self.to_email)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_link", &self.login_link)
            .finish()
    }
}

impl SendLoginEmail {
    pub fn into_login_email(self, default_login_url: &str) -> LoginEmail {
        let login_link = self
            .login_link
            .filter(|link| !link.trim().is_empty())
            .unwrap_or_else(|| default_login_url.to_string());
        LoginEmail {
            to_email: self.to_email,
            name: self.name,
            username: self.username,
            password: self.password,
            login_link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_login_link_uses_default() {
        let payload: SendLoginEmail = serde_json::from_value(serde_json::json!({
            "to_email": "siswa@sekolah.sch.id",
            "name": "Siti",
            "username": "siti42",
            "password": "Abcdef1234"
        }))
        .unwrap();
        assert_eq!(payload.login_link, None);

        let email = payload.into_login_email("https://absen.test/api/v1/auth/login");
        assert_eq!(email.login_link, "https://absen.test/api/v1/auth/login");
    }

    #[test]
    fn test_explicit_login_link_wins() {
        let payload = SendLoginEmail {
            to_email: "a@b.id".into(),
            name: "A".into(),
            username: "a1".into(),
            password: "Abcdef1234".into(),
            login_link: Some("https://school.test/login".into()),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["login_link"], "https://school.test/login");

        let email = payload.into_login_email("https://fallback.test");
        assert_eq!(email.login_link, "https://school.test/login");
    }
}
