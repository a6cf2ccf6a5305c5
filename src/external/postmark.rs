use crate::config::PostmarkConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct LoginTemplateModel {
    pub name: String,
    pub username: String,
    pub password: String,
    pub login_link: String,
    pub logo_url: String,
}

/// Body of `POST /email/withTemplate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateEmailRequest {
    pub from: String,
    pub to: String,
    pub template_id: i64,
    pub template_model: LoginTemplateModel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostmarkResponse {
    #[serde(rename = "ErrorCode", default)]
    pub error_code: i64,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "MessageID", default)]
    pub message_id: Option<String>,
    #[serde(rename = "To", default)]
    pub to: Option<String>,
    #[serde(rename = "SubmittedAt", default)]
    pub submitted_at: Option<String>,
}

/// One provider round trip. No interpretation of `ErrorCode` happens here.
#[async_trait]
pub trait PostmarkTransport: Send + Sync {
    async fn send_with_template(
        &self,
        request: &TemplateEmailRequest,
    ) -> AppResult<PostmarkResponse>;
}

pub struct HttpPostmarkTransport {
    client: Client,
    base_url: String,
    server_token: String,
}

impl HttpPostmarkTransport {
    pub fn new(base_url: &str, server_token: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent("hubsensi-backend/postmark")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_token: server_token.to_string(),
        })
    }
}

#[async_trait]
impl PostmarkTransport for HttpPostmarkTransport {
    async fn send_with_template(
        &self,
        request: &TemplateEmailRequest,
    ) -> AppResult<PostmarkResponse> {
        let url = format!("{}/email/withTemplate", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.server_token)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::EmailDelivery {
                code: None,
                message: e.to_string(),
            })?;

        // Postmark reports failures (422, 401) with the same JSON shape
        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::EmailDelivery {
            code: None,
            message: e.to_string(),
        })?;

        serde_json::from_str::<PostmarkResponse>(&body).map_err(|_| AppError::EmailDelivery {
            code: None,
            message: format!("HTTP {}: {}", status.as_u16(), body),
        })
    }
}

/// Validated adapter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PostmarkSettings {
    pub api_key: String,
    pub from_email: String,
    pub template_id: i64,
    pub logo_url: String,
}

impl PostmarkSettings {
    pub fn from_config(config: &PostmarkConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::ConfigError("POSTMARK_API_KEY is missing".into()));
        }
        if config.from_email.trim().is_empty() {
            return Err(AppError::ConfigError(
                "POSTMARK_FROM_EMAIL is missing".into(),
            ));
        }
        let template_id: i64 = config.template_id.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "POSTMARK_TEMPLATE_ID is not a number: {:?}",
                config.template_id
            ))
        })?;
        if template_id <= 0 {
            return Err(AppError::ConfigError(
                "POSTMARK_TEMPLATE_ID must be a positive number".into(),
            ));
        }
        if config.logo_url.trim().is_empty() {
            return Err(AppError::ConfigError("LOGO_URL is missing".into()));
        }

        Ok(Self {
            api_key: config.api_key.trim().to_string(),
            from_email: config.from_email.trim().to_string(),
            template_id,
            logo_url: config.logo_url.trim().to_string(),
        })
    }
}

/// Credentials of a freshly created account.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginEmail {
    pub to_email: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub login_link: String,
}

impl std::fmt::Debug for LoginEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginEmail")
            .field("to_email", &self.to_email)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_link", &self.login_link)
            .finish()
    }
}

impl LoginEmail {
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("to_email", &self.to_email),
            ("name", &self.name),
            ("username", &self.username),
            ("password", &self.password),
            ("login_link", &self.login_link),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if !missing.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Login email fields must not be empty: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub to: String,
    pub submitted_at: Option<String>,
}

/// Delivers credential emails. The task worker only sees this seam.
#[async_trait]
pub trait LoginMailer: Send + Sync {
    async fn send_login_email(&self, email: &LoginEmail) -> AppResult<DeliveryReceipt>;
}

struct ReadyClient {
    transport: Arc<dyn PostmarkTransport>,
    settings: PostmarkSettings,
}

/// Postmark template sender. Built once at start-up; when the settings are
/// invalid it stays constructed but refuses every send.
#[derive(Clone)]
pub struct PostmarkService {
    state: Arc<Result<ReadyClient, String>>,
}

impl PostmarkService {
    pub fn new(config: &PostmarkConfig) -> Self {
        let ready = PostmarkSettings::from_config(config).and_then(|settings| {
            let transport = HttpPostmarkTransport::new(
                &config.base_url,
                &settings.api_key,
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(ReadyClient {
                transport: Arc::new(transport),
                settings,
            })
        });
        Self::from_state(ready)
    }

    pub fn with_transport(config: &PostmarkConfig, transport: Arc<dyn PostmarkTransport>) -> Self {
        let ready = PostmarkSettings::from_config(config)
            .map(|settings| ReadyClient { transport, settings });
        Self::from_state(ready)
    }

    fn from_state(ready: AppResult<ReadyClient>) -> Self {
        let state = match ready {
            Ok(client) => {
                log::info!(
                    "Postmark client initialized with template {}",
                    client.settings.template_id
                );
                Ok(client)
            }
            Err(e) => {
                log::error!("Postmark client initialization failed: {e}");
                Err(e.to_string())
            }
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ok()
    }
}

#[async_trait]
impl LoginMailer for PostmarkService {
    async fn send_login_email(&self, email: &LoginEmail) -> AppResult<DeliveryReceipt> {
        let client = match self.state.as_ref() {
            Ok(client) => client,
            Err(reason) => {
                return Err(AppError::ConfigError(format!(
                    "Postmark client unavailable: {reason}"
                )));
            }
        };

        email.validate()?;

        let request = TemplateEmailRequest {
            from: client.settings.from_email.clone(),
            to: email.to_email.clone(),
            template_id: client.settings.template_id,
            template_model: LoginTemplateModel {
                name: email.name.clone(),
                username: email.username.clone(),
                password: email.password.clone(),
                login_link: email.login_link.clone(),
                logo_url: client.settings.logo_url.clone(),
            },
        };

        log::info!(
            "Sending login email to {} with template {}",
            email.to_email,
            client.settings.template_id
        );

        let response = client
            .transport
            .send_with_template(&request)
            .await
            .map_err(|e| match e {
                AppError::EmailDelivery { .. } => e,
                other => AppError::EmailDelivery {
                    code: None,
                    message: other.to_string(),
                },
            })?;

        if response.error_code != 0 {
            let message = response
                .message
                .unwrap_or_else(|| "Unknown error".to_string());
            log::error!(
                "Postmark error {} for {}: {}",
                response.error_code,
                email.to_email,
                message
            );
            return Err(AppError::EmailDelivery {
                code: Some(response.error_code),
                message,
            });
        }

        let message_id = response.message_id.unwrap_or_default();
        log::info!(
            "Login email sent to {}. MessageID: {}",
            email.to_email,
            message_id
        );

        Ok(DeliveryReceipt {
            message_id,
            to: response.to.unwrap_or_else(|| email.to_email.clone()),
            submitted_at: response.submitted_at,
        })
    }
}
