//! Templated mail delivery over pluggable renderer and transport.
//!
//! Subject lookup, rendering and delivery are external collaborators behind
//! [`MessageSource`], [`TemplateRenderer`] and [`MailTransport`].
//! [`MailDispatcher`] resolves the subject, adds the common template
//! variables and maps any failure to the `FailedMailing` domain error.

use crate::error::{CommonExternalCode, DomainError, ResponseCode};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Template variable holding [`MailProperties::image_url`].
pub const IMAGE_URL_VARIABLE: &str = "imageURL";

/// Template variable holding the send time in epoch milliseconds.
pub const TIMESTAMP_VARIABLE: &str = "ts";

/// Resolves localized messages by code.
pub trait MessageSource: Send + Sync {
    /// Message for `code` with `args` substituted, or `None` if unknown.
    fn message(&self, code: &str, args: &[&str]) -> Option<String>;
}

/// Renders a named template with variables into HTML.
pub trait TemplateRenderer: Send + Sync {
    /// Render `template`.
    ///
    /// # Errors
    ///
    /// Returns the engine's failure.
    fn render(&self, template: &str, variables: &Map<String, Value>) -> anyhow::Result<String>;
}

/// Delivers a fully rendered mail.
pub trait MailTransport: Send + Sync {
    /// Send `mail`.
    ///
    /// # Errors
    ///
    /// Returns the transport's failure.
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// Sender identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSender {
    /// Sender address
    pub address: String,
    /// Display name
    pub name: String,
}

/// Mail settings, usually loaded under a `mail` configuration prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailProperties {
    /// Base URL for images referenced by templates
    pub image_url: String,
    /// Sender identity
    pub from: MailSender,
}

/// Known mail kinds with their template and subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailDecoration {
    /// SSH key pair created
    KeyPairCreate,
    /// Platform closed
    PlatformDelete,
    /// Platform created
    PlatformCreate,
    /// IPC platform created
    IpcPlatformCreate,
}

impl MailDecoration {
    /// Template path.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::KeyPairCreate => "mail/keyPairCreate.html",
            Self::PlatformDelete => "mail/platFormClose.html",
            Self::PlatformCreate => "mail/platFormCreate.html",
            Self::IpcPlatformCreate => "mail/ipcPlatFormCreate.html",
        }
    }

    /// Message code of the subject line.
    #[must_use]
    pub const fn title_message_code(self) -> &'static str {
        match self {
            Self::KeyPairCreate => "email.title.sshkey.create",
            Self::PlatformDelete => "email.title.platform.close",
            Self::PlatformCreate => "email.title.platform.create",
            Self::IpcPlatformCreate => "email.title.ipcPlatform.create",
        }
    }
}

/// Template and variables of a mail body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailContent {
    /// Template path
    pub template: String,
    /// Template variables
    pub variables: Map<String, Value>,
}

/// A mail to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailRequest {
    /// Recipient addresses
    pub to: Vec<String>,
    /// Message code of the subject line
    pub title_message_code: String,
    /// Service name substituted into the subject
    pub service: String,
    /// Body template and variables
    pub content: MailContent,
}

impl MailRequest {
    /// Request for a known mail kind.
    #[must_use]
    pub fn decorated(
        decoration: MailDecoration,
        to: Vec<String>,
        service: impl Into<String>,
        variables: Map<String, Value>,
    ) -> Self {
        Self {
            to,
            title_message_code: decoration.title_message_code().to_string(),
            service: service.into(),
            content: MailContent {
                template: decoration.template().to_string(),
                variables,
            },
        }
    }
}

/// A rendered mail handed to the [`MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Sender identity
    pub from: MailSender,
    /// Recipients
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Rendered HTML body
    pub html: String,
}

/// Renders and sends templated mail.
#[derive(Clone)]
pub struct MailDispatcher {
    properties: MailProperties,
    messages: Arc<dyn MessageSource>,
    renderer: Arc<dyn TemplateRenderer>,
    transport: Arc<dyn MailTransport>,
}

impl MailDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        properties: MailProperties,
        messages: Arc<dyn MessageSource>,
        renderer: Arc<dyn TemplateRenderer>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            properties,
            messages,
            renderer,
            transport,
        }
    }

    /// Resolve the subject, render and send `request`.
    ///
    /// An unknown subject code yields an empty subject.
    ///
    /// # Errors
    ///
    /// Any rendering or delivery failure is logged and returned as the
    /// `FailedMailing` error.
    pub fn send(&self, request: &MailRequest) -> Result<(), DomainError> {
        let subject = self.subject(request);
        let result = self.try_send(request, &subject);
        info!(
            success = result.is_ok(),
            subject = %subject,
            to = ?request.to,
            "send mail"
        );

        result.map_err(|e| {
            error!(error = ?e, "send mail failed");
            let code = CommonExternalCode::FailedMailing;
            DomainError::with_cause(code.http_status(), code.code(), code.default_message(), e)
        })
    }

    fn subject(&self, request: &MailRequest) -> String {
        self.messages
            .message(&request.title_message_code, &[request.service.as_str()])
            .unwrap_or_default()
    }

    fn try_send(&self, request: &MailRequest, subject: &str) -> anyhow::Result<()> {
        let variables = self.with_common_variables(&request.content.variables);
        let html = self.renderer.render(&request.content.template, &variables)?;

        let mail = OutgoingMail {
            from: self.properties.from.clone(),
            to: request.to.clone(),
            subject: subject.to_string(),
            html,
        };
        self.transport.send(&mail)
    }

    fn with_common_variables(&self, variables: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = variables.clone();
        merged.insert(
            IMAGE_URL_VARIABLE.to_string(),
            Value::String(self.properties.image_url.clone()),
        );
        merged.insert(
            TIMESTAMP_VARIABLE.to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        merged
    }
}

impl std::fmt::Debug for MailDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailDispatcher")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Titles;

    impl MessageSource for Titles {
        fn message(&self, code: &str, args: &[&str]) -> Option<String> {
            (code == "email.title.platform.create")
                .then(|| format!("[{}] Platform created", args.first().unwrap_or(&"")))
        }
    }

    struct Echo;

    impl TemplateRenderer for Echo {
        fn render(&self, template: &str, variables: &Map<String, Value>) -> anyhow::Result<String> {
            Ok(format!(
                "{template}|{}|{}",
                variables[IMAGE_URL_VARIABLE].as_str().unwrap_or_default(),
                variables.get("name").and_then(Value::as_str).unwrap_or_default()
            ))
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<OutgoingMail>>,
        fail: bool,
    }

    impl MailTransport for Outbox {
        fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp connection refused");
            }
            self.sent.lock().push(mail.clone());
            Ok(())
        }
    }

    fn properties() -> MailProperties {
        MailProperties {
            image_url: "https://cdn.test/img".to_string(),
            from: MailSender {
                address: "noreply@test".to_string(),
                name: "Platform".to_string(),
            },
        }
    }

    fn request(decoration: MailDecoration) -> MailRequest {
        let mut variables = Map::new();
        variables.insert("name".to_string(), Value::from("kim"));
        MailRequest::decorated(decoration, vec!["user@test".to_string()], "orders", variables)
    }

    fn dispatcher(outbox: Arc<Outbox>) -> MailDispatcher {
        MailDispatcher::new(properties(), Arc::new(Titles), Arc::new(Echo), outbox)
    }

    #[test]
    fn test_send_renders_with_common_variables() {
        let outbox = Arc::new(Outbox::default());

        dispatcher(outbox.clone())
            .send(&request(MailDecoration::PlatformCreate))
            .unwrap();

        let sent = outbox.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[orders] Platform created");
        assert_eq!(sent[0].html, "mail/platFormCreate.html|https://cdn.test/img|kim");
        assert_eq!(sent[0].from.address, "noreply@test");
        assert_eq!(sent[0].to, vec!["user@test".to_string()]);
    }

    #[test]
    fn test_delivery_failure_maps_to_failed_mailing() {
        let outbox = Arc::new(Outbox { fail: true, ..Outbox::default() });

        let err = dispatcher(outbox)
            .send(&request(MailDecoration::PlatformCreate))
            .unwrap_err();
        assert_eq!(err.code(), "E-COM-0004");
        assert!(!err.to_string().contains("smtp"));
    }

    #[test]
    fn test_unknown_subject_code_sends_empty_subject() {
        let outbox = Arc::new(Outbox::default());

        dispatcher(outbox.clone())
            .send(&request(MailDecoration::KeyPairCreate))
            .unwrap();

        let sent = outbox.sent.lock();
        assert_eq!(sent[0].subject, "");
        assert_eq!(sent[0].html, "mail/keyPairCreate.html|https://cdn.test/img|kim");
    }

    #[test]
    fn test_decorated_request_carries_subject_code() {
        let request = request(MailDecoration::IpcPlatformCreate);
        assert_eq!(request.title_message_code, "email.title.ipcPlatform.create");
        assert_eq!(request.service, "orders");
        assert_eq!(request.content.template, "mail/ipcPlatFormCreate.html");
    }

    #[test]
    fn test_decoration_table() {
        assert_eq!(MailDecoration::KeyPairCreate.template(), "mail/keyPairCreate.html");
        assert_eq!(
            MailDecoration::IpcPlatformCreate.title_message_code(),
            "email.title.ipcPlatform.create"
        );
    }
}
