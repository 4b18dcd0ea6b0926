//! Contact form relay: validation, message rendering and SMTP delivery.
use async_trait::async_trait;
use html_escape::encode_safe;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContactError {
    #[error("Missing required fields (name, email, subject, message)")]
    MissingFields,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Mail service is not configured (set SMTP_HOST/SMTP_USER/SMTP_PASS)")]
    NotConfigured,

    #[error("Could not build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

impl From<lettre::transport::smtp::Error> for ContactError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        ContactError::Smtp(err.to_string())
    }
}

impl From<lettre::error::Error> for ContactError {
    fn from(err: lettre::error::Error) -> Self {
        ContactError::Message(err.to_string())
    }
}

/// A submission of the site's contact form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl ContactForm {
    /// Every field but `phone` is required, and the sender address must parse
    pub fn validate(&self) -> Result<Address, ContactError> {
        let required = [&self.name, &self.email, &self.subject, &self.message];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(ContactError::MissingFields);
        }
        self.email
            .trim()
            .parse::<Address>()
            .map_err(|_| ContactError::InvalidEmail(self.email.clone()))
    }
}

/// Where a submission came from, for the footer of the mail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Provenance {
    pub origin: String,
    pub ip: String,
}

/// A rendered notification, ready to hand to a `Mailer`
#[derive(Debug, Clone)]
pub struct ContactMail {
    pub subject: String,
    pub reply_to: Mailbox,
    pub text: String,
    pub html: String,
}

impl ContactMail {
    pub fn render(form: &ContactForm, provenance: &Provenance) -> Result<Self, ContactError> {
        let address = form.validate()?;
        let phone = form
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("-");

        let text = format!(
            "New message from the website contact form\n\n\
             Name: {}\nEmail: {}\nPhone: {}\nSubject: {}\n\n\
             Message:\n{}\n\n\
             Origin: {} | IP: {}",
            form.name, form.email, phone, form.subject, form.message, provenance.origin, provenance.ip
        );

        let html = format!(
            r#"<div style="font-family:system-ui,Segoe UI,Arial,sans-serif;line-height:1.6;">
  <h2 style="margin:0 0 12px;">New message from the website contact form</h2>
  <p><strong>Name:</strong> {}</p>
  <p><strong>Email:</strong> {}</p>
  <p><strong>Phone:</strong> {}</p>
  <p><strong>Subject:</strong> {}</p>
  <p><strong>Message:</strong></p>
  <pre style="white-space:pre-wrap;background:#f7f7f8;padding:12px;border-radius:8px;border:1px solid #eee;">{}</pre>
  <hr />
  <p style="color:#666;font-size:12px;">Origin: {} | IP: {}</p>
</div>"#,
            encode_safe(&form.name),
            encode_safe(&form.email),
            encode_safe(phone),
            encode_safe(&form.subject),
            encode_safe(&form.message),
            encode_safe(&provenance.origin),
            encode_safe(&provenance.ip),
        );

        Ok(Self {
            subject: format!("[Website contact] {} - {}", form.subject, form.name),
            reply_to: Mailbox::new(Some(form.name.trim().to_string()), address),
            text,
            html,
        })
    }
}

/// Delivers contact mail
#[async_trait]
pub trait Mailer: Send + Sync {
    fn recipient(&self) -> &str;

    fn sender(&self) -> &str;

    /// Check that the server accepts our connection and credentials
    async fn verify(&self) -> Result<(), ContactError>;

    async fn send(&self, mail: &ContactMail) -> Result<(), ContactError>;
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    /// Implicit TLS from the first byte; otherwise STARTTLS when offered
    pub secure: bool,
    pub to: String,
    pub from: String,
}

impl SmtpConfig {
    /// `secure` follows the port (465 is implicit TLS) unless set explicitly
    pub fn secure_for(port: u16, explicit: Option<bool>) -> bool {
        explicit.unwrap_or(port == DEFAULT_SMTP_PORT)
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, ContactError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| ContactError::Message(format!("MAIL_FROM: {}", e)))?;
        let to = config
            .to
            .parse::<Mailbox>()
            .map_err(|e| ContactError::Message(format!("MAIL_TO: {}", e)))?;

        let parameters = TlsParameters::new(config.host.clone())?;
        let tls = if config.secure {
            Tls::Wrapper(parameters)
        } else {
            Tls::Opportunistic(parameters)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .tls(tls)
            .build();

        Ok(Self {
            transport,
            config,
            from,
            to,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn recipient(&self) -> &str {
        &self.config.to
    }

    fn sender(&self) -> &str {
        &self.config.from
    }

    async fn verify(&self) -> Result<(), ContactError> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(ContactError::Smtp(format!(
                "could not connect to {}:{}",
                self.config.host, self.config.port
            )))
        }
    }

    async fn send(&self, mail: &ContactMail) -> Result<(), ContactError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .reply_to(mail.reply_to.clone())
            .subject(mail.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                mail.text.clone(),
                mail.html.clone(),
            ))?;

        let response = self.transport.send(message).await?;
        info!(
            code = %response.code(),
            "contact mail sent to {}",
            self.config.to
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ContactForm {
        ContactForm {
            name: "Ada <Lovelace>".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            subject: "Quote".to_string(),
            message: "Need a site & an app".to_string(),
        }
    }

    #[test]
    fn test_validate_requires_fields() {
        assert!(form().validate().is_ok());

        let missing = ContactForm {
            subject: "   ".to_string(),
            ..form()
        };
        assert_eq!(missing.validate().unwrap_err(), ContactError::MissingFields);

        let bad_email = ContactForm {
            email: "not-an-address".to_string(),
            ..form()
        };
        assert!(matches!(
            bad_email.validate(),
            Err(ContactError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_render_escapes_html() {
        let provenance = Provenance {
            origin: "https://example.org".to_string(),
            ip: "203.0.113.9".to_string(),
        };
        let mail = ContactMail::render(&form(), &provenance).unwrap();

        assert_eq!(mail.subject, "[Website contact] Quote - Ada <Lovelace>");
        assert!(mail.text.contains("Phone: -"));
        assert!(mail.text.contains("Origin: https://example.org | IP: 203.0.113.9"));
        assert!(mail.html.contains("Ada &lt;Lovelace&gt;"));
        assert!(mail.html.contains("Need a site &amp; an app"));
        assert_eq!(mail.reply_to.email.to_string(), "ada@example.com");
    }

    #[test]
    fn test_secure_follows_port() {
        assert!(SmtpConfig::secure_for(465, None));
        assert!(!SmtpConfig::secure_for(587, None));
        assert!(SmtpConfig::secure_for(587, Some(true)));
        assert!(!SmtpConfig::secure_for(465, Some(false)));
    }

    #[test]
    fn test_render_escapes_quotes() {
        let form = ContactForm {
            subject: r#"Say "hi" to O'Brien"#.to_string(),
            ..form()
        };
        let provenance = Provenance {
            origin: "unknown".to_string(),
            ip: "unknown".to_string(),
        };
        let mail = ContactMail::render(&form, &provenance).unwrap();

        assert!(mail.html.contains("Say &quot;hi&quot; to O"));
        assert!(!mail.html.contains("O'Brien"));
        assert!(mail.text.contains(r#"Subject: Say "hi" to O'Brien"#));
    }
}
