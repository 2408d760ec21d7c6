//! Outbound delivery through an ordered list of SMTP relays

use crate::config::RelayCredential;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("{0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailRelay: Send + Sync {
    fn label(&self) -> &str;
    async fn send(&self, mail: &OutgoingMail) -> Result<(), RelayError>;
}

/// One relay credential set, SMTP over lettre's tokio transport.
pub struct SmtpRelay {
    label: String,
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelay {
    pub fn new(cred: &RelayCredential, from_name: &str) -> Result<Self, RelayError> {
        // app passwords are often pasted with spaces
        let clean_password: String = cred.password.chars().filter(|c| !c.is_whitespace()).collect();
        let creds = Credentials::new(cred.username.clone(), clean_password);

        let tls_params = TlsParameters::builder(cred.host.clone())
            .dangerous_accept_invalid_certs(cred.accept_invalid_certs)
            .build()
            .map_err(|e| RelayError::Tls(e.to_string()))?;
        let tls = if cred.secure {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Required(tls_params)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(cred.host.as_str())
            .port(cred.port)
            .tls(tls)
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .credentials(creds)
            .build();

        let from = Mailbox::new(Some(from_name.to_string()), cred.username.parse()?);
        Ok(Self {
            label: cred.label.clone(),
            from,
            transport,
        })
    }
}

#[async_trait]
impl MailRelay for SmtpRelay {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), RelayError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse()?)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())?;
        self.transport.send(email).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { relay: String },
    /// `error` comes from the last attempt only.
    Failed { relay: String, error: String },
}

impl DispatchOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn relay(&self) -> &str {
        match self {
            Self::Delivered { relay } | Self::Failed { relay, .. } => relay,
        }
    }

    pub fn error_detail(&self) -> &str {
        match self {
            Self::Delivered { .. } => "",
            Self::Failed { error, .. } => error,
        }
    }
}

pub const NO_RELAY_LABEL: &str = "none";

/// Tries relays in order, no delay between attempts, until one accepts the
/// message or `max_attempts` is spent.
pub struct Dispatcher {
    relays: Vec<Arc<dyn MailRelay>>,
    max_attempts: usize,
}

impl Dispatcher {
    /// A cap of `None` or `Some(0)` tries every relay.
    pub fn new(relays: Vec<Arc<dyn MailRelay>>, max_attempts: Option<usize>) -> Self {
        let max_attempts = max_attempts
            .filter(|&n| n > 0)
            .unwrap_or(relays.len())
            .min(relays.len());
        Self {
            relays,
            max_attempts,
        }
    }

    pub fn from_credentials(
        creds: &[RelayCredential],
        from_name: &str,
        max_attempts: Option<usize>,
    ) -> Result<Self, RelayError> {
        let relays = creds
            .iter()
            .map(|c| SmtpRelay::new(c, from_name).map(|r| Arc::new(r) as Arc<dyn MailRelay>))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(relays, max_attempts))
    }

    pub fn relay_count(&self) -> usize {
        self.relays.len()
    }

    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> DispatchOutcome {
        let mail = OutgoingMail {
            to: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        let mut last = DispatchOutcome::Failed {
            relay: NO_RELAY_LABEL.to_string(),
            error: "no relay configured".to_string(),
        };
        for (i, relay) in self.relays.iter().take(self.max_attempts).enumerate() {
            tracing::debug!(relay = relay.label(), to = %recipient, attempt = i + 1, "trying relay");
            match relay.send(&mail).await {
                Ok(()) => {
                    tracing::info!(relay = relay.label(), to = %recipient, "email sent");
                    return DispatchOutcome::Delivered {
                        relay: relay.label().to_string(),
                    };
                }
                Err(e) => {
                    tracing::warn!(relay = relay.label(), to = %recipient, error = %e, "relay failed");
                    last = DispatchOutcome::Failed {
                        relay: relay.label().to_string(),
                        error: e.to_string(),
                    };
                }
            }
        }
        last
    }
}
