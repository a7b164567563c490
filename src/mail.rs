//! Invitation delivery.
//!
//! The core only needs "send this invitation, tell me whether it worked".
//! [`SmtpMailer`] relays through the configured SMTP server with STARTTLS.
//! [`PickupDirMailer`] drops each message as an `.eml` file into a directory
//! watched by the local MTA. Without either, delivery fails.

use std::future::Future;
use std::path::PathBuf;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{info, warn};
use tokio::fs;

use crate::error::DeliveryError;

pub(crate) const INVITATION_SUBJECT: &str = "Signup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Invitation {
    /// Invitation into an existing group.
    pub fn to_group(from: &str, to: &str, group_name: &str, link: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: INVITATION_SUBJECT.to_string(),
            body: format!(
                "Du wurdest eingeladen, einen Namen zu suchen in der Gruppe {group_name}. \
                 Um teilzunehmen, folge dem Link: {link}"
            ),
        }
    }

    pub fn signup(from: &str, to: &str, link: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: INVITATION_SUBJECT.to_string(),
            body: format!("no text {link}"),
        }
    }

    /// Build the mail message. Fails on addresses that don't parse, which
    /// also rules out header injection through the recipient.
    pub fn to_email(&self) -> Result<Message, DeliveryError> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| DeliveryError(format!("invalid sender address {:?}: {e}", self.from)))?;
        let to: Mailbox = self
            .to
            .parse()
            .map_err(|e| DeliveryError(format!("invalid recipient address {:?}: {e}", self.to)))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| DeliveryError(e.to_string()))
    }
}

pub trait Mailer: Send + Sync + 'static {
    fn send_invitation(
        &self,
        invitation: &Invitation,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// SMTP relay with mandatory STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// No connection is made until the first invitation goes out.
    pub fn starttls(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
    ) -> Result<Self, DeliveryError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| DeliveryError(e.to_string()))?
            .port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }
        info!("Sending invitations through {host}:{port}");
        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl Mailer for SmtpMailer {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), DeliveryError> {
        let email = invitation.to_email()?;
        self.transport
            .send(email)
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;
        info!("Sent invitation to {}", invitation.to);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PickupDirMailer {
    dir: PathBuf,
}

impl PickupDirMailer {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }
}

impl Mailer for PickupDirMailer {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), DeliveryError> {
        let email = invitation.to_email()?;
        let path = self.dir.join(format!("{}.eml", uuid::Uuid::new_v4()));
        fs::write(&path, email.formatted())
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;
        info!("Queued invitation for {} at {}", invitation.to, path.display());
        Ok(())
    }
}

/// Mailer chosen from configuration.
#[derive(Clone)]
pub enum MailTransport {
    Smtp(SmtpMailer),
    PickupDir(PickupDirMailer),
    /// No transport configured: every delivery fails, so nobody is added to
    /// a group without having been sent an invitation.
    Unconfigured,
}

impl Mailer for MailTransport {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), DeliveryError> {
        match self {
            MailTransport::Smtp(m) => m.send_invitation(invitation).await,
            MailTransport::PickupDir(m) => m.send_invitation(invitation).await,
            MailTransport::Unconfigured => {
                warn!("Dropping invitation for {}: no mail transport", invitation.to);
                Err(DeliveryError("no mail transport configured".to_string()))
            }
        }
    }
}
