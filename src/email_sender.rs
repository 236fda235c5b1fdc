use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use crate::models::CustomerDetails;
use crate::templates::{get_template_content, render, TemplateCache, CUSTOMER_LEAD_TEMPLATE};

/// Delivers customer registrations to the business owner.
#[async_trait]
pub trait LeadNotifier: Send + Sync {
    async fn send_customer_details(&self, details: &CustomerDetails) -> Result<()>;
}

pub fn lead_subject(details: &CustomerDetails) -> String {
    format!("New Customer Registration: {}", details.full_name.trim())
}

pub fn render_lead(template: &str, details: &CustomerDetails) -> String {
    render(
        template,
        &[
            ("full_name", details.full_name.as_str()),
            ("email", details.email.as_str()),
            ("phone_number", details.phone_number.as_str()),
            ("nationality", details.nationality.as_str()),
            ("program", details.program.as_str()),
            ("package", details.package.as_str()),
        ],
    )
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
    templates: TemplateCache,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, templates: TemplateCache) -> Result<Self> {
        let sender: Mailbox = config
            .username
            .parse()
            .map_err(|e| AppError::Email(format!("invalid sender address: {}", e)))?;
        let recipient: Mailbox = config
            .ceo_email
            .parse()
            .map_err(|e| AppError::Email(format!("invalid recipient address: {}", e)))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        // 465 is implicit TLS, anything else negotiates STARTTLS
        let relay = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        };
        let builder = relay.map_err(|e| AppError::Email(format!("SMTP setup failed: {}", e)))?;

        let mailer = builder.credentials(creds).port(config.port).build();
        info!("SMTP relay {}:{} configured", config.host, config.port);

        Ok(Self {
            mailer,
            sender,
            recipient,
            templates,
        })
    }
}

#[async_trait]
impl LeadNotifier for SmtpNotifier {
    async fn send_customer_details(&self, details: &CustomerDetails) -> Result<()> {
        let template = get_template_content(&self.templates, CUSTOMER_LEAD_TEMPLATE)?;
        let email = Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(lead_subject(details))
            .header(ContentType::TEXT_HTML)
            .body(render_lead(&template, details))
            .map_err(|e| AppError::Email(e.to_string()))?;

        match self.mailer.send(email).await {
            Ok(_) => {
                info!("Customer details for {} sent", details.email);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send customer details: {}", e);
                Err(AppError::Email(e.to_string()))
            }
        }
    }
}
