use crate::config::Config;
use anyhow::Context;
use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::collections::HashMap;
use tracing::{info, warn};

/// SMTP mailer shared through app data. Without a configured host every send
/// is a logged no-op, which is what tests run against.
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let from: Mailbox = config
            .mail_from
            .parse()
            .context("MAIL_FROM is not a valid mailbox")?;

        let transport = match &config.smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .context("Invalid SMTP host")?
                    .port(config.smtp_port);
                if !config.smtp_username.is_empty() {
                    builder = builder.credentials(Credentials::new(
                        config.smtp_username.clone(),
                        config.smtp_password.clone(),
                    ));
                }
                Some(builder.build())
            }
            None => {
                info!("SMTP host not configured, mail sending disabled");
                None
            }
        };

        Ok(Self { transport, from })
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: "hr@example.com".parse().unwrap(),
        }
    }

    /// Sends one message. Transient SMTP failures are retried once before the
    /// error is surfaced to the caller.
    pub async fn send(
        &self,
        to: &str,
        cc: &[String],
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> anyhow::Result<()> {
        let transport = match &self.transport {
            Some(t) => t,
            None => {
                info!(to, subject, "Mail sending disabled, skipping");
                return Ok(());
            }
        };

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("Invalid recipient address")?)
            .subject(subject);

        for addr in cc {
            builder = builder.cc(addr.parse::<Mailbox>().context("Invalid cc address")?);
        }

        let message = match html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.to_string())?,
        };

        match transport.send(message.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_transient() => {
                warn!(error = %e, to, "Transient SMTP failure, retrying once");
                transport.send(message).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Naive `{{placeholder}}` substitution used for both mail bodies and
/// payslips. Unknown placeholders are left in place.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}
