use clap::Subcommand;
use momentum_core::notify::RelayClient;
use momentum_core::storage::{Database, EmailConfig, Settings};
use momentum_core::Config;

use super::open_settings;

#[derive(Subcommand)]
pub enum EmailAction {
    /// Print the failure email settings as JSON
    Show,
    /// Update the failure email settings
    Set {
        /// Recipient address
        #[arg(long)]
        address: Option<String>,
        /// Subject line
        #[arg(long)]
        subject: Option<String>,
        /// Message body
        #[arg(long)]
        message: Option<String>,
    },
    /// Send the email when a challenge fails
    Enable,
    /// Never send the email
    Disable,
    /// Send the configured email now through the relay
    Test,
    /// Check that the relay is reachable
    Health,
}

fn require_email(settings: &Settings<Database>) -> Result<EmailConfig, String> {
    settings
        .email()
        .ok_or_else(|| "no email configured; run `momentum email set --address ...` first".into())
}

fn set_enabled(settings: &Settings<Database>, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut email = require_email(settings)?;
    email.enabled = enabled;
    settings.set_email(&email)?;
    println!("email {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub fn run(action: EmailAction) -> Result<(), Box<dyn std::error::Error>> {
    let settings = open_settings()?;

    match action {
        EmailAction::Show => match settings.email() {
            Some(email) => println!("{}", serde_json::to_string_pretty(&email)?),
            None => println!("null"),
        },
        EmailAction::Set {
            address,
            subject,
            message,
        } => {
            let mut email = match (settings.email(), address.as_deref()) {
                (Some(email), _) => email,
                (None, Some(address)) => EmailConfig::new(true, address),
                (None, None) => return Err("--address is required the first time".into()),
            };
            if let Some(address) = address {
                email.recipient = address.trim().to_string();
            }
            if let Some(subject) = subject {
                email.custom_subject = subject;
            }
            if let Some(message) = message {
                email.custom_message = message;
            }
            if email.recipient.is_empty() {
                return Err("recipient address must not be empty".into());
            }
            settings.set_email(&email)?;
            println!("{}", serde_json::to_string_pretty(&email)?);
        }
        EmailAction::Enable => set_enabled(&settings, true)?,
        EmailAction::Disable => set_enabled(&settings, false)?,
        EmailAction::Test => {
            let email = require_email(&settings)?;
            let client = RelayClient::from_config(&Config::load()?.relay)?;
            let rt = tokio::runtime::Runtime::new()?;
            let id = rt.block_on(client.send_failure_email(
                &email.recipient,
                &email.custom_subject,
                &email.custom_message,
            ))?;
            println!("sent (message id: {})", id.as_deref().unwrap_or("-"));
        }
        EmailAction::Health => {
            let client = RelayClient::from_config(&Config::load()?.relay)?;
            let rt = tokio::runtime::Runtime::new()?;
            let health = rt.block_on(client.health_check())?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }
    Ok(())
}
