//! CLI commands.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use gatekeep_core::{AuthGateway, Config, CredentialStore, Session, SessionManager, SessionStatus};

/// Env var consulted before prompting for a password
const PASSWORD_ENV: &str = "GATEKEEP_PASSWORD";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Status,
    SignIn { email: Option<String> },
    SignUp { username: String, email: String },
    SignOut,
    WhoAmI,
    VerifyEmail { token: String },
    ForgotPassword { email: String },
    ResetPassword { token: String },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let arg = |i: usize, name: &str| -> Result<String> {
            args.get(i)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Missing <{}>", name))
        };

        let Some(name) = args.first() else {
            return Ok(Command::Status);
        };

        match name.as_str() {
            "status" => Ok(Command::Status),
            "sign-in" => Ok(Command::SignIn {
                email: args.get(1).cloned(),
            }),
            "sign-up" => Ok(Command::SignUp {
                username: arg(1, "username")?,
                email: arg(2, "email")?,
            }),
            "sign-out" => Ok(Command::SignOut),
            "whoami" => Ok(Command::WhoAmI),
            "verify-email" => Ok(Command::VerifyEmail {
                token: arg(1, "token")?,
            }),
            "forgot-password" => Ok(Command::ForgotPassword {
                email: arg(1, "email")?,
            }),
            "reset-password" => Ok(Command::ResetPassword {
                token: arg(1, "token")?,
            }),
            other => Err(anyhow::anyhow!("Unknown command: {}", other)),
        }
    }
}

pub async fn run<G, S>(command: Command, manager: &SessionManager<G, S>, config: &Config) -> Result<()>
where
    G: AuthGateway,
    S: CredentialStore,
{
    match command {
        Command::Status => {}
        Command::SignIn { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = read_password("Password: ")?;

            with_transitions(manager, manager.sign_in(&email, &password)).await;

            if manager.snapshot().is_authenticated() {
                if let Err(e) = Config::remember_email(&email) {
                    warn!(error = %e, "Failed to save config");
                }
            }
        }
        Command::SignUp { username, email } => {
            let password = read_password("Choose a password: ")?;
            with_transitions(manager, manager.sign_up(&username, &email, &password)).await;
            if manager.snapshot().error().is_none() {
                println!("Account created. Check your email to verify it, then sign in.");
            }
        }
        Command::SignOut => manager.sign_out(),
        Command::WhoAmI => {
            if !manager.snapshot().is_authenticated() {
                println!("Not signed in.");
            }
            with_transitions(manager, manager.fetch_user()).await;
        }
        Command::VerifyEmail { token } => {
            manager.verify_email(&token).await?;
            println!("Email verified. You can now sign in.");
            return Ok(());
        }
        Command::ForgotPassword { email } => {
            manager.request_password_reset(&email).await?;
            println!("Reset link sent. Check your email.");
            return Ok(());
        }
        Command::ResetPassword { token } => {
            let password = read_password("New password: ")?;
            manager.reset_password(&token, &password).await?;
            println!("Password reset successful.");
            return Ok(());
        }
    }

    report(&manager.snapshot())
}

/// Drive `operation` while logging each committed transition
async fn with_transitions<G, S, F>(manager: &SessionManager<G, S>, operation: F)
where
    G: AuthGateway,
    S: CredentialStore,
    F: std::future::Future<Output = ()>,
{
    let mut rx = manager.subscribe();
    let watcher = async {
        while rx.changed().await.is_ok() {
            let session = rx.borrow_and_update();
            debug!(status = %session.status(), generation = session.generation(), "Session transition");
        }
    };

    tokio::select! {
        () = operation => {}
        () = watcher => {}
    }
}

/// Print the session; a failed session becomes the process error
fn report(session: &Session) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(session)?);
    match (session.status(), session.error()) {
        (SessionStatus::Failed, Some(message)) => Err(anyhow::anyhow!("{}", message)),
        _ => Ok(()),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn read_password(label: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(label).context("Failed to read password")
}
