//! Auth command - session management.

use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;

use super::{Context, describe};

/// Environment variable read instead of prompting for the password.
const PASSWORD_ENV: &str = "STOREFRONT_PASSWORD";

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in and store the session
    Login {
        /// Account name (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show the stored session
    Status {
        /// Also fetch the profile from the API
        #[arg(long)]
        remote: bool,
    },
}

/// Status output for JSON mode.
#[derive(Debug, Serialize)]
struct StatusOutput {
    authenticated: bool,
    base_url: String,
    session_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { username } => cmd_login(username, ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
        AuthCommand::Status { remote } => cmd_status(remote, ctx).await,
    }
}

async fn cmd_login(username: Option<String>, ctx: &Context) -> Result<()> {
    let gateway = ctx.gateway()?;

    let username = match username {
        Some(name) => name,
        None => prompt("Username: ")?,
    };
    if username.is_empty() {
        anyhow::bail!("No username provided");
    }

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    let session = gateway
        .auth()
        .login(&username, &password)
        .await
        .map_err(describe)?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "authenticated": true,
                "user": session.user,
            }))?
        );
    } else {
        println!("Signed in as {}", display_name(&session.user).unwrap_or(&username));
    }

    Ok(())
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let gateway = ctx.gateway()?;
    let was_authenticated = gateway.auth().is_authenticated();

    gateway.auth().logout().await;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "authenticated": false }));
    } else if was_authenticated {
        println!("Signed out.");
    } else {
        println!("No stored session.");
    }

    Ok(())
}

async fn cmd_status(remote: bool, ctx: &Context) -> Result<()> {
    let gateway = ctx.gateway()?;

    if remote && gateway.auth().is_authenticated() {
        // A rejected token goes through the refresh path here.
        if let Err(e) = gateway.auth().fetch_profile().await {
            if e.is_session_invalid() {
                tracing::info!("session ended while fetching profile");
            } else {
                return Err(describe(e));
            }
        }
    }

    let session = gateway.store().get();
    let output = StatusOutput {
        authenticated: session.is_some(),
        base_url: gateway.base_url().to_string(),
        session_file: ctx.config.session.session_file().display().to_string(),
        issued_at: session.as_ref().map(|s| s.issued_at.to_rfc3339()),
        user: session.map(|s| s.user),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Session Status");
    println!("--------------");
    if output.authenticated {
        let name = output
            .user
            .as_ref()
            .and_then(display_name)
            .unwrap_or("(unknown user)");
        println!("Signed in as: {}", name);
        if let Some(issued) = &output.issued_at {
            println!("  Issued: {}", issued);
        }
    } else {
        println!("Not signed in");
        println!("  Run 'storefront auth login' to sign in");
    }
    println!("API: {}", output.base_url);
    if ctx.verbose {
        println!("Session file: {}", output.session_file);
    }

    Ok(())
}

/// Best display name in a user record.
fn display_name(user: &Value) -> Option<&str> {
    ["fullName", "username", "email"]
        .iter()
        .find_map(|key| user.get(*key).and_then(Value::as_str))
        .filter(|name| !name.is_empty())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
