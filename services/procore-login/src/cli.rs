//! Command line parsing
//!
//! `procore-login [--config PATH] <command>`; flags may appear anywhere.

use crate::error::{Error, Result};

pub const USAGE: &str =
    "procore-login [--config PATH] <login | status | refresh | logout | get URL>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the authorization-code flow and store the credential
    Login,
    /// Report whether a credential is stored and when it expires
    Status,
    /// Force a refresh
    Refresh,
    /// Delete the stored credential
    Logout,
    /// Authenticated GET through the interceptor
    Get { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub config_path: Option<String>,
    pub command: Command,
}

/// Parse arguments, excluding the program name.
pub fn parse(args: &[String]) -> Result<Cli> {
    let mut config_path = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::Usage("--config requires a path".into()))?;
                config_path = Some(value.clone());
            }
            flag if flag.starts_with("--") => {
                return Err(Error::Usage(format!("unknown flag {flag}")));
            }
            _ => positional.push(arg.as_str()),
        }
    }

    let command = match positional.as_slice() {
        ["login"] => Command::Login,
        ["status"] => Command::Status,
        ["refresh"] => Command::Refresh,
        ["logout"] => Command::Logout,
        ["get", url] => Command::Get {
            url: (*url).to_string(),
        },
        ["get"] => return Err(Error::Usage("get requires a URL".into())),
        [] => return Err(Error::Usage("missing command".into())),
        [other, ..] => return Err(Error::Usage(format!("unexpected argument {other}"))),
    };

    Ok(Cli {
        config_path,
        command,
    })
}
