//! Implementation of `studyhall users` subcommands.

use anyhow::Result;
use studyhall_core::core::Services;
use studyhall_core::model::Role;

use crate::output::{Formatter, OutputFormat};

#[tracing::instrument(skip(services, format))]
pub fn run_users_register(
    services: &Services,
    actor: &str,
    username: &str,
    roles: &[Role],
    format: OutputFormat,
) -> Result<()> {
    let user = services.users().register(actor, username, roles)?;
    Formatter::new(format).print(&user)
}

pub fn run_users_show(services: &Services, username: &str, format: OutputFormat) -> Result<()> {
    let user = services.users().get(username)?;
    Formatter::new(format).print(&user)
}

pub fn run_users_list(services: &Services, role: Option<Role>, format: OutputFormat) -> Result<()> {
    let users = services.users().list(role)?;
    Formatter::new(format).print_list(
        &users,
        "No users registered",
        "users",
        &["studyhall --as <username> users register <username> --role admin"],
    )
}

#[tracing::instrument(skip(services, format))]
pub fn run_users_grant(
    services: &Services,
    actor: &str,
    username: &str,
    role: Role,
    format: OutputFormat,
) -> Result<()> {
    let message = if services.users().grant(actor, username, role)? {
        format!("Granted {role} to {username}")
    } else {
        format!("{username} already has {role}")
    };
    Formatter::new(format).print_message(&message)
}

#[tracing::instrument(skip(services, format))]
pub fn run_users_revoke(
    services: &Services,
    actor: &str,
    username: &str,
    role: Role,
    format: OutputFormat,
) -> Result<()> {
    let message = if services.users().revoke(actor, username, role)? {
        format!("Revoked {role} from {username}")
    } else {
        format!("{username} does not have {role}")
    };
    Formatter::new(format).print_message(&message)
}
