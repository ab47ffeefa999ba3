//! `mediplus auth ...` and `mediplus route`.

use mediplus_client::SessionContext;
use mediplus_client::router::resolve_for;
use mediplus_core::Role;
use secrecy::SecretString;
use tracing::info;

use super::CommandError;
use crate::output;

pub async fn login(
    session: &SessionContext,
    email: &str,
    password: String,
) -> Result<(), CommandError> {
    let user = session.login(email, &SecretString::from(password)).await?;
    info!(role = %user.role, "signed in");
    output::user(&user);
    Ok(())
}

pub async fn signup(
    session: &SessionContext,
    name: &str,
    email: &str,
    password: String,
    role: Role,
    hospital: Option<&str>,
) -> Result<(), CommandError> {
    let user = session
        .signup(name, email, &SecretString::from(password), role, hospital)
        .await?;
    output::user(&user);
    Ok(())
}

pub async fn logout(session: &SessionContext) -> Result<(), CommandError> {
    session.logout().await?;
    output::message("Signed out.");
    Ok(())
}

pub async fn whoami(session: &SessionContext) -> Result<(), CommandError> {
    if !session.is_authenticated().await {
        output::message("Not signed in.");
        return Ok(());
    }
    let user = session.refresh_profile().await?;
    output::user(&user);
    Ok(())
}

pub async fn route(session: &SessionContext, path: &str) {
    let decision = resolve_for(session, path).await;
    output::route(path, decision);
}
