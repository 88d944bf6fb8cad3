use super::context::Context;
use crate::models::{FederatedCredential, ProfileUpdate};
use anyhow::Result;

pub async fn signup(ctx: &Context, email: &str, name: Option<String>) -> Result<()> {
    let auth = ctx.auth().await?;
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let mut user = auth.create_account(email, &password).await?;
    if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
        user = auth
            .update_profile(&ProfileUpdate::display_name(name.trim()))
            .await?;
    }
    println!("Account created for {}", user.email);
    Ok(())
}

pub async fn login(ctx: &Context, email: &str) -> Result<()> {
    let auth = ctx.auth().await?;
    let password = rpassword::prompt_password("Password: ")?;
    let user = auth.sign_in(email, &password).await?;
    println!("Signed in as {}", user.email);
    Ok(())
}

pub async fn login_provider(ctx: &Context, provider_id: String, id_token: String) -> Result<()> {
    let auth = ctx.auth().await?;
    let credential = FederatedCredential {
        provider_id,
        id_token,
    };
    let user = auth.sign_in_with_provider(&credential).await?;
    println!("Signed in as {}", user.email);
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    let auth = ctx.auth().await?;
    auth.sign_out().await?;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    match ctx.saved_user().await? {
        Some(user) => println!(
            "{} ({})",
            user.display_name.as_deref().unwrap_or("N/A"),
            user.email
        ),
        None => println!("Not signed in"),
    }
    Ok(())
}
