use anyhow::{Result, bail};
use sea_orm::Database;
use services::users::NewUser;
use tracing::{info, trace};

pub async fn create_superuser(database_url: &str, username: &str, email: &str, password: &str) -> Result<()> {
    trace!("Entering create_superuser function");
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    let db = Database::connect(database_url).await?;
    let user = services::users::create_user(
        &db,
        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            is_staff: true,
            is_superuser: true,
            ..Default::default()
        },
    )
    .await?;

    info!("Superuser '{}' created with ID {}", user.username, user.id);
    println!("Superuser '{}' created.", user.username);
    Ok(())
}
