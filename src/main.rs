use clap::Parser;
use snapshare::cli::context::Context;
use snapshare::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapshare=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut cli = Cli::parse();

    let Some(command) = cli.command.take() else {
        // No subcommand provided, print help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = Context::load(&cli)?;

    match command {
        Commands::Signup { email, name } => {
            snapshare::cli::auth::signup(&ctx, &email, name).await?;
        }
        Commands::Login { email } => {
            snapshare::cli::auth::login(&ctx, &email).await?;
        }
        Commands::LoginProvider {
            provider_id,
            id_token,
        } => {
            snapshare::cli::auth::login_provider(&ctx, provider_id, id_token).await?;
        }
        Commands::Logout => {
            snapshare::cli::auth::logout(&ctx).await?;
        }
        Commands::Whoami => {
            snapshare::cli::auth::whoami(&ctx).await?;
        }
        Commands::Gallery { group_by, mine } => {
            snapshare::cli::gallery::run(&ctx, &group_by, mine).await?;
        }
        Commands::Download { id, dir, mine } => {
            snapshare::cli::gallery::download(&ctx, &id, dir, mine).await?;
        }
        Commands::Upload {
            paths,
            kind,
            title,
            category,
            private,
        } => {
            snapshare::cli::upload::run(&ctx, paths, &kind, title, category, private).await?;
        }
        Commands::Uploads { command } => {
            snapshare::cli::uploads::run(&ctx, command).await?;
        }
        Commands::Profile { command } => {
            snapshare::cli::profile::run(&ctx, command).await?;
        }
    }

    Ok(())
}
