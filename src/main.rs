#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use http::Method;
use medtrack_session::config::{Command, Config};
use medtrack_session::error::ClientError;
use medtrack_session::{ClientBuilder, SessionContext, telemetry};
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    medtrack_session::setup_panic_hook();

    let command = config.command.clone().unwrap_or(Command::Status);
    let ctx = ClientBuilder::new(config).build().instrument(tracing::info_span!("boot_client")).await?;

    let outcome = run(&ctx, command).await;
    if let Err(e) = &outcome {
        report_error(e);
    }

    telemetry_guard.shutdown();
    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run(ctx: &SessionContext, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Login { username, password } => {
            let user = ctx.auth.login(&username, &password).await?;
            println!("Logged in as {} ({})", user.username, user.email);
        }
        Command::Logout { everywhere } => {
            if everywhere {
                ctx.auth.logout_everywhere().await;
                println!("Signed out on all devices");
            } else {
                ctx.auth.logout().await;
                println!("Signed out");
            }
        }
        Command::Status => match ctx.tokens.session().await {
            Some(session) if session.logged_in => match session.user {
                Some(user) => println!("Logged in as {} ({})", user.username, user.email),
                None => println!("Logged in"),
            },
            _ => println!("Not logged in"),
        },
        Command::Whoami => {
            let user = ctx.auth.current_user().await?;
            println!("{}\t{}\t{}", user.user_id, user.username, user.email);
        }
        Command::Get { path } => {
            let response = ctx.api.send::<()>(Method::GET, &path, None).await?;
            let status = response.status();
            println!("{}", String::from_utf8_lossy(response.body()));
            if !status.is_success() {
                return Err(ClientError::Api { status, message: status.to_string() });
            }
        }
    }
    Ok(())
}

#[allow(clippy::print_stderr)]
fn report_error(e: &ClientError) {
    tracing::debug!(error = %e, "Command failed");
    eprintln!("{}", e.user_message());
}
