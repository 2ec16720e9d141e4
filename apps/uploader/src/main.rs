use std::{
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    config::DEFAULT_CONFIG_FILE, load_config_from, logout, ClientConfig, ConsoleRenderer,
    FileIdentityProvider, GuardOutcome, LoginReason, ResultsBoard, SelectedFile, Session,
    SessionGuard, StartOutcome, TokenCache, UploadController, UploadWorkflow,
};
use shared::domain::{ImageUpload, UserHandle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const EXIT_VALIDATION: u8 = 1;
const EXIT_LOGIN_REQUIRED: u8 = 2;
const EXIT_PARTIAL_FAILURE: u8 = 3;
const EXIT_NOT_CONFIGURED: u8 = 4;

#[derive(Parser, Debug)]
#[command(name = "uploader", about = "Send images for labeling and show the results")]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store an id token issued by the identity service.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        id_token: String,
        #[arg(long)]
        email: Option<String>,
    },
    Whoami,
    /// Analyze one or more images for a client.
    Analyze {
        #[arg(long, default_value = "")]
        client_id: String,
        #[arg(long)]
        html_out: Option<PathBuf>,
        files: Vec<PathBuf>,
    },
    Logout,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let config = load_config_from(&cli.config);
    if config.identity_is_placeholder() {
        warn!("identity pool settings are placeholders; set USER_POOL_ID and IDENTITY_CLIENT_ID");
    }
    let identity = Arc::new(FileIdentityProvider::new(
        config.session_path.clone(),
        config.identity_client_id.clone(),
    ));

    match cli.command {
        Command::Login {
            username,
            id_token,
            email,
        } => {
            let session = Session::new(id_token.trim());
            if !session.is_valid_now() {
                bail!("the supplied id token is malformed or already expired");
            }
            identity
                .store_session(&UserHandle(username.clone()), &session, email)
                .await?;
            println!("Signed in as {username}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Whoami => match SessionGuard::check(identity.as_ref(), Utc::now()).await {
            GuardOutcome::Authenticated(auth) => {
                match auth.email {
                    Some(email) => println!("{} <{email}>", auth.user),
                    None => println!("{}", auth.user),
                }
                Ok(ExitCode::SUCCESS)
            }
            GuardOutcome::RedirectToLogin(reason) => Ok(login_required(reason)),
        },
        Command::Analyze {
            client_id,
            html_out,
            files,
        } => analyze(&config, identity, &client_id, &files, html_out.as_deref()).await,
        Command::Logout => {
            logout(identity.as_ref(), &TokenCache::from_config(&config)).await;
            println!("Signed out. Sign in again with `uploader login`.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn analyze(
    config: &ClientConfig,
    identity: Arc<FileIdentityProvider>,
    client_id: &str,
    files: &[PathBuf],
    html_out: Option<&Path>,
) -> Result<ExitCode> {
    let controller = match UploadController::start(config, identity).await {
        StartOutcome::Ready(controller) => controller,
        StartOutcome::RedirectToLogin(reason) => return Ok(login_required(reason)),
        StartOutcome::NotInitialized => {
            eprintln!("Uploader is not configured; see the log for details.");
            return Ok(ExitCode::from(EXIT_NOT_CONFIGURED));
        }
    };

    if let Err(err) = UploadWorkflow::validate(client_id, files.len()) {
        eprintln!("{err}");
        return Ok(ExitCode::from(EXIT_VALIDATION));
    }

    let mut selection = Vec::with_capacity(files.len());
    for path in files {
        selection.push(read_image(path).await);
    }

    let mut renderer = (ConsoleRenderer::new(io::stdout()), ResultsBoard::new());
    let summary = match controller.submit(client_id, selection, &mut renderer).await {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::from(EXIT_VALIDATION));
        }
    };

    if let Some(path) = html_out {
        tokio::fs::write(path, renderer.1.to_html())
            .await
            .with_context(|| format!("failed to write results to '{}'", path.display()))?;
    }

    if summary.failed() > 0 {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// An unreadable path becomes its own error entry instead of aborting the run.
async fn read_image(path: &Path) -> SelectedFile {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), "failed to read image: {err}");
            return SelectedFile::Unreadable {
                file_name,
                reason: err.to_string(),
            };
        }
    };
    let upload = ImageUpload::new(file_name, bytes);
    match mime_guess::from_path(path).first_raw() {
        Some(mime) => upload.with_mime_type(mime).into(),
        None => upload.into(),
    }
}

fn login_required(reason: LoginReason) -> ExitCode {
    let why = match reason {
        LoginReason::NoCurrentUser => "nobody is signed in",
        LoginReason::SessionLookupFailed => "the stored session could not be read",
        LoginReason::InvalidSession => "the session has expired",
    };
    eprintln!(
        "Sign-in required: {why}. Run `uploader login --username <name> --id-token <token>`."
    );
    ExitCode::from(EXIT_LOGIN_REQUIRED)
}
