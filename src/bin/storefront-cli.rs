use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use storefront_client::config::{load_config, load_from_env, ClientConfig};
use storefront_client::observability::logging::init_logging;
use storefront_client::client::Method;
use storefront_client::{
    handle_error, ApiClient, Credentials, Redirect, Request, RequestError, Upload,
};

const DEFAULT_SESSION_FILE: &str = "storefront-session.json";

#[derive(Parser)]
#[command(name = "storefront-cli")]
#[command(about = "Command-line shell for the storefront admin API", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "STOREFRONT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and STOREFRONT_API_URL)
    #[arg(short = 'u', long)]
    base_url: Option<String>,

    /// Where the session token is stored between runs
    #[arg(long)]
    session_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        remember: bool,
    },
    /// End the session
    Logout,
    /// Show the logged-in user
    Whoami {
        /// Fetch the profile from the backend instead of the stored copy
        #[arg(long)]
        refresh: bool,
    },
    /// GET a resource
    Get {
        path: String,
        #[arg(short, long = "query", value_parser = parse_key_val)]
        query: Vec<(String, String)>,
    },
    /// POST a JSON body
    Post {
        path: String,
        #[arg(short, long)]
        data: Option<String>,
    },
    /// PUT a JSON body
    Put {
        path: String,
        #[arg(short, long)]
        data: Option<String>,
    },
    /// PATCH a JSON body
    Patch {
        path: String,
        #[arg(short, long)]
        data: Option<String>,
    },
    /// DELETE a resource
    Delete { path: String },
    /// Upload a file as multipart form data
    Upload {
        path: String,
        file: PathBuf,
        /// Extra form field, `name=value`; JSON values are accepted
        #[arg(short, long = "field", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
        #[arg(long, default_value = "file")]
        field_name: String,
        #[arg(long)]
        mime: Option<String>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

/// Parse `--data`; anything that isn't JSON is rejected.
fn parse_body(data: Option<String>) -> Result<Value, CliError> {
    match data {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| CliError::Input(format!("invalid JSON body: {}", e))),
        None => Ok(Value::Object(Default::default())),
    }
}

/// Failure of a single CLI invocation.
#[derive(Debug, Error)]
enum CliError {
    /// Bad local input: unreadable file, malformed `--data`.
    #[error("{0}")]
    Input(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

fn load(cli: &Cli) -> Result<ClientConfig, String> {
    let mut config = match &cli.config {
        Some(path) => load_config(path),
        None => load_from_env(),
    }
    .map_err(|e| e.to_string())?;

    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
    }
    config.auth.session_file = cli
        .session_file
        .clone()
        .or(config.auth.session_file.take())
        .or_else(|| Some(DEFAULT_SESSION_FILE.to_string()));
    Ok(config)
}

async fn run(client: &ApiClient, command: Commands) -> Result<Option<Value>, CliError> {
    let value = match command {
        Commands::Login {
            email,
            password,
            remember,
        } => {
            let credentials = Credentials {
                remember,
                ..Credentials::new(email, password)
            };
            Some(client.login(&credentials).await?)
        }
        Commands::Logout => {
            client.logout().await?;
            None
        }
        Commands::Whoami { refresh } => {
            if refresh {
                Some(client.refresh_user().await?)
            } else {
                client.current_user()
            }
        }
        Commands::Get { path, query } => {
            let mut request = Request::new(Method::GET, path);
            for (k, v) in query {
                request = request.query(k, v);
            }
            Some(client.send(request).await?)
        }
        Commands::Post { path, data } => Some(client.post(&path, &parse_body(data)?).await?),
        Commands::Put { path, data } => Some(client.put(&path, &parse_body(data)?).await?),
        Commands::Patch { path, data } => Some(client.patch(&path, &parse_body(data)?).await?),
        Commands::Delete { path } => Some(client.delete(&path).await?),
        Commands::Upload {
            path,
            file,
            fields,
            field_name,
            mime,
        } => {
            let content = std::fs::read(&file)
                .map_err(|e| CliError::Input(format!("cannot read {}: {}", file.display(), e)))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());

            let mut upload = Upload::new(file_name, content)
                .field_name(field_name)
                .on_progress(|p| eprint!("\rUploading {}/{} bytes", p.loaded, p.total));
            if let Some(mime) = mime {
                upload = upload.mime(mime);
            }
            for (name, raw) in fields {
                let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                upload = upload.field(name, value);
            }

            let result = client.upload(&path, upload).await;
            eprintln!();
            Some(result?)
        }
    };
    Ok(value)
}

fn report_redirect(redirect: &Redirect) {
    eprintln!(
        "Session ended, sign in again (login location: {}).",
        redirect.location
    );
    eprintln!("Run: storefront-cli login --email <email>");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    init_logging(&config.observability);
    tracing::debug!(base_url = %config.api.base_url, "storefront-cli starting");

    let client = match ApiClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut redirects = client.navigator().subscribe();
    client.initialize_csrf_token().await;

    let result = run(&client, cli.command).await;

    // The shell, not the client, reacts to lost sessions.
    let mut redirected = false;
    loop {
        match redirects.try_recv() {
            Ok(redirect) => {
                report_redirect(&redirect);
                redirected = true;
            }
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    match result {
        Ok(Some(value)) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Ok(None) => ExitCode::SUCCESS,
        Err(CliError::Input(message)) => {
            eprintln!("Error: {}", message);
            ExitCode::from(2)
        }
        Err(CliError::Request(RequestError::Redirect(redirect))) => {
            if !redirected {
                report_redirect(&redirect);
            }
            ExitCode::FAILURE
        }
        Err(CliError::Request(e)) => {
            let api_error = handle_error(&e);
            eprintln!("Error ({}): {}", api_error.code, api_error.message);
            let mut fields: Vec<_> = api_error.errors.iter().collect();
            fields.sort();
            for (field, messages) in fields {
                for message in messages {
                    eprintln!("  {}: {}", field, message);
                }
            }
            ExitCode::FAILURE
        }
    }
}
