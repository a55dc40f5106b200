//! Command-line access to cloud sync: sign in, push local canvases, pull
//! remote ones and upload images.

use infinicanvas_cloud::{BackendClient, BackendConfig, CloudError};
use infinicanvas_core::storage::{FileStorage, FileTokenStore, Storage};
use std::path::PathBuf;
use std::sync::Arc;

const HELP: &str = "\
infinicanvas-sync

USAGE:
  infinicanvas-sync <COMMAND> [ARGS]

COMMANDS:
  signup <email> <password>          Create an account and sign in
  login <email> <password>           Sign in
  logout                             Sign out
  whoami                             Show the signed-in user
  list                               List your cloud canvases
  push <local-id> [--title <title>] [--remote <canvas-id>]
                                     Upload a local canvas, updating <canvas-id>
                                     and recording a version when given
  pull <canvas-id> [--local <local-id>]
                                     Download a cloud canvas into local storage
  delete <canvas-id>                 Delete a cloud canvas
  versions <canvas-id>               List saved versions of a cloud canvas
  upload <file>                      Upload an image and print its public URL

ENVIRONMENT:
  INFINICANVAS_BACKEND_URL, INFINICANVAS_BACKEND_ANON_KEY
";

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn content_type_for(path: &std::path::Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        _ => None,
    }
}

async fn run(mut args: pico_args::Arguments) -> CliResult<()> {
    let Some(command) = args.subcommand()? else {
        print!("{}", HELP);
        return Ok(());
    };

    let config = BackendConfig::from_env();
    let client = match BackendClient::new(&config, Arc::new(FileTokenStore::default_location()?)) {
        Ok(client) => client,
        Err(CloudError::NotConfigured) => {
            return Err(
                "set INFINICANVAS_BACKEND_URL and INFINICANVAS_BACKEND_ANON_KEY first".into(),
            );
        }
        Err(e) => return Err(e.into()),
    };

    match command.as_str() {
        "signup" | "login" => {
            let email: String = args.free_from_str()?;
            let password: String = args.free_from_str()?;
            finish(args)?;
            let user = if command == "signup" {
                client.sign_up(&email, &password).await?
            } else {
                client.sign_in_with_password(&email, &password).await?
            };
            println!("Signed in as {} ({})", user.email.unwrap_or_default(), user.id);
        }
        "logout" => {
            finish(args)?;
            client.sign_out().await?;
            println!("Signed out");
        }
        "whoami" => {
            finish(args)?;
            match client.get_user().await? {
                Some(user) => println!("{} ({})", user.email.unwrap_or_default(), user.id),
                None => println!("Not signed in"),
            }
        }
        "list" => {
            finish(args)?;
            for canvas in client.get_user_canvases().await? {
                println!(
                    "{}  {}  {} elements  updated {}",
                    canvas.id,
                    canvas.title,
                    canvas.data.len(),
                    canvas.updated_at.to_rfc3339()
                );
            }
        }
        "push" => {
            let title: Option<String> = args.opt_value_from_str("--title")?;
            let remote: Option<String> = args.opt_value_from_str("--remote")?;
            let local_id: String = args.free_from_str()?;
            finish(args)?;

            let state = FileStorage::default_location()?.load(&local_id).await?;
            match remote {
                Some(canvas_id) => {
                    client.update_canvas(&canvas_id, &state, None).await?;
                    let version = client.save_canvas_version(&canvas_id, &state).await?;
                    println!("Updated {} (version {})", canvas_id, version.id);
                }
                None => {
                    let title = title.unwrap_or_else(|| local_id.clone());
                    let canvas = client.save_canvas(&title, &state, None).await?;
                    println!("Saved {} as {}", local_id, canvas.id);
                }
            }
        }
        "pull" => {
            let local: Option<String> = args.opt_value_from_str("--local")?;
            let canvas_id: String = args.free_from_str()?;
            finish(args)?;

            let canvas = client.get_canvas(&canvas_id).await?;
            let local_id = local.unwrap_or_else(|| canvas.id.clone());
            FileStorage::default_location()?
                .save(&local_id, &canvas.data)
                .await?;
            println!("Pulled {} into {}", canvas.title, local_id);
        }
        "delete" => {
            let canvas_id: String = args.free_from_str()?;
            finish(args)?;
            client.delete_canvas(&canvas_id).await?;
            println!("Deleted {}", canvas_id);
        }
        "versions" => {
            let canvas_id: String = args.free_from_str()?;
            finish(args)?;
            for version in client.list_canvas_versions(&canvas_id).await? {
                println!(
                    "{}  {}  {} elements",
                    version.id,
                    version.created_at.to_rfc3339(),
                    version.version_data.len()
                );
            }
        }
        "upload" => {
            let path: PathBuf = args.free_from_str()?;
            finish(args)?;

            let content_type = content_type_for(&path)
                .ok_or_else(|| format!("{} is not a PNG, JPEG or WebP image", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or("file name is not valid UTF-8")?
                .to_string();
            let bytes = std::fs::read(&path)?;
            let url = client.upload_image(bytes, &file_name, content_type).await?;
            println!("{}", url);
        }
        other => {
            return Err(format!("unknown command {:?}, see --help", other).into());
        }
    }
    Ok(())
}

/// Reject leftover arguments.
fn finish(args: pico_args::Arguments) -> CliResult<()> {
    let rest = args.finish();
    if rest.is_empty() {
        Ok(())
    } else {
        Err(format!("unexpected arguments: {:?}", rest).into())
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return;
    }

    if let Err(e) = run(args).await {
        log::debug!("Command failed: {:?}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
