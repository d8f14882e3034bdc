use nebula_chat::config::Config;
use nebula_chat::image;
use nebula_chat::models::{self, ModelProfile};
use nebula_chat::session::ChatSession;
use nebula_chat::storage::Store;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
Commands:
  /image <path>   attach an image to the next message
  /send           send the attached images without text (or press Enter)
  /model [id]     list models, or switch to <id>
  /key <api-key>  save an API key
  /clearkey       forget the API key and the transcript
  /clear          clear the transcript
  /export         write the transcript to a JSON file here
  /help           show this help
  /quit           exit
Anything else is sent as a message.";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Send `text` with every queued image, emptying the queue.
async fn send_message(session: &mut ChatSession, text: &str, pending_images: &mut Vec<String>) {
    let images = std::mem::take(pending_images);
    if !images.is_empty() && !session.current_model().supports_vision {
        println!("Note: the current model does not support images; sending text only.");
    }
    match session.send(text, images).await {
        Ok(reply) => println!("\n{reply}\n"),
        Err(err) => eprintln!("Error: {err}"),
    }
}

fn print_model(profile: &ModelProfile, current: bool) {
    let marker = if current { "*" } else { " " };
    let vision = if profile.supports_vision { " [vision]" } else { "" };
    println!(
        "{marker} {:<18} {} ({}){vision}\n    {}",
        profile.id, profile.name, profile.price, profile.description
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let store = Store::open_default();
    let config = Config::load(&store)?;
    let mut session = ChatSession::open(config, store);

    let current = session.current_model();
    println!("Model: {} ({})", current.name, current.backend_name);
    if !session.has_api_key() {
        println!("No API key configured. Set NEBULA_API_KEY or use /key <api-key>.");
    }
    println!("Type /help for commands.");

    let mut pending_images: Vec<String> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            if !pending_images.is_empty() {
                send_message(&mut session, "", &mut pending_images).await;
            }
            continue;
        }

        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/send" if pending_images.is_empty() => println!("No images attached."),
            "/send" => send_message(&mut session, arg, &mut pending_images).await,
            "/image" => match image::read_data_uri(arg) {
                Ok(uri) => {
                    pending_images.push(uri);
                    println!("Attached {} image(s).", pending_images.len());
                }
                Err(err) => eprintln!("{err:#}"),
            },
            "/model" if arg.is_empty() => {
                let current = session.current_model().id;
                for profile in models::MODELS {
                    print_model(profile, profile.id == current);
                }
            }
            "/model" => match session.set_model(arg) {
                Ok(profile) => {
                    println!("Switched to {}.", profile.name);
                    if !pending_images.is_empty() && !profile.supports_vision {
                        println!("Note: this model ignores attached images.");
                    }
                }
                Err(err) => eprintln!("{err:#}"),
            },
            "/key" => match session.set_api_key(arg) {
                Ok(()) => println!("API key saved."),
                Err(err) => eprintln!("{err:#}"),
            },
            "/clearkey" => match session.clear_api_key() {
                Ok(()) => println!("API key cleared."),
                Err(err) => eprintln!("{err:#}"),
            },
            "/clear" => match session.clear_history() {
                Ok(()) => println!("Chat history cleared."),
                Err(err) => eprintln!("{err:#}"),
            },
            "/export" => match session.export_history(std::path::Path::new(".")) {
                Ok(path) => println!("Exported to {}.", path.display()),
                Err(err) => eprintln!("{err:#}"),
            },
            _ => send_message(&mut session, line, &mut pending_images).await,
        }
    }

    Ok(())
}
