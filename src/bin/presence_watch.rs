use std::panic;

use colabri_presence::{Config, PresenceEvent, PresenceSession, ResourceKey};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "colabri_presence=debug,info".into()
        }))
        .init();

    let mut args = std::env::args().skip(1);
    let (resource_type, resource_id) = match (args.next(), args.next()) {
        (Some(t), Some(id)) => (t, id),
        _ => {
            eprintln!("Usage: presence_watch <resource_type> <resource_id> [user_id] [token]");
            std::process::exit(2);
        }
    };
    let user_id = args.next().unwrap_or_else(|| "presence-watch".to_string());
    let token = args.next().unwrap_or_default();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    let key = ResourceKey::new(resource_type, resource_id);
    info!("👀 Watching presence on {} via {}", key, config.ws_base_url);

    let session = PresenceSession::builder(key, user_id, token)
        .config(config)
        .on_event(|event| match event {
            PresenceEvent::Connected => info!("connected"),
            PresenceEvent::Disconnected { reason, will_retry } => {
                warn!("disconnected ({}), retry={}", reason, will_retry);
            }
            PresenceEvent::RosterChanged { actors } => {
                let names: Vec<&str> = actors.iter().map(|a| a.display_name.as_str()).collect();
                info!("{} present: [{}]", actors.len(), names.join(", "));
            }
            PresenceEvent::DataChanged { actor, change } => {
                info!("{} applied a {:?} to the resource", actor.display_name, change);
            }
            PresenceEvent::UserEditing { actor, field } => {
                info!("{} is editing '{}'", actor.display_name, field);
            }
            PresenceEvent::UserStoppedEditing { actor } => {
                info!("{} stopped editing", actor.display_name);
            }
            PresenceEvent::Error { message } => warn!("server error: {}", message),
        })
        .open();

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");
    info!("Shutting down");
    session.close();
}
