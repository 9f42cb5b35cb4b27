use std::{sync::Arc, time::Duration};

use business_feed::{
    ws::{EntityType, Envelope, Event, SubscriptionKey},
    Client,
};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let (id, entity_type) = match (args.next(), args.next().map(|t| t.to_lowercase())) {
        (Some(id), Some(t)) if t == "restaurante" => (id, EntityType::Restaurante),
        (Some(id), Some(t)) if t == "hospedaje" => (id, EntityType::Hospedaje),
        _ => {
            println!("Usage: watch <entity id> <restaurante|hospedaje>");
            std::process::exit(1);
        }
    };

    let client = Client::from_env()
        .map_err(|err| {
            println!("Invalid feed configuration: {}", err);
            std::process::exit(1);
        })
        .unwrap();

    let mut conn = client
        .connect_with_fallback(
            SubscriptionKey::new(id, entity_type),
            || async { log::info!("Feed is down, refresh from REST api") },
            Duration::from_secs(30),
        )
        .map_err(|err| {
            println!("Invalid fallback: {}", err);
            std::process::exit(1);
        })
        .unwrap();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seen: Option<Arc<Envelope>> = None;

    loop {
        tokio::select! {
            changed = conn.changed() => {
                if !changed {
                    break;
                }

                let snapshot = conn.snapshot();
                log::info!(
                    "Feed {}, polling: {}, retries: {}",
                    snapshot.state,
                    snapshot.polling,
                    snapshot.reconnect_attempts
                );

                if let Some(message) = snapshot.last_message {
                    if !seen.as_ref().is_some_and(|s| Arc::ptr_eq(s, &message)) {
                        match Event::from_envelope(&message) {
                            Some(event) => log::info!("{}: {}", event.kind(), message.payload),
                            None => log::info!("Unhandled {} envelope", message.kind),
                        }
                        seen = Some(message);
                    }
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    conn.close().await;
}
