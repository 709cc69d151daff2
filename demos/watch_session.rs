//! Follow the backend's progress socket and print every update.
//!
//! Reconnects every few seconds while the backend is down. Stop with Ctrl-C.
//!
//! ```sh
//! FACEFUSION_API_URL=http://localhost:8000 cargo run --example watch_session
//! ```

use faceswap_session::{SessionConfig, SessionEvent, SessionSocket};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faceswap_session=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SessionConfig::from_env()?;
    println!("Watching {}", config.ws_url);

    let socket = SessionSocket::new(&config);
    socket.on_event(|event| match event {
        SessionEvent::Connection(status) => println!("[{}]", status.as_str()),
        SessionEvent::Frame(frame) => tracing::debug!(?frame, "frame"),
    });
    socket.connect()?;

    let mut updates = socket.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if let Some(line) = state.logs.last() {
                    println!("  {}", line);
                }
                if state.is_running() {
                    println!(
                        "  {:>3}% {} frame {}/{} at {:.1} fps",
                        state.progress, state.status, state.current_frame, state.total_frames, state.speed
                    );
                }
                if state.is_complete {
                    println!("Done: {}", state.output_path.as_deref().unwrap_or("(no output path)"));
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    socket.close().await;
    Ok(())
}
