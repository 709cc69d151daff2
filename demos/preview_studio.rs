//! Upload a face and a target, scrub to a frame and save the preview.
//!
//! ```sh
//! cargo run --example preview_studio -- face.jpg clip.mp4 120
//! ```

use faceswap_session::{format_timecode, ProcessRequest, SessionConfig, Studio};
use std::time::Duration;
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

    let mut args = std::env::args().skip(1);
    let (Some(source), Some(target)) = (args.next(), args.next()) else {
        eprintln!("usage: preview_studio <source> <target> [frame]");
        return Ok(());
    };
    let frame: u32 = args.next().map(|f| f.parse()).transpose()?.unwrap_or(0);

    let config = SessionConfig::from_env()?;
    let mut studio = Studio::new(config)?;
    if !studio.backend().health().await? {
        eprintln!("Backend at {} is not healthy", studio.backend().endpoint());
        return Ok(());
    }

    studio.upload_source_file(&source).await?;
    studio.upload_target_file(&target).await?;

    let selection = studio.selection();
    println!("Found {} face(s)", selection.faces().len());
    if let Some(trim) = selection.trim() {
        let fps = selection.fps().unwrap_or(30.0);
        println!("Video: {} frames ({})", trim.frames(), trim.duration_label(fps));
    }

    if !studio.set_frame(frame) {
        eprintln!("Frame {} is out of range, previewing frame 0", frame);
    }

    let mut preview = studio.preview().subscribe();
    let image = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            if preview.changed().await.is_err() {
                return None;
            }
            let state = preview.borrow_and_update().clone();
            if let Some(image) = state.image {
                return Some(image);
            }
        }
    })
    .await?;

    match image {
        Some(image) => {
            let fps = studio.selection().fps().unwrap_or(30.0);
            tokio::fs::write("preview.jpg", &image.image).await?;
            println!(
                "Saved preview of frame {} ({}) to preview.jpg",
                image.frame,
                format_timecode(image.frame, fps)
            );
        }
        None => eprintln!("No preview available"),
    }

    if std::env::var("START_RUN").is_ok() {
        let response = studio
            .start_processing(ProcessRequest::new().processors(["face_swapper"]))
            .await?;
        println!("Run started: {}", response.status);
    }

    studio.close().await;
    Ok(())
}
