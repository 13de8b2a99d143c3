use std::{fs::File, io::Write};

use osc_cam_rs::{cam::OscCam, command::CommandReply, util::CamUtil};

#[tokio::main]
/// This example takes a photo and saves it in a file.
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cam = OscCam::new()?;

    let info = cam.info().await?;
    println!("Connected to {} {}", info.manufacturer, info.model);

    // API level 1 cameras need a session, API level 2 cameras don't know the command.
    let session_id = match cam.start_session().await.and_then(CommandReply::into_results) {
        Ok(results) => results["sessionId"].as_str().map(str::to_owned),
        Err(_) => None,
    };

    let img = cam
        .take_picture_and_get(session_id.as_deref(), Some(on_progress))
        .await?;

    println!("Received an image! Saving it...");

    File::create("image.jpg")?.write_all(&img)?;

    if let Some(session_id) = session_id {
        cam.close_session(&session_id).await?;
    }

    Ok(())
}

fn on_progress(completion: f64) {
    println!("Processing the picture: {:.0}%", completion * 100.0);
}
