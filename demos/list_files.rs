use osc_cam_rs::{
    cam::OscCam,
    info::FileList,
    settings::{FileType, ListFilesRequest},
    util::CamUtil,
};

#[tokio::main]
/// This example lists the images stored on an API level 2 camera and downloads the newest one.
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cam = OscCam::new()?;

    let results = cam
        .list_files(&ListFilesRequest::new(FileType::Image, 10))
        .await?
        .into_results()?;

    let list = FileList::from_results(results)?;

    println!("{} images on the camera", list.total_entries);

    for entry in &list.entries {
        let taken = entry
            .timestamp()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown time".to_string());

        println!("{} ({} bytes, {taken})", entry.name, entry.size);
    }

    if let Some(locator) = list.entries.first().and_then(|e| e.locator()) {
        let data = cam.download(locator).await?;
        tokio::fs::write("newest.jpg", &data).await?;

        println!("Saved the newest image as newest.jpg");
    }

    Ok(())
}
