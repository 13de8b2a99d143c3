use osc_cam_rs::{
    cam::OscCam,
    preview::{LivePreviewFrame, PreviewEnd, PreviewListener},
};
use std::{fs::File, io::Write, time::Duration};
use tokio::time::sleep;

/// Saves the first few frames and counts the rest.
struct FrameSaver {
    saved: usize,
    received: u64,
}

impl PreviewListener for FrameSaver {
    fn on_frame(&mut self, frame: LivePreviewFrame) {
        self.received += 1;

        if self.saved > 3 {
            return;
        }

        match image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg) {
            Ok(img) => println!("Frame {}: {}x{}", frame.seq, img.width(), img.height()),
            Err(e) => {
                println!("Frame {} is not a valid JPEG: {e}", frame.seq);
                return;
            }
        }

        if let Ok(mut out_file) = File::create(format!("frame-{}.jpg", frame.seq)) {
            if out_file.write_all(&frame.data).is_ok() {
                self.saved += 1;
            }
        }
    }

    fn on_end(&mut self, end: PreviewEnd) {
        println!("Live preview ended: {end:?}");
    }
}

#[tokio::main]
/// This example saves a few live preview frames as JPG images.
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cam = OscCam::new()?;

    let listener = FrameSaver {
        saved: 0,
        received: 0,
    };

    let (saver, _) = tokio::join!(cam.get_live_preview(None, listener), async {
        sleep(Duration::from_secs(5)).await;
        cam.cancel();
    });

    println!(
        "Received {} frames, saved {} of them",
        saver.received, saver.saved
    );

    Ok(())
}
