use std::{
    io::Write as _,
    time::{Duration, Instant},
};

use futures::StreamExt as _;
use mockito::{Matcher, Mock, Server, ServerGuard};
use osc_cam_rs::{
    cam::OscCam,
    command::{CommandReply, CommandState, ErrorCode},
    poller::PollEnd,
    preview::{LivePreviewFrame, PreviewEnd, PreviewListener},
    util::CamUtil,
    OscError,
};
use serde_json::json;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn camera(server: &ServerGuard) -> OscCam {
    OscCam::with_base_url(server.url())
        .unwrap()
        .with_poll_interval(POLL_INTERVAL)
}

fn jpeg(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xFF, 0xD8];
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&[0xFF, 0xD9]);
    frame
}

async fn mock_json(
    server: &mut ServerGuard,
    path: &str,
    command: Option<&str>,
    status: usize,
    body: serde_json::Value,
) -> Mock {
    let mut mock = server.mock("POST", path);

    if let Some(command) = command {
        mock = mock.match_body(Matcher::PartialJson(json!({ "name": command })));
    }

    mock.with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

/// Mocks `camera.takePicture`: in progress, half done, then done with `results`.
async fn mock_take_picture(server: &mut ServerGuard, results: serde_json::Value) -> Vec<Mock> {
    vec![
        mock_json(
            server,
            "/osc/commands/execute",
            Some("camera.takePicture"),
            200,
            json!({"name": "camera.takePicture", "state": "inProgress", "id": "123"}),
        )
        .await,
        mock_json(
            server,
            "/osc/commands/status",
            None,
            200,
            json!({
                "name": "camera.takePicture",
                "state": "inProgress",
                "id": "123",
                "progress": {"completion": 0.5}
            }),
        )
        .await,
        mock_json(
            server,
            "/osc/commands/status",
            None,
            200,
            json!({"name": "camera.takePicture", "state": "done", "results": results}),
        )
        .await,
    ]
}

#[tokio::test]
async fn take_picture_reports_progress_then_result() {
    let mut server = Server::new_async().await;
    let mocks = mock_take_picture(&mut server, json!({"fileUri": "100RICOH/R0010010.JPG"})).await;
    let cam = camera(&server);

    let started = Instant::now();
    let mut updates = Vec::new();
    let end = cam
        .take_picture_with_progress(None, |update| updates.push(update.unwrap()))
        .await;

    assert_eq!(end, PollEnd::Delivered);
    assert!(started.elapsed() >= POLL_INTERVAL * 2);

    let states: Vec<_> = updates.iter().map(CommandReply::state).collect();
    assert_eq!(
        states,
        vec![
            Some(CommandState::InProgress),
            Some(CommandState::InProgress),
            Some(CommandState::Done)
        ]
    );
    assert_eq!(
        updates[1].result().unwrap().progress.as_ref().unwrap().completion,
        0.5
    );
    assert_eq!(
        updates[2].clone().into_results().unwrap(),
        json!({"fileUri": "100RICOH/R0010010.JPG"})
    );

    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn take_picture_without_progress_returns_only_the_result() {
    let mut server = Server::new_async().await;
    let mocks = mock_take_picture(&mut server, json!({"fileUri": "100RICOH/R0010010.JPG"})).await;
    let cam = camera(&server);

    let reply = cam.take_picture(None).await.unwrap();

    assert_eq!(reply.state(), Some(CommandState::Done));
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn take_picture_and_get_downloads_file_url() {
    let mut server = Server::new_async().await;
    let file_url = format!("{}/files/abc/R0010010.JPG", server.url());
    let _mocks = mock_take_picture(&mut server, json!({"fileUrl": file_url})).await;
    let download = server
        .mock("GET", "/files/abc/R0010010.JPG")
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(jpeg(&[0x01, 0x02]))
        .create_async()
        .await;
    let cam = camera(&server);

    let mut progress = Vec::new();
    let picture = cam
        .take_picture_and_get(None, Some(|completion: f64| progress.push(completion)))
        .await
        .unwrap();

    assert_eq!(&picture[..], &jpeg(&[0x01, 0x02])[..]);
    assert_eq!(progress, vec![0.5]);
    download.assert_async().await;
}

#[tokio::test]
async fn take_picture_and_get_transfers_file_uri_with_get_image() {
    let mut server = Server::new_async().await;
    let _mocks = mock_take_picture(&mut server, json!({"fileUri": "100RICOH/R0010010.JPG"})).await;
    let get_image = server
        .mock("POST", "/osc/commands/execute")
        .match_body(Matcher::PartialJson(json!({
            "name": "camera.getImage",
            "parameters": {"fileUri": "100RICOH/R0010010.JPG", "_type": "full"}
        })))
        .with_status(200)
        .with_header("content-type", "image/jpeg")
        .with_body(jpeg(&[0x03]))
        .create_async()
        .await;
    let cam = camera(&server);

    let picture = cam
        .take_picture_and_get(Some("SID_0001"), None::<fn(_)>)
        .await
        .unwrap();

    assert_eq!(&picture[..], &jpeg(&[0x03])[..]);
    get_image.assert_async().await;
}

#[tokio::test]
async fn command_error_body_is_passed_through() {
    let mut server = Server::new_async().await;
    let _mock = mock_json(
        &mut server,
        "/osc/commands/execute",
        Some("camera.setOptions"),
        400,
        json!({
            "name": "camera.setOptions",
            "state": "error",
            "error": {"code": "invalidParameterValue", "message": "exposureProgram"}
        }),
    )
    .await;
    let cam = camera(&server);

    let options = osc_cam_rs::settings::OscOptions::new().with_option("exposureProgram", 7);
    let reply = cam.set_options(None, &options).await.unwrap();

    assert_eq!(reply.state(), Some(CommandState::Error));
    assert!(matches!(
        reply.into_results(),
        Err(OscError::Command {
            code: ErrorCode::InvalidParameterValue,
            ..
        })
    ));
}

#[tokio::test]
async fn info_is_parsed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/osc/info")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "manufacturer": "RICOH",
                "model": "RICOH THETA V",
                "serialNumber": "00105377",
                "firmwareVersion": "2.50.1",
                "endpoints": {"httpPort": 80, "httpUpdatesPort": 80},
                "gps": false,
                "gyro": true,
                "uptime": 67,
                "api": ["/osc/info", "/osc/state", "/osc/commands/execute"],
                "apiLevel": [2]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let cam = camera(&server);

    let info = cam.info().await.unwrap();

    assert_eq!(info.model, "RICOH THETA V");
    assert!(info.gyro);
    assert_eq!(info.api_level, vec![2]);
}

#[tokio::test]
async fn failed_download_reports_http_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/files/missing.jpg")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;
    let cam = camera(&server);

    let res = cam.get(&format!("{}/files/missing.jpg", server.url())).await;

    assert!(matches!(res, Err(OscError::Http { status: 404, ref body }) if body == "not found"));
}

#[tokio::test]
async fn check_for_updates_posts_json() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/osc/checkForUpdates")
        .match_header("content-type", "application/json;charset=utf-8")
        .match_body(Matcher::Json(json!({"stateFingerprint": "FIG_0001"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"stateFingerprint": "FIG_0002", "throttleTimeout": 60}).to_string())
        .create_async()
        .await;
    let cam = camera(&server);

    let update = cam.check_for_updates("FIG_0001").await.unwrap();

    assert_eq!(update.state_fingerprint, "FIG_0002");
    assert_eq!(update.throttle_timeout, Some(60));
    mock.assert_async().await;
}

#[tokio::test]
async fn cancel_interrupts_a_stalled_error_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/files/slow.jpg")
        .with_status(503)
        .with_chunked_body(|w| {
            w.write_all(b"busy")?;
            std::thread::sleep(Duration::from_secs(2));
            w.write_all(b" for a while")
        })
        .create_async()
        .await;
    let cam = camera(&server);
    let url = format!("{}/files/slow.jpg", server.url());

    let started = Instant::now();
    let (res, _) = tokio::join!(cam.get(&url), async {
        tokio::time::sleep(POLL_INTERVAL * 5).await;
        cam.cancel();
    });

    assert!(matches!(res, Err(OscError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancel_stops_polling_without_a_result() {
    let mut server = Server::new_async().await;
    let _execute = mock_json(
        &mut server,
        "/osc/commands/execute",
        None,
        200,
        json!({"name": "camera._startCapture", "state": "inProgress", "id": "7"}),
    )
    .await;
    let _status = server
        .mock("POST", "/osc/commands/status")
        .with_status(200)
        .with_body(json!({"name": "camera._startCapture", "state": "inProgress", "id": "7"}).to_string())
        .expect_at_least(0)
        .create_async()
        .await;
    let cam = camera(&server);

    let (res, _) = tokio::join!(cam.start_capture(None), async {
        tokio::time::sleep(POLL_INTERVAL * 5).await;
        cam.cancel();
    });

    assert!(matches!(res, Err(OscError::Cancelled)));
}

#[tokio::test]
async fn new_operation_supersedes_the_running_one() {
    let mut server = Server::new_async().await;
    let _execute = mock_json(
        &mut server,
        "/osc/commands/execute",
        None,
        200,
        json!({"name": "camera.takePicture", "state": "inProgress", "id": "9"}),
    )
    .await;
    let _status = server
        .mock("POST", "/osc/commands/status")
        .with_status(200)
        .with_body(json!({"name": "camera.takePicture", "state": "inProgress", "id": "9"}).to_string())
        .expect_at_least(0)
        .create_async()
        .await;
    let _state = server
        .mock("POST", "/osc/state")
        .with_status(200)
        .with_body(json!({"fingerprint": "FIG_0003", "state": {"batteryLevel": 0.8}}).to_string())
        .create_async()
        .await;
    let cam = camera(&server);

    let mut updates = 0;
    let (end, state) = tokio::join!(
        cam.take_picture_with_progress(None, |_| updates += 1),
        async {
            tokio::time::sleep(POLL_INTERVAL * 3).await;
            cam.state().await
        }
    );

    assert_eq!(end, PollEnd::Cancelled);
    assert!(updates >= 1);
    assert_eq!(state.unwrap().fingerprint, "FIG_0003");
}

#[derive(Default)]
struct Recorder {
    frames: Vec<LivePreviewFrame>,
    ends: Vec<PreviewEnd>,
}

impl PreviewListener for Recorder {
    fn on_frame(&mut self, frame: LivePreviewFrame) {
        self.frames.push(frame);
    }

    fn on_end(&mut self, end: PreviewEnd) {
        self.ends.push(end);
    }
}

#[tokio::test]
async fn live_preview_from_url_splits_frames() {
    let mut server = Server::new_async().await;
    let mut body = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
    body.extend(jpeg(&[0x01; 100]));
    body.extend(b"\r\n--boundary\r\n");
    body.extend(jpeg(&[0x02; 100]));
    let _mock = server
        .mock("GET", "/preview")
        .with_status(200)
        .with_header("content-type", "multipart/x-mixed-replace; boundary=boundary")
        .with_body(body)
        .create_async()
        .await;
    let cam = camera(&server);

    let recorder = cam
        .live_preview_from_url(&format!("{}/preview", server.url()), Recorder::default())
        .await;

    assert_eq!(recorder.frames.len(), 2);
    assert_eq!(&recorder.frames[0].data[..], &jpeg(&[0x01; 100])[..]);
    assert_eq!(recorder.frames[1].seq, 1);
    assert_eq!(recorder.ends.len(), 1);
    assert!(matches!(recorder.ends[0], PreviewEnd::Closed));
}

#[tokio::test]
async fn live_preview_reports_failed_open() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/osc/commands/execute")
        .with_status(503)
        .with_body("busy")
        .create_async()
        .await;
    let cam = camera(&server);

    let recorder = cam.get_live_preview(None, Recorder::default()).await;

    assert!(recorder.frames.is_empty());
    assert!(matches!(
        recorder.ends[..],
        [PreviewEnd::Failed(OscError::Http { status: 503, .. })]
    ));
}

#[tokio::test]
async fn live_preview_stream_yields_frames() {
    let mut server = Server::new_async().await;
    let mut body = jpeg(&[0x0A]);
    body.extend(jpeg(&[0x0B]));
    body.extend(jpeg(&[0x0C]));
    let _mock = server
        .mock("POST", "/osc/commands/execute")
        .match_body(Matcher::PartialJson(json!({
            "name": "camera._getLivePreview",
            "parameters": {"sessionId": "SID_0001"}
        })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;
    let cam = camera(&server);

    let frames: Vec<_> = cam
        .live_preview_stream(Some("SID_0001"))
        .await
        .unwrap()
        .collect()
        .await;

    let payloads: Vec<_> = frames
        .into_iter()
        .map(|frame| frame.unwrap().data[2])
        .collect();
    assert_eq!(payloads, vec![0x0A, 0x0B, 0x0C]);
}
