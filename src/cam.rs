use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt as _, TryStreamExt as _};
use log::*;
use reqwest::{header::CONTENT_TYPE, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    command::CommandReply,
    consts::{self, commands, endpoints},
    info::{CameraInfo, CameraState, StateUpdate},
    poller::{CommandPoller, CommandStatus, PollEnd},
    preview::{self, FrameStream, JpegDemuxer, LivePreview, PreviewListener},
    settings::{ImageType, ListFilesRequest, OscOptions, SortOrder},
    OscError, OscResult,
};

/// Struct for interacting with the camera.
///
/// The camera handles one request at a time, so the struct keeps a single active request slot:
/// starting any operation cancels the one still running. A command followed through its
/// `status` polls counts as a single operation.
pub struct OscCam {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    request_timeout: Duration,
    max_frame_size: Option<usize>,

    /// Cancellation token of the running operation.
    active: Mutex<Option<CancellationToken>>,
}

/// Status requests issued on behalf of a poll session, sharing the session's slot.
struct SessionStatus<'a> {
    cam: &'a OscCam,
    token: CancellationToken,
}

impl CommandStatus for SessionStatus<'_> {
    async fn status(&self, id: &str) -> OscResult<Bytes> {
        self.cam
            .post_command(&self.token, endpoints::COMMANDS_STATUS, &json!({ "id": id }))
            .await
    }
}

fn command_body(name: &str, parameters: Option<Value>) -> Value {
    let mut body = json!({ "name": name });

    if let Some(parameters) = parameters {
        body["parameters"] = parameters;
    }

    body
}

fn session_params(session_id: Option<&str>) -> Option<Value> {
    session_id.map(|id| json!({ "sessionId": id }))
}

impl OscCam {
    /// Creates a client for a camera at the default address (192.168.1.1:80).
    pub fn new() -> OscResult<Self> {
        Self::new_custom(consts::DEFAULT_HOST, consts::DEFAULT_HTTP_PORT)
    }

    /// Creates a client for a camera at the given host and port.
    pub fn new_custom(host: &str, port: u16) -> OscResult<Self> {
        Self::with_base_url(format!("http://{host}:{port}"))
    }

    /// Creates a client for a camera at the given base URL (e.g. `http://192.168.1.1`).
    pub fn with_base_url(base_url: impl Into<String>) -> OscResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(consts::DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: consts::DEFAULT_POLL_INTERVAL,
            request_timeout: consts::DEFAULT_REQUEST_TIMEOUT,
            max_frame_size: Some(consts::DEFAULT_MAX_FRAME_SIZE),
            active: Mutex::new(None),
        })
    }

    /// Uses a custom `reqwest::Client`.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Sets the delay before each `status` request.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the timeout for single requests. The live preview is not affected.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Sets the maximum size of a partial live preview frame (`None` for unlimited).
    pub fn with_max_frame_size(mut self, max_frame_size: Option<usize>) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the request slot, cancelling the operation that held it.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();

        if let Some(previous) = self.slot().replace(token.clone()) {
            if !previous.is_cancelled() {
                debug!("Superseding the running operation");
            }
            previous.cancel();
        }

        token
    }

    /// Cancels the running operation, if any.
    ///
    /// A command being polled ends without a result, a live preview ends with `PreviewEnd::Cancelled`.
    pub fn cancel(&self) {
        if let Some(token) = self.slot().take() {
            token.cancel();
        }
    }

    fn demuxer(&self) -> JpegDemuxer {
        JpegDemuxer::new().with_max_frame_size(self.max_frame_size)
    }

    async fn send(&self, token: &CancellationToken, request: RequestBuilder) -> OscResult<Response> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(OscError::Cancelled),
            response = request.send() => Ok(response?),
        }
    }

    async fn read_body(&self, token: &CancellationToken, response: Response) -> OscResult<Bytes> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(OscError::Cancelled),
            body = response.bytes() => Ok(body?),
        }
    }

    async fn ensure_success(
        &self,
        token: &CancellationToken,
        response: Response,
    ) -> OscResult<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        error!("Camera returned HTTP {status}");

        let body = match self.read_body(token, response).await {
            Ok(body) => String::from_utf8_lossy(&body).into_owned(),
            Err(OscError::Cancelled) => return Err(OscError::Cancelled),
            Err(_) => String::new(),
        };

        Err(OscError::Http {
            status: status.as_u16(),
            body,
        })
    }

    fn post_json(&self, path: &str, body: &Value) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .header(CONTENT_TYPE, consts::JSON_CONTENT_TYPE)
            .json(body)
    }

    /// Posts to a command endpoint and returns the body whatever the HTTP status:
    /// the camera reports command failures as `state: "error"` bodies with 4xx/5xx codes.
    async fn post_command(
        &self,
        token: &CancellationToken,
        path: &str,
        body: &Value,
    ) -> OscResult<Bytes> {
        let request = self.post_json(path, body).timeout(self.request_timeout);
        let response = self.send(token, request).await?;

        debug!("{path} returned HTTP {}", response.status());

        self.read_body(token, response).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> OscResult<T> {
        let token = self.begin();
        let response = self.send(&token, request.timeout(self.request_timeout)).await?;
        let response = self.ensure_success(&token, response).await?;

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(OscError::Cancelled),
            parsed = response.json::<T>() => Ok(parsed?),
        }
    }

    /// Returns basic information about the camera and its supported features.
    pub async fn info(&self) -> OscResult<CameraInfo> {
        self.fetch_json(self.http.get(self.url(endpoints::INFO))).await
    }

    /// Returns the camera state and its fingerprint.
    pub async fn state(&self) -> OscResult<CameraState> {
        self.fetch_json(self.http.post(self.url(endpoints::STATE))).await
    }

    /// Checks whether the camera state changed since `state_fingerprint` was obtained.
    pub async fn check_for_updates(&self, state_fingerprint: &str) -> OscResult<StateUpdate> {
        let request = self.post_json(
            endpoints::CHECK_FOR_UPDATES,
            &json!({ "stateFingerprint": state_fingerprint }),
        );

        self.fetch_json(request).await
    }

    /// Executes a command and returns the camera's immediate response, without waiting for it to finish.
    pub async fn execute(&self, name: &str, parameters: Option<Value>) -> OscResult<CommandReply> {
        let token = self.begin();
        let body = self
            .post_command(&token, endpoints::COMMANDS_EXECUTE, &command_body(name, parameters))
            .await?;

        Ok(CommandReply::from_body(body))
    }

    /// Requests the status of a previously executed command once.
    pub async fn status(&self, id: &str) -> OscResult<CommandReply> {
        let token = self.begin();
        let body = self
            .post_command(&token, endpoints::COMMANDS_STATUS, &json!({ "id": id }))
            .await?;

        Ok(CommandReply::from_body(body))
    }

    /// Executes a command and polls its status until it finishes.
    ///
    /// `on_update` receives the final response (or transport error), preceded by every
    /// intermediate `inProgress` response when `progress_needed` is set.
    pub async fn execute_with_progress(
        &self,
        name: &str,
        parameters: Option<Value>,
        progress_needed: bool,
        on_update: impl FnMut(OscResult<CommandReply>),
    ) -> PollEnd {
        let token = self.begin();

        info!("Executing {name}");

        let initial = self
            .post_command(&token, endpoints::COMMANDS_EXECUTE, &command_body(name, parameters))
            .await;

        let source = SessionStatus {
            cam: self,
            token: token.clone(),
        };

        CommandPoller::new(source)
            .with_interval(self.poll_interval)
            .with_cancel_token(token)
            .resolve(initial, progress_needed, on_update)
            .await
    }

    /// Executes a command and waits for its final response.
    ///
    /// Returns `OscError::Cancelled` if the operation was cancelled or superseded.
    pub async fn execute_and_wait(
        &self,
        name: &str,
        parameters: Option<Value>,
    ) -> OscResult<CommandReply> {
        let mut last = None;

        let end = self
            .execute_with_progress(name, parameters, false, |update| last = Some(update))
            .await;

        match (end, last) {
            (PollEnd::Delivered, Some(update)) => update,
            _ => Err(OscError::Cancelled),
        }
    }

    /// Downloads a file by its absolute URL (`fileUrl`, API level 2).
    pub async fn get(&self, url: &str) -> OscResult<Bytes> {
        let token = self.begin();
        let response = self.send(&token, self.http.get(url)).await?;
        let response = self.ensure_success(&token, response).await?;

        self.read_body(&token, response).await
    }

    /// Starts a session (API level 1). The session id is in `results.sessionId`.
    pub async fn start_session(&self) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::START_SESSION, None).await
    }

    pub async fn update_session(&self, session_id: &str) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::UPDATE_SESSION, session_params(Some(session_id)))
            .await
    }

    pub async fn close_session(&self, session_id: &str) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::CLOSE_SESSION, session_params(Some(session_id)))
            .await
    }

    /// Takes a picture and waits until it is stored.
    ///
    /// * `session_id` - Required by API level 1 cameras, `None` for API level 2.
    pub async fn take_picture(&self, session_id: Option<&str>) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::TAKE_PICTURE, session_params(session_id))
            .await
    }

    pub async fn take_picture_with_progress(
        &self,
        session_id: Option<&str>,
        on_update: impl FnMut(OscResult<CommandReply>),
    ) -> PollEnd {
        self.execute_with_progress(commands::TAKE_PICTURE, session_params(session_id), true, on_update)
            .await
    }

    /// Lists images (API level 1).
    pub async fn list_images(
        &self,
        entry_count: u32,
        max_size: Option<u32>,
        continuation_token: Option<&str>,
        include_thumb: Option<bool>,
    ) -> OscResult<CommandReply> {
        let mut parameters = Map::new();
        parameters.insert("entryCount".into(), entry_count.into());

        if let Some(max_size) = max_size {
            parameters.insert("maxSize".into(), max_size.into());
        }
        if let Some(token) = continuation_token {
            parameters.insert("continuationToken".into(), token.into());
        }
        if let Some(include_thumb) = include_thumb {
            parameters.insert("includeThumb".into(), include_thumb.into());
        }

        self.execute_and_wait(commands::LIST_IMAGES, Some(parameters.into()))
            .await
    }

    /// Lists files (API level 2).
    pub async fn list_files(&self, request: &ListFilesRequest) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::LIST_FILES, Some(serde_json::to_value(request)?))
            .await
    }

    /// Lists all files, including videos (API level 1 vendor command).
    pub async fn list_all(
        &self,
        entry_count: u32,
        continuation_token: Option<&str>,
        detail: Option<bool>,
        sort: Option<SortOrder>,
    ) -> OscResult<CommandReply> {
        let mut parameters = Map::new();
        parameters.insert("entryCount".into(), entry_count.into());

        if let Some(token) = continuation_token {
            parameters.insert("continuationToken".into(), token.into());
        }
        if let Some(detail) = detail {
            parameters.insert("detail".into(), detail.into());
        }
        if let Some(sort) = sort {
            parameters.insert("sort".into(), serde_json::to_value(sort)?);
        }

        self.execute_and_wait(commands::vendor::LIST_ALL, Some(parameters.into()))
            .await
    }

    /// Deletes a file by URI (API level 1).
    pub async fn delete(&self, file_uri: &str) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::DELETE, Some(json!({ "fileUri": file_uri })))
            .await
    }

    pub async fn delete_with_progress(
        &self,
        file_uri: &str,
        on_update: impl FnMut(OscResult<CommandReply>),
    ) -> PollEnd {
        self.execute_with_progress(
            commands::DELETE,
            Some(json!({ "fileUri": file_uri })),
            true,
            on_update,
        )
        .await
    }

    /// Deletes files by URL (API level 2). `["all"]`, `["image"]` and `["video"]` are accepted too.
    pub async fn delete_files(&self, file_urls: &[&str]) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::DELETE, Some(json!({ "fileUrls": file_urls })))
            .await
    }

    fn get_image_params(file_uri: &str, image_type: Option<ImageType>) -> OscResult<Value> {
        let mut parameters = json!({ "fileUri": file_uri });

        if let Some(image_type) = image_type {
            parameters["_type"] = serde_json::to_value(image_type)?;
        }

        Ok(parameters)
    }

    /// Transfers an image (API level 1). On success the reply is `CommandReply::Raw` holding the JPEG bytes.
    pub async fn get_image(
        &self,
        file_uri: &str,
        image_type: Option<ImageType>,
    ) -> OscResult<CommandReply> {
        let parameters = Self::get_image_params(file_uri, image_type)?;

        self.execute_and_wait(commands::GET_IMAGE, Some(parameters)).await
    }

    pub async fn get_image_with_progress(
        &self,
        file_uri: &str,
        image_type: Option<ImageType>,
        on_update: impl FnMut(OscResult<CommandReply>),
    ) -> OscResult<PollEnd> {
        let parameters = Self::get_image_params(file_uri, image_type)?;

        Ok(self
            .execute_with_progress(commands::GET_IMAGE, Some(parameters), true, on_update)
            .await)
    }

    /// Transfers a video (API level 1 vendor command). On success the reply is `CommandReply::Raw`.
    pub async fn get_video(
        &self,
        file_uri: &str,
        image_type: Option<ImageType>,
    ) -> OscResult<CommandReply> {
        let parameters = Self::get_image_params(file_uri, image_type)?;

        self.execute_and_wait(commands::vendor::GET_VIDEO, Some(parameters))
            .await
    }

    /// Returns the Exif and XMP metadata of an image (API level 1).
    pub async fn get_metadata(&self, file_uri: &str) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::GET_METADATA, Some(json!({ "fileUri": file_uri })))
            .await
    }

    /// Reads options. Use `OscOptions::from_results` on the reply's results.
    pub async fn get_options(
        &self,
        session_id: Option<&str>,
        option_names: &[&str],
    ) -> OscResult<CommandReply> {
        let mut parameters = json!({ "optionNames": option_names });

        if let Some(session_id) = session_id {
            parameters["sessionId"] = session_id.into();
        }

        self.execute_and_wait(commands::GET_OPTIONS, Some(parameters)).await
    }

    fn set_options_params(session_id: Option<&str>, options: &OscOptions) -> OscResult<Value> {
        let mut parameters = json!({ "options": serde_json::to_value(options)? });

        if let Some(session_id) = session_id {
            parameters["sessionId"] = session_id.into();
        }

        Ok(parameters)
    }

    pub async fn set_options(
        &self,
        session_id: Option<&str>,
        options: &OscOptions,
    ) -> OscResult<CommandReply> {
        let parameters = Self::set_options_params(session_id, options)?;

        self.execute_and_wait(commands::SET_OPTIONS, Some(parameters)).await
    }

    pub async fn set_options_with_progress(
        &self,
        session_id: Option<&str>,
        options: &OscOptions,
        on_update: impl FnMut(OscResult<CommandReply>),
    ) -> OscResult<PollEnd> {
        let parameters = Self::set_options_params(session_id, options)?;

        Ok(self
            .execute_with_progress(commands::SET_OPTIONS, Some(parameters), true, on_update)
            .await)
    }

    /// Resets all options to their defaults (API level 2).
    pub async fn reset(&self) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::RESET, None).await
    }

    /// Ends the camera's wireless LAN (API level 1 vendor command).
    pub async fn finish_wlan(&self, session_id: Option<&str>) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::vendor::FINISH_WLAN, session_params(session_id))
            .await
    }

    /// Starts video or interval capture (vendor command).
    pub async fn start_capture(&self, session_id: Option<&str>) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::vendor::START_CAPTURE, session_params(session_id))
            .await
    }

    /// Stops video or interval capture (vendor command).
    pub async fn stop_capture(&self, session_id: Option<&str>) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::vendor::STOP_CAPTURE, session_params(session_id))
            .await
    }

    /// Stops a running self-timer (vendor command).
    pub async fn stop_self_timer(&self) -> OscResult<CommandReply> {
        self.execute_and_wait(commands::vendor::STOP_SELF_TIMER, None)
            .await
    }

    fn live_preview_request(&self, session_id: Option<&str>) -> RequestBuilder {
        let body = match session_id {
            Some(session_id) => command_body(
                commands::vendor::GET_LIVE_PREVIEW,
                session_params(Some(session_id)),
            ),
            None => command_body(commands::GET_LIVE_PREVIEW, None),
        };

        self.post_json(endpoints::COMMANDS_EXECUTE, &body)
    }

    async fn open_stream(
        &self,
        token: &CancellationToken,
        request: RequestBuilder,
    ) -> OscResult<BoxStream<'static, OscResult<Bytes>>> {
        let response = self.send(token, request).await?;
        let response = self.ensure_success(token, response).await?;

        info!("Live preview stream opened");

        Ok(response.bytes_stream().map_err(OscError::from).boxed())
    }

    async fn run_preview<L: PreviewListener>(
        &self,
        request: RequestBuilder,
        listener: L,
    ) -> L {
        let token = self.begin();
        let mut preview = LivePreview::new(listener)
            .with_demuxer(self.demuxer())
            .with_cancel_token(token.clone());

        match self.open_stream(&token, request).await {
            Ok(stream) => preview.run(stream).await,
            Err(e) => preview.on_stream_end(Some(e)),
        }

        preview.into_listener()
    }

    /// Streams the live preview into `listener` until the stream ends or is cancelled
    /// (see [`OscCam::cancel`]). Returns the listener afterwards.
    ///
    /// * `session_id` - `Some` for API level 1 cameras (`camera._getLivePreview`),
    ///   `None` for API level 2 (`camera.getLivePreview`).
    pub async fn get_live_preview<L: PreviewListener>(
        &self,
        session_id: Option<&str>,
        listener: L,
    ) -> L {
        let request = self.live_preview_request(session_id);

        self.run_preview(request, listener).await
    }

    /// Same as [`OscCam::get_live_preview`], for cameras serving the preview at a plain URL.
    pub async fn live_preview_from_url<L: PreviewListener>(&self, url: &str, listener: L) -> L {
        let request = self.http.get(url);

        self.run_preview(request, listener).await
    }

    /// Opens the live preview as a stream of frames.
    ///
    /// The stream holds the request slot: it is cancelled by [`OscCam::cancel`] or by the
    /// next operation on the camera, and then yields `Err(OscError::Cancelled)`.
    pub async fn live_preview_stream(&self, session_id: Option<&str>) -> OscResult<FrameStream> {
        let request = self.live_preview_request(session_id);
        let token = self.begin();
        let body = self.open_stream(&token, request).await?;

        Ok(preview::frame_stream(body, self.demuxer(), token))
    }
}
