mod protocol;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use form_coach::{
    CameraError, CoachConfig, CollectingFeedbackSink, Engine, ExerciseType, FrameReport, JointSet,
    Point2D, SessionSummary, Side, SpeechDispatcher, SpeechError, SpeechSink, Stage,
};
use protocol::{
    ErrorCode, EventEnvelope, RequestEnvelope, ResponseEnvelope, RpcError, RpcMethod,
    MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const UNKNOWN_REQUEST_ID: &str = "_unknown";
const CONFIG_ENV: &str = "FORM_COACH_CONFIG";
/// Request id for events emitted after stdin closes
const EXIT_EVENT_ID: &str = "_exit";

/// The client is the camera, pose estimator and screen; speech goes to
/// stderr so it never interleaves with protocol lines on stdout.
struct StderrSpeech;

impl SpeechSink for StderrSpeech {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        eprintln!("[speech] say text={text:?}");
        Ok(())
    }
}

struct BridgeState {
    config: CoachConfig,
    engine: Engine,
    events: Arc<CollectingFeedbackSink>,
    side: Side,
    /// Origin for `timestamp_ms` on frames of the current session
    session_origin: Option<Instant>,
}

impl BridgeState {
    fn new(config: CoachConfig) -> Self {
        let events = Arc::new(CollectingFeedbackSink::new());
        let engine = build_engine(config.clone(), &events);
        Self {
            side: config.side,
            config,
            engine,
            events,
            session_origin: None,
        }
    }
}

fn build_engine(config: CoachConfig, events: &Arc<CollectingFeedbackSink>) -> Engine {
    Engine::new(config, events.clone(), coach_speech())
}

fn coach_speech() -> SpeechDispatcher {
    SpeechDispatcher::new(Arc::new(StderrSpeech))
}

struct MethodOutcome {
    result: Value,
    should_shutdown: bool,
}

impl MethodOutcome {
    fn reply(result: Value) -> Self {
        Self {
            result,
            should_shutdown: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionStartParams {
    exercise: String,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    voice: Option<bool>,
    #[serde(default)]
    notify_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionFrameParams {
    /// Full pose landmark list as `[x, y]` pairs
    landmarks: Option<Vec<[f64; 2]>>,
    /// Joints of the tracked side, keyed by joint name
    joints: Option<JointSet>,
    /// Milliseconds since the session started
    timestamp_ms: Option<u64>,
    /// The client's camera failed; ends the session
    camera_error: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("[bridge] fatal error: {err}");
        std::process::exit(1);
    }
}

fn run() -> io::Result<()> {
    let config = load_config_from_env();

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut state = BridgeState::new(config);

    for line_result in stdin.lock().lines() {
        let line = match line_result {
            Ok(line) => line,
            Err(err) => {
                eprintln!("[bridge] stdin read error: {err}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let fallback_id =
            extract_request_id(&line).unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string());
        let started = Instant::now();

        let (response, should_shutdown) = if line.len() > MAX_REQUEST_BYTES {
            (
                ResponseEnvelope::err(
                    fallback_id,
                    RpcError::new(
                        ErrorCode::PayloadTooLarge,
                        format!(
                            "Request exceeds max size ({} > {})",
                            line.len(),
                            MAX_REQUEST_BYTES
                        ),
                    ),
                ),
                false,
            )
        } else {
            handle_line(&line, &mut state)
        };

        flush_events(&mut stdout, &state.events, &response.id)?;
        write_response(&mut stdout, &response)?;

        let latency_ms = started.elapsed().as_millis();
        eprintln!(
            "[bridge] id={} ok={} latency_ms={latency_ms}",
            response.id, response.ok
        );

        if should_shutdown {
            break;
        }
    }

    // stdin closed without runtime.shutdown
    if let Some(summary) = state.engine.stop() {
        eprintln!(
            "[bridge] session closed on exit reps={} frames={}",
            summary.rep_count, summary.frames
        );
        if let Err(err) = flush_events(&mut stdout, &state.events, EXIT_EVENT_ID) {
            eprintln!("[bridge] could not flush exit events: {err}");
        }
    }

    Ok(())
}

fn handle_line(line: &str, state: &mut BridgeState) -> (ResponseEnvelope, bool) {
    let json_value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            let id = extract_request_id(line).unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string());
            return (
                ResponseEnvelope::err(
                    id,
                    RpcError::new(
                        ErrorCode::ParseError,
                        format!("Invalid JSON request: {err}"),
                    ),
                ),
                false,
            );
        }
    };

    let request_id = json_value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(UNKNOWN_REQUEST_ID)
        .to_string();

    let request: RequestEnvelope = match serde_json::from_value(json_value) {
        Ok(request) => request,
        Err(err) => {
            return (
                ResponseEnvelope::err(
                    request_id,
                    RpcError::new(
                        ErrorCode::InvalidRequest,
                        format!("Invalid request envelope: {err}"),
                    ),
                ),
                false,
            );
        }
    };

    if request.message_type != "request" {
        return (
            ResponseEnvelope::err(
                request.id,
                RpcError::new(
                    ErrorCode::InvalidRequest,
                    format!(
                        "Unsupported message type '{}' (expected 'request')",
                        request.message_type
                    ),
                ),
            ),
            false,
        );
    }

    if request.id.trim().is_empty() {
        return (
            ResponseEnvelope::err(
                UNKNOWN_REQUEST_ID,
                RpcError::new(ErrorCode::InvalidRequest, "Request id must not be empty"),
            ),
            false,
        );
    }

    let method = match RpcMethod::from_str(&request.method) {
        Ok(method) => method,
        Err(err) => return (ResponseEnvelope::err(request.id, err), false),
    };

    match dispatch_request(state, method, request.params) {
        Ok(outcome) => (
            ResponseEnvelope::ok(request.id, outcome.result),
            outcome.should_shutdown,
        ),
        Err(err) => (ResponseEnvelope::err(request.id, err), false),
    }
}

fn dispatch_request(
    state: &mut BridgeState,
    method: RpcMethod,
    params: Value,
) -> Result<MethodOutcome, RpcError> {
    match method {
        RpcMethod::RuntimeHello => Ok(MethodOutcome::reply(handle_runtime_hello(state))),
        RpcMethod::ExercisesList => Ok(MethodOutcome::reply(json!({
            "exercises": exercise_catalog(),
        }))),
        RpcMethod::SessionStart => {
            let params: SessionStartParams = parse_params(params)?;
            handle_session_start(state, params).map(MethodOutcome::reply)
        }
        RpcMethod::SessionFrame => {
            let params: SessionFrameParams = parse_params(params)?;
            handle_session_frame(state, params).map(MethodOutcome::reply)
        }
        RpcMethod::SessionStatus => Ok(MethodOutcome::reply(handle_session_status(state))),
        RpcMethod::SessionStop => handle_session_stop(state).map(MethodOutcome::reply),
        RpcMethod::RuntimeShutdown => Ok(MethodOutcome {
            result: handle_runtime_shutdown(state),
            should_shutdown: true,
        }),
    }
}

fn load_config_from_env() -> CoachConfig {
    match env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            let path = PathBuf::from(path.trim());
            eprintln!("[bridge] config from env: {}", path.display());
            CoachConfig::load_or_default(&path)
        }
        _ => CoachConfig::load(),
    }
}

fn handle_runtime_hello(state: &BridgeState) -> Value {
    json!({
        "protocol_version": PROTOCOL_VERSION,
        "bridge_version": env!("CARGO_PKG_VERSION"),
        "methods": RpcMethod::supported(),
        "exercises": ExerciseType::ALL.iter().map(|e| e.as_str()).collect::<Vec<_>>(),
        "config": {
            "side": state.config.side.as_str(),
            "voice_enabled": state.config.voice_enabled,
            "notify_interval_ms": state.config.notify_interval_ms,
        },
    })
}

fn exercise_catalog() -> Vec<Value> {
    ExerciseType::ALL
        .iter()
        .map(|exercise| {
            let rules = exercise.rules();
            json!({
                "id": exercise.as_str(),
                "name": exercise.display_name(),
                "angles": rules.angles.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
                "counts_reps": rules.reps.is_some(),
            })
        })
        .collect()
}

fn handle_session_start(
    state: &mut BridgeState,
    params: SessionStartParams,
) -> Result<Value, RpcError> {
    let exercise = ExerciseType::from_str(params.exercise.trim())
        .map_err(|err| RpcError::new(ErrorCode::UnknownExercise, err.to_string()))?;

    let side = match normalize_optional_string(params.side) {
        Some(side) => Side::from_str(&side)
            .map_err(|err| RpcError::new(ErrorCode::InvalidParams, err))?,
        None => state.config.side,
    };

    if params.notify_interval_ms == Some(0) {
        return Err(RpcError::new(
            ErrorCode::InvalidParams,
            "notify_interval_ms must be greater than 0",
        ));
    }

    let mut config = state.config.clone();
    config.side = side;
    if let Some(voice) = params.voice {
        config.voice_enabled = voice;
    }
    if let Some(interval_ms) = params.notify_interval_ms {
        config.notify_interval_ms = interval_ms;
    }

    let now = Instant::now();
    if &config != state.engine.config() {
        state.engine.reconfigure(config, coach_speech());
    }
    let previous = state.engine.start_at(exercise, now);
    state.side = side;
    state.session_origin = Some(now);

    eprintln!(
        "[bridge] session started exercise={} side={}",
        exercise.as_str(),
        side.as_str()
    );

    Ok(json!({
        "exercise": exercise.as_str(),
        "name": exercise.display_name(),
        "side": side.as_str(),
        "voice_enabled": state.engine.config().voice_enabled,
        "notify_interval_ms": state.engine.config().notify_interval_ms,
        "previous": previous.as_ref().map(summary_json),
    }))
}

fn handle_session_frame(
    state: &mut BridgeState,
    params: SessionFrameParams,
) -> Result<Value, RpcError> {
    if !state.engine.is_running() {
        return Err(not_running());
    }

    let now = match (state.session_origin, params.timestamp_ms) {
        (Some(origin), Some(ms)) => origin + Duration::from_millis(ms),
        _ => Instant::now(),
    };

    if let Some(reason) = normalize_optional_string(params.camera_error) {
        let summary = state
            .engine
            .camera_failed(&CameraError::Device(reason), now)
            .ok_or_else(not_running)?;
        state.session_origin = None;
        return Ok(json!({
            "stopped": true,
            "summary": summary_json(&summary),
        }));
    }

    let joints = match (params.landmarks, params.joints) {
        (Some(_), Some(_)) => {
            return Err(RpcError::new(
                ErrorCode::InvalidParams,
                "Provide either landmarks or joints, not both",
            ));
        }
        (Some(landmarks), None) => {
            let points: Vec<Point2D> = landmarks.into_iter().map(Point2D::from).collect();
            JointSet::from_landmarks(&points, state.side)
        }
        (None, Some(joints)) => Some(joints),
        (None, None) => None,
    };

    let report = state
        .engine
        .process_frame(joints.as_ref(), now)
        .map_err(|err| RpcError::new(ErrorCode::SessionNotRunning, err.to_string()))?;

    Ok(frame_report_json(&report))
}

fn handle_session_status(state: &BridgeState) -> Value {
    match state.engine.session() {
        Some(session) if state.engine.is_running() => json!({
            "running": true,
            "exercise": session.exercise().as_str(),
            "rep_count": session.rep_count(),
            "stage": session.stage().map(Stage::as_str),
            "phase": session.phase().map(|phase| format!("{phase:?}").to_lowercase()),
            "frames": session.frames(),
            "frames_without_body": session.frames_without_body(),
        }),
        _ => json!({"running": false}),
    }
}

fn handle_session_stop(state: &mut BridgeState) -> Result<Value, RpcError> {
    let summary = state.engine.stop().ok_or_else(not_running)?;
    state.session_origin = None;
    Ok(json!({
        "stopped": true,
        "summary": summary_json(&summary),
    }))
}

/// Ends any running session so its summary goes out with the reply
fn handle_runtime_shutdown(state: &mut BridgeState) -> Value {
    let summary = state.engine.stop();
    state.session_origin = None;
    json!({
        "shutting_down": true,
        "summary": summary.as_ref().map(summary_json),
    })
}

fn frame_report_json(report: &FrameReport) -> Value {
    let angles: Map<String, Value> = report
        .readings
        .iter()
        .flat_map(|readings| readings.iter())
        .map(|(angle, degrees)| (angle.as_str().to_string(), json!(degrees)))
        .collect();

    json!({
        "message": report.verdict.message,
        "severity": report.verdict.severity.as_str(),
        "color": report.verdict.severity.color(),
        "should_notify": report.verdict.should_notify,
        "spoken": report.spoken,
        "rep_count": report.rep_count,
        "rep_completed": report.rep_completed,
        "stage": report.stage.map(Stage::as_str),
        "body_detected": report.readings.is_some(),
        "angles": angles,
    })
}

fn summary_json(summary: &SessionSummary) -> Value {
    json!({
        "exercise": summary.exercise.as_str(),
        "rep_count": summary.rep_count,
        "duration_ms": summary.duration_ms,
        "frames": summary.frames,
        "frames_without_body": summary.frames_without_body,
        "reason": summary.reason,
    })
}

fn not_running() -> RpcError {
    RpcError::new(ErrorCode::SessionNotRunning, "No session is running")
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    let params = if params.is_null() { json!({}) } else { params };

    serde_json::from_value(params)
        .map_err(|err| RpcError::new(ErrorCode::InvalidParams, format!("Invalid params: {err}")))
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn extract_request_id(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    value.get("id")?.as_str().map(ToString::to_string)
}

fn flush_events(
    stdout: &mut dyn Write,
    events: &CollectingFeedbackSink,
    request_id: &str,
) -> io::Result<()> {
    for event in events.drain() {
        write_event(stdout, &EventEnvelope::new(request_id, event.to_json()))?;
    }
    Ok(())
}

fn write_response(stdout: &mut dyn Write, response: &ResponseEnvelope) -> io::Result<()> {
    let encoded = serde_json::to_string(response)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    writeln!(stdout, "{encoded}")?;
    stdout.flush()
}

fn write_event(stdout: &mut dyn Write, event: &EventEnvelope) -> io::Result<()> {
    let encoded = serde_json::to_string(event)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    writeln!(stdout, "{encoded}")?;
    stdout.flush()
}
