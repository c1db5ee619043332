use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

struct BridgeHarness {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    _config_dir: std::path::PathBuf,
}

impl BridgeHarness {
    fn spawn(name: &str) -> Self {
        let bridge_path = resolve_bridge_path();

        // Point the bridge at a config file that does not exist so the
        // user's own settings never leak into a test run.
        let config_dir = std::env::temp_dir().join(format!(
            "form-coach-bridge-{name}-{}",
            std::process::id()
        ));
        let config_path = config_dir.join("coach_config.json");

        let mut child = Command::new(bridge_path)
            .env("FORM_COACH_CONFIG", &config_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn bridge process");

        let stdin = child.stdin.take().expect("missing child stdin");
        let stdout = child.stdout.take().expect("missing child stdout");

        Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            _config_dir: config_dir,
        }
    }

    /// Send one request; returns the events emitted for it and its response.
    fn request(&mut self, payload: Value) -> (Vec<Value>, Value) {
        let encoded = serde_json::to_string(&payload).expect("request should serialize");
        writeln!(self.stdin, "{encoded}").expect("failed to write request");
        self.stdin.flush().expect("failed to flush request");

        let mut events = Vec::new();
        loop {
            let mut line = String::new();
            let bytes_read = self
                .stdout
                .read_line(&mut line)
                .expect("failed to read response");
            assert!(bytes_read > 0, "bridge closed stdout unexpectedly");

            let message: Value =
                serde_json::from_str(line.trim()).expect("output should be valid json");
            match message.get("type").and_then(Value::as_str) {
                Some("event") => events.push(message),
                Some("response") => return (events, message),
                other => panic!("unexpected message type {other:?}: {message}"),
            }
        }
    }

    fn call(&mut self, id: &str, method: &str, params: Value) -> (Vec<Value>, Value) {
        let (events, response) = self.request(json!({
            "type": "request",
            "id": id,
            "method": method,
            "params": params
        }));
        assert_eq!(
            response.get("id").and_then(Value::as_str),
            Some(id),
            "unexpected response id: {response}"
        );
        (events, response)
    }

    fn rpc_ok(&mut self, id: &str, method: &str, params: Value) -> Value {
        let (_, response) = self.call(id, method, params);
        assert_eq!(
            response.get("ok").and_then(Value::as_bool),
            Some(true),
            "expected successful response: {response}"
        );
        response
    }

    fn rpc_err(&mut self, id: &str, method: &str, params: Value) -> Value {
        let (_, response) = self.call(id, method, params);
        assert_eq!(
            response.get("ok").and_then(Value::as_bool),
            Some(false),
            "expected error response: {response}"
        );
        response
    }

    fn shutdown(mut self) {
        let _ = self.request(json!({
            "type": "request",
            "id": "shutdown",
            "method": "runtime.shutdown",
            "params": {}
        }));

        let status = self.child.wait().expect("failed to wait for bridge");
        assert!(status.success(), "bridge exited with status: {status}");
    }
}

fn resolve_bridge_path() -> String {
    if let Some(path) = option_env!("CARGO_BIN_EXE_form-coach-bridge") {
        return path.to_string();
    }
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_form-coach-bridge") {
        return path;
    }
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_form_coach_bridge") {
        return path;
    }

    let test_bin = std::env::current_exe().expect("failed to resolve current test executable");
    let target_debug_dir = test_bin
        .parent()
        .and_then(|p| p.parent())
        .expect("failed to resolve target/debug directory");

    let bridge_path = target_debug_dir.join("form-coach-bridge");
    if bridge_path.exists() {
        return bridge_path.to_string_lossy().to_string();
    }

    let bridge_path_exe = target_debug_dir.join("form-coach-bridge.exe");
    if bridge_path_exe.exists() {
        return bridge_path_exe.to_string_lossy().to_string();
    }

    panic!(
        "could not locate bridge binary; checked env vars and {}",
        bridge_path.display()
    );
}

/// 33 pose landmarks with the left arm bent to `elbow` degrees.
/// Left shoulder/elbow/wrist sit at indices 11/13/15.
fn landmarks_with_elbow(elbow: f64) -> Value {
    let mut points = vec![[0.5, 0.5]; 33];
    let r = elbow.to_radians();
    points[11] = [0.5, 0.2];
    points[13] = [0.5, 0.4];
    points[15] = [0.5 + 0.2 * r.sin(), 0.4 - 0.2 * r.cos()];
    // hip, knee, ankle
    points[23] = [0.5, 0.6];
    points[25] = [0.5, 0.8];
    points[27] = [0.5, 1.0];
    json!(points)
}

#[test]
fn runtime_hello_advertises_session_methods() {
    let mut bridge = BridgeHarness::spawn("hello");

    let response = bridge.rpc_ok("1", "runtime.hello", json!({}));
    let methods = response["result"]["methods"]
        .as_array()
        .expect("runtime.hello should include methods array");
    for method in ["session.start", "session.frame", "session.stop"] {
        assert!(
            methods.iter().any(|v| v.as_str() == Some(method)),
            "runtime.hello methods should advertise {method}: {methods:?}"
        );
    }
    assert_eq!(response["result"]["config"]["notify_interval_ms"], 3000);

    bridge.shutdown();
}

#[test]
fn exercises_list_covers_every_exercise() {
    let mut bridge = BridgeHarness::spawn("list");

    let response = bridge.rpc_ok("1", "exercises.list", json!({}));
    let exercises = response["result"]["exercises"]
        .as_array()
        .expect("exercises.list should include an array");
    assert_eq!(exercises.len(), 9);

    let plank = exercises
        .iter()
        .find(|e| e["id"] == "plank")
        .expect("plank should be listed");
    assert_eq!(plank["counts_reps"], false);

    bridge.shutdown();
}

#[test]
fn bicep_curl_session_counts_a_rep_over_landmark_frames() {
    let mut bridge = BridgeHarness::spawn("curl");

    let (events, _) = bridge.call(
        "start",
        "session.start",
        json!({"exercise": "bicep_curl", "voice": false}),
    );
    assert!(events
        .iter()
        .any(|e| e["event"]["event"] == "session_started"));

    let mut rep_counts = Vec::new();
    for (i, elbow) in [170.0, 100.0, 35.0, 100.0, 170.0].into_iter().enumerate() {
        let response = bridge.rpc_ok(
            &format!("f{i}"),
            "session.frame",
            json!({
                "landmarks": landmarks_with_elbow(elbow),
                "timestamp_ms": i as u64 * 100,
            }),
        );
        rep_counts.push(response["result"]["rep_count"].as_u64().unwrap());
    }
    assert_eq!(rep_counts, vec![0, 0, 1, 1, 1]);

    let status = bridge.rpc_ok("status", "session.status", json!({}));
    assert_eq!(status["result"]["running"], true);
    assert_eq!(status["result"]["frames"], 5);

    let stop = bridge.rpc_ok("stop", "session.stop", json!({}));
    assert_eq!(stop["result"]["summary"]["rep_count"], 1);
    assert_eq!(stop["result"]["summary"]["reason"], "stopped");

    let response = bridge.rpc_err("late", "session.frame", json!({}));
    assert_eq!(response["error"]["code"], "SESSION_NOT_RUNNING");

    bridge.shutdown();
}

#[test]
fn frame_without_body_asks_user_to_stay_in_frame() {
    let mut bridge = BridgeHarness::spawn("nobody");

    bridge.rpc_ok(
        "start",
        "session.start",
        json!({"exercise": "squat", "voice": false}),
    );
    let response = bridge.rpc_ok("f0", "session.frame", json!({}));
    assert_eq!(response["result"]["message"], "Stay in frame.");
    assert_eq!(response["result"]["severity"], "neutral");
    assert_eq!(response["result"]["body_detected"], false);

    bridge.shutdown();
}

#[test]
fn unknown_method_and_exercise_are_reported() {
    let mut bridge = BridgeHarness::spawn("errors");

    let response = bridge.rpc_err("1", "session.pause", json!({}));
    assert_eq!(response["error"]["code"], "METHOD_NOT_FOUND");

    let response = bridge.rpc_err("2", "session.start", json!({"exercise": "burpee"}));
    assert_eq!(response["error"]["code"], "UNKNOWN_EXERCISE");

    let (_, response) = bridge.request(json!("not an object"));
    assert_eq!(response["ok"], false);

    bridge.shutdown();
}

#[test]
fn shutdown_reports_the_session_it_closes() {
    let mut bridge = BridgeHarness::spawn("shutdown");

    bridge.rpc_ok(
        "start",
        "session.start",
        json!({"exercise": "plank", "voice": false}),
    );
    let (events, response) = bridge.call("bye", "runtime.shutdown", json!({}));
    assert_eq!(response["result"]["summary"]["reason"], "stopped");
    assert!(
        events
            .iter()
            .any(|e| e["id"] == "bye" && e["event"]["event"] == "session_stopped"),
        "session_stopped should precede the shutdown reply: {events:?}"
    );

    let status = bridge.child.wait().expect("failed to wait for bridge");
    assert!(status.success(), "bridge exited with status: {status}");
}
