//! Integration tests for the `nfvo serve` HTTP API.
//!
//! Each test starts the server as a child process on its own port, makes
//! HTTP requests over a plain TcpStream, and checks the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::Value;

/// Base port is derived from the process id so separate test binaries
/// don't collide on the same range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 21000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// A running `nfvo serve`, killed on drop.
struct Server {
    port: u16,
    child: Child,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

fn start_server(bundles: &[&str]) -> Server {
    let port = next_port();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nfvo"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.args(["--quiet", "serve", "--port"])
        .arg(port.to_string())
        .args(["--config", "tests/fixtures/fast.toml"]);
    for b in bundles {
        cmd.arg(b);
    }
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn().expect("failed to start nfvo serve");
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server { port, child }
}

/// Send one request and return (status, headers, body).
fn request(port: u16, method: &str, path: &str, body: Option<&str>) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let request = match body {
        Some(body) => format!(
            "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            method, path, port, body.len(), body
        ),
        None => format!(
            "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nConnection: close\r\n\r\n",
            method, path, port
        ),
    };
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    parse_response(&response)
}

fn get(port: u16, path: &str) -> (u16, Value) {
    let (status, _, body) = request(port, "GET", path, None);
    (status, serde_json::from_str(&body).expect("JSON body"))
}

fn post(port: u16, path: &str, body: &str) -> (u16, Value) {
    let (status, _, body) = request(port, "POST", path, Some(body));
    (status, serde_json::from_str(&body).expect("JSON body"))
}

fn delete(port: u16, path: &str) -> (u16, Value) {
    let (status, _, body) = request(port, "DELETE", path, None);
    (status, serde_json::from_str(&body).expect("JSON body"))
}

fn parse_response(response: &str) -> (u16, String, String) {
    let (headers, body) = response.split_once("\r\n\r\n").unwrap_or((response, ""));
    let status = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    let body = if headers
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked")
    {
        decode_chunked(body)
    } else {
        body.to_string()
    };
    (status, headers.to_string(), body)
}

fn decode_chunked(mut data: &str) -> String {
    let mut result = String::new();
    while let Some((size, rest)) = data.split_once("\r\n") {
        let size = match usize::from_str_radix(size.trim(), 16) {
            Ok(0) | Err(_) => break,
            Ok(size) => size,
        };
        let size = size.min(rest.len());
        result.push_str(&rest[..size]);
        data = rest[size..].strip_prefix("\r\n").unwrap_or("");
    }
    result
}

/// Poll the opdata of `nsr_id` until its operational status is `state`.
fn wait_for_state(port: u16, nsr_id: &str, state: &str) -> Value {
    let path = format!("/ns-instance-opdata/{}", nsr_id);
    let mut last = Value::Null;
    for _ in 0..200 {
        let (status, body) = get(port, &path);
        if status == 200 && body["operational_status"] == state {
            return body;
        }
        last = body;
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("{} never reached {}; last opdata {}", nsr_id, state, last);
}

const PINGPONG: &str = "tests/fixtures/pingpong.json";

// ──────────────────────────────────────────────
// Basics
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let server = start_server(&[]);
    let (status, body) = get(server.port, "/health");
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body.get("version").is_some());
    assert_eq!(body["nsr_count"], 0);
}

#[test]
fn unknown_route_is_json_404() {
    let server = start_server(&[]);
    let (status, body) = get(server.port, "/nowhere");
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not found");
}

#[test]
fn cors_allows_any_origin() {
    let server = start_server(&[]);
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", server.port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let req = format!(
        "GET /health HTTP/1.1\r\nHost: localhost:{}\r\nOrigin: http://example.test\r\nConnection: close\r\n\r\n",
        server.port
    );
    std::io::Write::write_all(&mut stream, req.as_bytes()).unwrap();
    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    let (status, headers, _) = parse_response(&response);
    assert_eq!(status, 200);
    assert!(headers
        .to_ascii_lowercase()
        .contains("access-control-allow-origin: *"));
}

// ──────────────────────────────────────────────
// Catalog and instances
// ──────────────────────────────────────────────

#[test]
fn descriptors_and_instance_over_http() {
    let server = start_server(&[]);
    let port = server.port;

    let vnfd = r#"{"id": "echo", "name": "echo", "vdu": [{"id": "echo-vm", "name": "echo-vm", "image": "cirros"}]}"#;
    let (status, body) = post(port, "/vnfd", vnfd);
    assert_eq!(status, 201);
    assert_eq!(body["id"], "echo");

    let nsd = r#"{"id": "echo-nsd", "name": "echo", "constituent_vnfd": [{"member_vnf_index": 1, "vnfd_id_ref": "echo"}]}"#;
    let (status, _) = post(port, "/nsd", nsd);
    assert_eq!(status, 201);

    let config = r#"{"id": "echo-1", "name": "echo", "nsd_ref": "echo-nsd"}"#;
    let (status, body) = post(port, "/ns-instance-config", config);
    assert_eq!(status, 201);
    assert_eq!(body["id"], "echo-1");

    let opdata = wait_for_state(port, "echo-1", "running");
    assert_eq!(opdata["nsd_ref"], "echo-nsd");

    let (status, body) = get(port, "/ns-instance-config");
    assert_eq!(status, 200);
    assert_eq!(body["ns_instance_config"][0]["id"], "echo-1");

    // Referenced by the running NS.
    let (status, body) = delete(port, "/vnfd/echo");
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("in use"));

    let (status, body) = post(port, "/ns-instance-config", config);
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[test]
fn malformed_bodies_are_400() {
    let server = start_server(&[]);
    let (status, body) = post(server.port, "/vnfd", r#"{"name": "no id"}"#);
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("invalid vnfd"));

    let vnfd = r#"{"id": "echo", "name": "echo", "vdu": [{"id": "echo-vm", "name": "echo-vm", "image": "cirros"}]}"#;
    assert_eq!(post(server.port, "/vnfd", vnfd).0, 201);
    let (status, body) = post(
        server.port,
        "/nsd",
        r#"{"id": "n", "name": "n", "constituent_vnfd": [{"member_vnf_index": 1, "vnfd_id_ref": "ghost"}]}"#,
    );
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[test]
fn preloaded_bundle_runs_scales_and_terminates() {
    let server = start_server(&[PINGPONG]);
    let port = server.port;

    let opdata = wait_for_state(port, "pingpong-1", "running");
    assert_eq!(opdata["constituent_vnfr_ref"].as_array().unwrap().len(), 2);

    let (status, body) = get(port, "/ns-instance-opdata");
    assert_eq!(status, 200);
    assert_eq!(body["ns_instance_opdata"].as_array().unwrap().len(), 1);

    let (status, body) = post(
        port,
        "/ns-instance-config/pingpong-1/exec-scale-out",
        r#"{"scaling_group": "pong-group"}"#,
    );
    assert_eq!(status, 200, "{}", body);
    let instance_id = body["instance_id"].as_u64().unwrap();
    wait_for_state(port, "pingpong-1", "running");

    let (_, body) = get(port, "/vnfr-catalog");
    let vnfrs = body["vnfr_catalog"].as_array().unwrap();
    assert_eq!(vnfrs.len(), 3);
    assert!(vnfrs
        .iter()
        .any(|v| v["scaling_group_name"] == "pong-group"));

    let (status, body) = post(
        port,
        "/ns-instance-config/pingpong-1/exec-scale-in",
        &format!(
            r#"{{"scaling_group": "pong-group", "instance_id": {}}}"#,
            instance_id
        ),
    );
    assert_eq!(status, 200, "{}", body);
    wait_for_state(port, "pingpong-1", "running");

    let (status, body) = delete(port, "/ns-instance-config/pingpong-1");
    assert_eq!(status, 200);
    assert_eq!(body["operational_status"], "terminated");

    let (status, _) = delete(port, "/ns-instance-config/pingpong-1");
    assert_eq!(status, 404);
}

#[test]
fn scaling_errors_map_to_status_codes() {
    let server = start_server(&[PINGPONG]);
    let port = server.port;
    wait_for_state(port, "pingpong-1", "running");

    let (status, _) = post(
        port,
        "/ns-instance-config/nope/exec-scale-out",
        r#"{"scaling_group": "pong-group"}"#,
    );
    assert_eq!(status, 404);

    let (status, body) = post(
        port,
        "/ns-instance-config/pingpong-1/exec-scale-in",
        r#"{"scaling_group": "pong-group", "instance_id": 42}"#,
    );
    assert_eq!(status, 409, "{}", body);

    let (status, _) = post(
        port,
        "/ns-instance-config/pingpong-1/exec-scale-out",
        r#"{"group": "pong-group"}"#,
    );
    assert_eq!(status, 400);
}

#[test]
fn opdata_and_console_for_unknown_ids() {
    let server = start_server(&[]);
    let (status, body) = get(server.port, "/ns-instance-opdata/ghost");
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let (status, body) = get(server.port, "/vdur/ghost/console");
    assert_eq!(status, 200);
    assert_eq!(body["console_url"], "none");
}
