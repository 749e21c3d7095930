//! End-to-end tests that re-execute this test binary
//!
//! Runs without the libtest harness: every worker is a fresh copy of this
//! binary, and `main` has to hand it to the startup hook before anything else.

use nix::sys::signal::{Signal, kill};
use reexec_rs::{
    ActiveMessage, BOOTSTRAP_VAR, Catalog, EXIT_DECODE_FAILURE, ExecError, FailureKind,
    NewProcessExecutor, ProcessRegistry, Work, bootstrap, connect_promise, listen,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Serialize, Deserialize)]
struct Answer;

impl Work for Answer {
    const TAG: &'static str = "answer";
    type Output = i32;
    type Error = Infallible;

    fn run(self) -> Result<i32, Infallible> {
        Ok(13)
    }
}

#[derive(Serialize, Deserialize)]
struct Echo {
    text: String,
}

impl Work for Echo {
    const TAG: &'static str = "echo";
    type Output = String;
    type Error = Infallible;

    fn run(self) -> Result<String, Infallible> {
        Ok(self.text)
    }
}

#[derive(Serialize, Deserialize)]
struct Fail {
    message: String,
}

impl Work for Fail {
    const TAG: &'static str = "fail";
    type Output = i32;
    type Error = String;

    fn run(self) -> Result<i32, String> {
        Err(self.message)
    }
}

#[derive(Serialize, Deserialize)]
struct Explode {
    message: String,
}

impl Work for Explode {
    const TAG: &'static str = "explode";
    type Output = i32;
    type Error = Infallible;

    fn run(self) -> Result<i32, Infallible> {
        panic!("{}", self.message)
    }
}

/// Exits without ever writing an outcome
#[derive(Serialize, Deserialize)]
struct Vanish;

impl Work for Vanish {
    const TAG: &'static str = "vanish";
    type Output = i32;
    type Error = Infallible;

    fn run(self) -> Result<i32, Infallible> {
        std::process::exit(3)
    }
}

#[derive(Serialize, Deserialize)]
struct Sleep {
    millis: u64,
}

impl Work for Sleep {
    const TAG: &'static str = "sleep";
    type Output = ();
    type Error = Infallible;

    fn run(self) -> Result<(), Infallible> {
        thread::sleep(Duration::from_millis(self.millis));
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct TouchFile {
    path: PathBuf,
}

impl Work for TouchFile {
    const TAG: &'static str = "touch_file";
    type Output = ();
    type Error = std::io::Error;

    fn run(self) -> Result<(), std::io::Error> {
        std::fs::write(&self.path, std::process::id().to_string())
    }
}

#[derive(Serialize, Deserialize)]
struct ReadVar {
    key: String,
}

impl Work for ReadVar {
    const TAG: &'static str = "read_var";
    type Output = Option<String>;
    type Error = Infallible;

    fn run(self) -> Result<Option<String>, Infallible> {
        Ok(std::env::var(&self.key).ok())
    }
}

#[derive(Serialize, Deserialize)]
struct Dial {
    port: u16,
    value: i32,
}

impl Work for Dial {
    const TAG: &'static str = "dial";
    type Output = ();
    type Error = ExecError;

    fn run(self) -> Result<(), ExecError> {
        connect_promise::<i32>(("127.0.0.1", self.port))?.set_value(self.value)?;
        Ok(())
    }
}

/// Starts a helper process and leaves it running past the worker's exit
#[derive(Serialize, Deserialize)]
struct Detach {
    seconds: u32,
}

impl Work for Detach {
    const TAG: &'static str = "detach";
    type Output = i32;
    type Error = std::io::Error;

    fn run(self) -> Result<i32, std::io::Error> {
        Command::new("sleep")
            .arg(self.seconds.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(13)
    }
}

/// Never registered in the worker catalog
#[derive(Serialize, Deserialize)]
struct Unregistered;

impl Work for Unregistered {
    const TAG: &'static str = "unregistered";
    type Output = i32;
    type Error = Infallible;

    fn run(self) -> Result<i32, Infallible> {
        Ok(0)
    }
}

fn catalog() -> Catalog {
    Catalog::new()
        .register::<Answer>()
        .register::<Echo>()
        .register::<Fail>()
        .register::<Explode>()
        .register::<Vanish>()
        .register::<Sleep>()
        .register::<TouchFile>()
        .register::<ReadVar>()
        .register::<Dial>()
        .register::<Detach>()
}

/// Run this binary as a worker for `record`, outside any registry
fn run_worker_record(record: &str) -> Output {
    let exe = std::env::current_exe().unwrap();
    Command::new(exe)
        .env(BOOTSTRAP_VAR, record)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .unwrap()
}

fn two_way_returns_value() {
    let registry = ProcessRegistry::new();
    let future = registry.twoway_execute(Answer).unwrap();
    assert_eq!(future.get().unwrap(), 13);
    registry.wait().unwrap();
}

fn two_way_carries_owned_state() {
    let registry = ProcessRegistry::new();
    let text = "spaces, \"quotes\", newline\nand unicode ✓".to_string();
    let future = registry.twoway_execute(Echo { text: text.clone() }).unwrap();
    assert_eq!(future.get().unwrap(), text);
}

fn error_value_becomes_remote_failure() {
    let registry = ProcessRegistry::new();
    let future = registry
        .twoway_execute(Fail {
            message: "boom".to_string(),
        })
        .unwrap();
    let origin = future.origin().unwrap();

    let err = future.get().err().unwrap();
    let exception = err.remote().unwrap();
    assert_eq!(exception.kind, FailureKind::Error);
    assert_eq!(exception.description, "boom");
    assert_eq!(exception.pid, origin.as_raw() as u32);
}

fn panic_becomes_remote_failure() {
    let registry = ProcessRegistry::new();
    let future = registry
        .twoway_execute(Explode {
            message: "kaboom".to_string(),
        })
        .unwrap();

    let err = future.get().err().unwrap();
    let exception = err.remote().unwrap();
    assert_eq!(exception.kind, FailureKind::Panic);
    assert!(exception.description.contains("kaboom"));
}

fn silent_exit_closes_channel() {
    let registry = ProcessRegistry::new();
    let err = registry.twoway_execute(Vanish).unwrap().get().err().unwrap();
    assert!(err.is_channel_closed());
}

fn killed_worker_closes_channel() {
    let registry = ProcessRegistry::new();
    let future = registry.twoway_execute(Sleep { millis: 30_000 }).unwrap();
    kill(future.origin().unwrap(), Signal::SIGKILL).unwrap();

    let err = future.get().err().unwrap();
    assert!(matches!(err, ExecError::ChannelClosed));
    registry.wait().unwrap();
}

fn reply_pipe_reaches_only_its_worker() {
    let registry = ProcessRegistry::new();
    let quick = registry.twoway_execute(Vanish).unwrap();
    let slow = registry.twoway_execute(Sleep { millis: 30_000 }).unwrap();

    // A leaked write end in the slow worker would hold this open for 30s.
    let started = Instant::now();
    assert!(quick.get().err().unwrap().is_channel_closed());
    assert!(started.elapsed() < Duration::from_secs(10));

    kill(slow.origin().unwrap(), Signal::SIGKILL).unwrap();
    assert!(slow.get().err().unwrap().is_channel_closed());
}

fn worker_children_do_not_hold_reply_pipe() {
    let registry = ProcessRegistry::new();
    let future = registry.twoway_execute(Detach { seconds: 10 }).unwrap();

    // The helper outlives the worker; the future must not wait for it.
    let started = Instant::now();
    assert_eq!(future.get().unwrap(), 13);
    assert!(started.elapsed() < Duration::from_secs(5));
    registry.wait().unwrap();
}

fn garbage_record_exits_with_decode_failure() {
    let output = run_worker_record("garbage");
    assert_eq!(output.status.code(), Some(EXIT_DECODE_FAILURE));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Decode error"), "stderr: {}", stderr);
}

fn unknown_tag_exits_with_decode_failure() {
    let record = ActiveMessage::new(&Unregistered)
        .unwrap()
        .to_text()
        .unwrap();
    let output = run_worker_record(&record);
    assert_eq!(output.status.code(), Some(EXIT_DECODE_FAILURE));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown work tag: unregistered"),
        "stderr: {}",
        stderr
    );
}

fn two_way_unknown_tag_is_reported() {
    let registry = ProcessRegistry::new();
    let err = registry
        .twoway_execute(Unregistered)
        .unwrap()
        .get()
        .err()
        .unwrap();

    let exception = err.remote().unwrap();
    assert_eq!(exception.kind, FailureKind::Error);
    assert!(exception.description.contains("unknown work 'unregistered'"));
}

fn one_way_failure_reaches_stderr() {
    let record = ActiveMessage::new(&Fail {
        message: "lost in the void".to_string(),
    })
    .unwrap()
    .to_text()
    .unwrap();
    let output = run_worker_record(&record);
    assert_eq!(output.status.code(), Some(0));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("lost in the void"), "stderr: {}", stderr);
}

fn one_way_fanout_then_wait() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ProcessRegistry::new();

    let markers: Vec<PathBuf> = (0..10)
        .map(|i| dir.path().join(format!("worker-{}", i)))
        .collect();
    let pids: Vec<_> = markers
        .iter()
        .map(|path| registry.execute(TouchFile { path: path.clone() }).unwrap())
        .collect();
    assert_eq!(registry.tracked(), pids);

    registry.wait().unwrap();
    assert!(registry.is_empty());

    for (path, pid) in markers.iter().zip(&pids) {
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, pid.as_raw().to_string());
    }
}

fn environment_overrides_reach_worker() {
    let registry = ProcessRegistry::builder()
        .env("REEXEC_TEST_MARKER", "42")
        .build();
    let future = registry
        .twoway_execute(ReadVar {
            key: "REEXEC_TEST_MARKER".to_string(),
        })
        .unwrap();
    assert_eq!(future.get().unwrap(), Some("42".to_string()));

    let future = registry
        .twoway_execute(ReadVar {
            key: BOOTSTRAP_VAR.to_string(),
        })
        .unwrap();
    assert!(future.get().unwrap().is_some());
}

fn concurrent_two_way_calls() {
    let executor = NewProcessExecutor::new(Arc::new(ProcessRegistry::new()));

    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let executor = executor.clone();
                scope.spawn(move || {
                    executor
                        .twoway_execute(Echo {
                            text: format!("worker {}", i),
                        })
                        .unwrap()
                        .get()
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected: Vec<String> = (0..8).map(|i| format!("worker {}", i)).collect();
    assert_eq!(results, expected);
    assert_eq!(executor.registry().len(), 8);
    executor.wait().unwrap();
}

fn promise_over_socket() {
    let listener = listen("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let registry = ProcessRegistry::new();
    registry.execute(Dial { port, value: 42 }).unwrap();

    let future = listener.accept_future::<i32>().unwrap();
    assert_eq!(future.get().unwrap(), 42);
    registry.wait().unwrap();
}

fn main() {
    bootstrap(&catalog());

    let tests: &[(&str, fn())] = &[
        ("two_way_returns_value", two_way_returns_value),
        ("two_way_carries_owned_state", two_way_carries_owned_state),
        (
            "error_value_becomes_remote_failure",
            error_value_becomes_remote_failure,
        ),
        ("panic_becomes_remote_failure", panic_becomes_remote_failure),
        ("silent_exit_closes_channel", silent_exit_closes_channel),
        ("killed_worker_closes_channel", killed_worker_closes_channel),
        (
            "reply_pipe_reaches_only_its_worker",
            reply_pipe_reaches_only_its_worker,
        ),
        (
            "worker_children_do_not_hold_reply_pipe",
            worker_children_do_not_hold_reply_pipe,
        ),
        (
            "garbage_record_exits_with_decode_failure",
            garbage_record_exits_with_decode_failure,
        ),
        (
            "unknown_tag_exits_with_decode_failure",
            unknown_tag_exits_with_decode_failure,
        ),
        ("two_way_unknown_tag_is_reported", two_way_unknown_tag_is_reported),
        ("one_way_failure_reaches_stderr", one_way_failure_reaches_stderr),
        ("one_way_fanout_then_wait", one_way_fanout_then_wait),
        (
            "environment_overrides_reach_worker",
            environment_overrides_reach_worker,
        ),
        ("concurrent_two_way_calls", concurrent_two_way_calls),
        ("promise_over_socket", promise_over_socket),
    ];

    println!("\nrunning {} tests", tests.len());
    for (name, test) in tests {
        print!("test {} ... ", name);
        test();
        println!("ok");
    }
    println!("\ntest result: ok. {} passed\n", tests.len());
}
