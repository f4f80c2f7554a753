//! Signal handling for graceful shutdown. Runs in its own test binary since
//! it signals the current process.
#![cfg(unix)]

use actioner::shutdown::{ShutdownSignal, ShutdownSignals};
use std::process::Command;
use std::time::Duration;

fn send(signal: &str) {
    let status = Command::new("kill")
        .args([format!("-{signal}"), std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_quit_and_terminate_request_shutdown() {
    let mut signals = ShutdownSignals::install().unwrap();

    send("QUIT");
    let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .unwrap();
    assert_eq!(received, ShutdownSignal::Quit);
    assert_eq!(received.to_string(), "SIGQUIT");

    send("TERM");
    let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .unwrap();
    assert_eq!(received, ShutdownSignal::Terminate);
}
