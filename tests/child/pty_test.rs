//! Pseudo-terminal transport against a shell script.

use std::time::Duration;

use tunnel_autopilot::child::{spawn_transport, ChildCommand, ChildTransport, TransportKind};
use tunnel_autopilot::output::OutputLine;
use tunnel_autopilot::rules::Reaction;

const WAIT: Duration = Duration::from_secs(10);

fn sh(script: &str) -> ChildCommand {
    ChildCommand::new("/bin/sh").arg("-c").arg(script)
}

/// Read lines until one contains `needle`, returning it.
async fn wait_for(child: &mut dyn ChildTransport, needle: &str) -> String {
    let search = async {
        loop {
            match child.read_next_line().await.unwrap() {
                Some(line) if line.cleaned().contains(needle) => {
                    return line.cleaned().to_string();
                }
                Some(_) => {}
                None => panic!("output ended before {needle:?}"),
            }
        }
    };
    tokio::time::timeout(WAIT, search)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}"))
}

#[tokio::test]
async fn prompt_without_newline_is_seen_and_answered() {
    let mut child = spawn_transport(
        TransportKind::Pty,
        &sh("printf '\\033[1mName?\\033[0m '; read answer; echo \"hello $answer\""),
    )
    .unwrap();

    assert_eq!(wait_for(child.as_mut(), "Name?").await, "Name?");

    child
        .send_reaction(&Reaction::Literal("bob".to_string()))
        .await
        .unwrap();
    child.send_reaction(&Reaction::Enter).await.unwrap();

    assert_eq!(wait_for(child.as_mut(), "hello").await, "hello bob");
}

async fn next_line(child: &mut dyn ChildTransport) -> OutputLine {
    tokio::time::timeout(WAIT, child.read_next_line())
        .await
        .expect("timed out waiting for a line")
        .unwrap()
        .expect("output ended early")
}

#[tokio::test]
async fn line_written_in_pieces_is_completed_with_its_fragment() {
    let mut child = spawn_transport(
        TransportKind::Pty,
        &sh("printf 'Please login with code'; sleep 0.3; printf ' ABC-123\\n'"),
    )
    .unwrap();

    let fragment = next_line(child.as_mut()).await;
    assert_eq!(fragment.cleaned(), "Please login with code");
    assert!(fragment.is_fragment());

    let line = next_line(child.as_mut()).await;
    assert_eq!(line.cleaned(), "Please login with code ABC-123");
    assert!(line.is_continuation());
    assert!(!line.is_fragment());
}

#[tokio::test]
async fn output_ends_when_child_exits() {
    let mut child = spawn_transport(TransportKind::Pty, &sh("echo done")).unwrap();

    assert_eq!(wait_for(child.as_mut(), "done").await, "done");

    let rest = tokio::time::timeout(WAIT, async {
        while child.read_next_line().await.unwrap().is_some() {}
    })
    .await;
    assert!(rest.is_ok(), "output never ended");
}

#[tokio::test]
async fn terminate_stops_a_silent_child() {
    let mut child = spawn_transport(TransportKind::Pty, &sh("sleep 30")).unwrap();
    assert!(child.id().is_some());

    tokio::time::timeout(WAIT, child.terminate(Duration::from_secs(2)))
        .await
        .expect("terminate hung")
        .unwrap();
}
