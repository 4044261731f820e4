//! Pipe transport against a shell script.

use std::time::Duration;

use tunnel_autopilot::child::{
    spawn_transport, ChildCommand, ChildTransport, PipeTransport, SendOutcome, SpawnError,
    TransportKind,
};
use tunnel_autopilot::rules::Reaction;

const WAIT: Duration = Duration::from_secs(10);

fn sh(script: &str) -> ChildCommand {
    ChildCommand::new("/bin/sh").arg("-c").arg(script)
}

async fn next_cleaned(child: &mut dyn ChildTransport) -> Option<String> {
    tokio::time::timeout(WAIT, child.read_next_line())
        .await
        .expect("timed out waiting for output")
        .unwrap()
        .map(|line| line.cleaned().to_string())
}

#[tokio::test]
async fn merges_stderr_and_answers_prompt() {
    let mut child = PipeTransport::spawn(&sh(
        "echo first; echo 'from stderr' 1>&2; read answer; echo \"got $answer\"",
    ))
    .unwrap();

    let mut seen = Vec::new();
    while seen.len() < 2 {
        seen.push(next_cleaned(&mut child).await.unwrap());
    }
    seen.sort();
    assert_eq!(seen, vec!["first", "from stderr"]);

    let literal = Reaction::Literal("yes".to_string());
    assert_eq!(child.send_reaction(&literal).await.unwrap(), SendOutcome::Sent);
    assert_eq!(child.send_reaction(&Reaction::Enter).await.unwrap(), SendOutcome::Sent);

    assert_eq!(next_cleaned(&mut child).await.as_deref(), Some("got yes"));
    assert_eq!(next_cleaned(&mut child).await, None);
}

#[tokio::test]
async fn strips_colors_from_piped_output() {
    let mut child = PipeTransport::spawn(&sh("printf '\\033[31mred alert\\033[0m\\n'")).unwrap();

    let line = child.read_next_line().await.unwrap().unwrap();
    assert_eq!(line.cleaned(), "red alert");
    assert!(line.raw().contains('\x1b'));
}

#[tokio::test]
async fn arrows_are_not_written_to_pipes() {
    let mut child = PipeTransport::spawn(&sh("read answer; echo \"got $answer\"")).unwrap();

    assert_eq!(
        child.send_reaction(&Reaction::ArrowDown).await.unwrap(),
        SendOutcome::Unsupported
    );
    child.send_reaction(&Reaction::Enter).await.unwrap();

    assert_eq!(next_cleaned(&mut child).await.as_deref(), Some("got"));
}

#[tokio::test]
async fn terminate_stops_a_running_child() {
    let mut child = PipeTransport::spawn(&sh("sleep 30")).unwrap();
    assert!(child.id().is_some());

    child.terminate(Duration::from_secs(2)).await.unwrap();

    assert!(child.try_wait().unwrap().is_some());
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let command = ChildCommand::tunnel("/nonexistent/tunnel-client");
    let Err(err) = spawn_transport(TransportKind::Pipe, &command) else {
        panic!("spawn unexpectedly succeeded");
    };

    assert!(matches!(err, SpawnError::NotFound(_)));
}
