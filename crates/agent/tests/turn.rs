//! Full turns through the real tool set: registry, line protocol parser and
//! turn runner working together against a temporary workspace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use joi_agent::{TurnEvent, TurnRunner, TurnStatus};
use joi_config::ToolsConfig;
use joi_core::message::{Message, Role};
use joi_core::provider::{ModelAdapter, ResponseStream};
use joi_core::session::SessionStore;
use joi_providers::AdapterRouter;
use tokio::sync::mpsc;

// ── Scripted model ───────────────────────────────────────────────────────

/// Replies from a fixed script and remembers what it was shown.
struct Script {
    replies: Vec<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl Script {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_seen(&self) -> Vec<Message> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ModelAdapter for Script {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, messages: &[Message]) -> ResponseStream {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        let reply = self.replies.get(n).or(self.replies.last()).cloned().unwrap_or_default();

        let (tx, stream) = ResponseStream::channel();
        tokio::spawn(async move {
            for line in reply.split_inclusive('\n') {
                if tx.send(line.to_string()).await.is_err() {
                    break;
                }
            }
        });
        stream
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    workspace: std::path::PathBuf,
    runner: TurnRunner,
    store: SessionStore,
    script: Arc<Script>,
}

fn harness(replies: &[&str]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().join("ai_workspace");
    let tools = joi_tools::default_registry(&ToolsConfig {
        workspace_dir: Some(workspace.clone()),
        enable_app_launcher: false,
    });
    let prompt = joi_core::prompt::system_prompt(&tools);

    let script = Script::new(replies);
    let mut router = AdapterRouter::new("scripted");
    router.register(script.clone());

    Harness {
        _dir: dir,
        workspace,
        runner: TurnRunner::new(Arc::new(router), Arc::new(tools)).with_max_rounds(4),
        store: SessionStore::new(prompt, "scripted"),
        script,
    }
}

async fn run(h: &Harness, user: &str) -> (Vec<TurnEvent>, joi_agent::TurnOutcome, Vec<Message>) {
    let handle = h.store.get_or_create_default("web_1234abcd", None).await;
    let mut session = handle.lock().await;
    session.push_user(user, None);

    let (tx, mut rx) = mpsc::channel(256);
    let outcome = h.runner.run_turn(&mut session, &tx).await;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (events, outcome, session.messages().to_vec())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn write_then_read_back_a_note() {
    let h = harness(&[
        "I'll save that.\nTOOL_CALL::{\"tool\": \"fs_write\", \"args\": {\"relative_path\": \"notes/todo.txt\", \"content\": \"buy milk\"}}\n",
        "Let me check.\nTOOL_CALL::{\"tool\": \"fs_read\", \"args\": {\"relative_path\": \"notes/todo.txt\"}}\n",
        "Your note says: buy milk.",
    ]);

    let (events, outcome, history) = run(&h, "Remember to buy milk").await;

    assert_eq!(outcome.status, TurnStatus::Completed);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.tool_calls, 2);
    assert_eq!(
        std::fs::read_to_string(h.workspace.join("notes/todo.txt")).unwrap(),
        "buy milk"
    );

    let results: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::ToolResult(r) => Some(r.result.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![
            "Successfully wrote plain text content to workspace file 'notes/todo.txt'.",
            "Content of workspace file 'notes/todo.txt':\n\nbuy milk",
        ]
    );

    // system, user, (assistant, tool result) x2, assistant
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::ToolResult,
            Role::Assistant,
            Role::ToolResult,
            Role::Assistant,
        ]
    );
    assert!(history[5].content.starts_with("Fs_read tool execution result for "));
    assert!(history[5].content.ends_with("buy milk"));
    assert_eq!(history[6].content, "Your note says: buy milk.");

    // The model saw the second result before answering.
    let seen = h.script.last_seen();
    assert_eq!(seen.len(), 6);
    assert_eq!(seen[5].role, Role::ToolResult);
}

#[tokio::test]
async fn system_prompt_lists_the_tools() {
    let h = harness(&["Hello!"]);
    let (_, _, history) = run(&h, "hi").await;

    let prompt = &history[0].content;
    assert_eq!(history[0].role, Role::System);
    for name in ["sysinfo", "fs_list", "fs_read", "fs_write", "fs_mkdir", "fs_find"] {
        assert!(prompt.contains(name), "{name} missing from prompt");
    }
    assert!(prompt.contains("TOOL_CALL::"));
}

#[tokio::test]
async fn escape_attempts_are_tool_errors_not_faults() {
    let h = harness(&[
        "TOOL_CALL::{\"tool\": \"fs_read\", \"args\": {\"relative_path\": \"../../etc/passwd\"}}\n",
        "I can't read outside the workspace.",
    ]);

    let (events, outcome, history) = run(&h, "read /etc/passwd").await;
    assert_eq!(outcome.status, TurnStatus::Completed);

    let result = events
        .iter()
        .find_map(|e| match e {
            TurnEvent::ToolResult(r) => Some(r.result.clone()),
            _ => None,
        })
        .unwrap();
    assert!(result.starts_with("Error"), "unexpected result: {result}");
    assert!(!result.contains("root:"));
    assert_eq!(history.last().unwrap().content, "I can't read outside the workspace.");
}

#[tokio::test]
async fn several_calls_in_one_reply_run_in_order() {
    let h = harness(&[
        "Setting up.\n\
         TOOL_CALL::{\"tool\": \"fs_mkdir\", \"args\": {\"relative_path\": \"projects\"}}\n\
         TOOL_CALL::{\"tool\": \"fs_write\", \"args\": {\"relative_path\": \"projects/a.md\", \"content\": \"# A\"}}\n\
         TOOL_CALL::{\"tool\": \"fs_list\", \"args\": {\"relative_path\": \"projects\"}}\n",
        "Done.",
    ]);

    let (events, outcome, _) = run(&h, "make a project").await;
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.tool_calls, 3);

    let statuses: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::ToolStatus(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            "Executing tool call 1/3: fs_mkdir",
            "Executing tool call 2/3: fs_write",
            "Executing tool call 3/3: fs_list",
        ]
    );

    let listing = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::ToolResult(r) if r.tool == "fs_list" => Some(r.result.clone()),
            _ => None,
        })
        .next()
        .unwrap();
    assert!(listing.contains("a.md"));
    assert!(events.contains(&TurnEvent::Status("Processing tool call 1/4".into())));
}

#[tokio::test]
async fn looping_model_hits_the_round_limit() {
    let h = harness(&["TOOL_CALL::{\"tool\": \"fs_list\", \"args\": {\"relative_path\": \".\"}}\n"]);

    let (events, outcome, history) = run(&h, "list forever").await;

    assert_eq!(outcome.status, TurnStatus::RoundLimit);
    assert_eq!(outcome.rounds, 4);
    assert_eq!(
        events.last(),
        Some(&TurnEvent::Warning("Reached maximum consecutive tool calls limit (4)".into()))
    );
    // system + user + 4 x (assistant + result) + closing assistant
    assert_eq!(history.len(), 2 + 4 * 2 + 1);
    assert_eq!(history.last().unwrap().role, Role::Assistant);
}
