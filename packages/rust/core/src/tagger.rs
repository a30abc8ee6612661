//! Part-of-speech and named-entity tagging.
//!
//! [`Tagger`] is the capability the labeler needs. [`BridgeTagger`] is the
//! production implementation: two long-lived tagger subprocesses (POS and
//! NER) driven over a JSON-lines stdin/stdout protocol.
//!
//! ```text
//! child  → {"type":"ready"}
//! parent → {"type":"tag","id":"req-1","tokens":["Jane","Doe"]}
//! child  → {"type":"result","id":"req-1","tags":[["Jane","NNP"],["Doe","NNP"]]}
//!        | {"type":"error","id":"req-1","error":"..."}
//! parent → {"type":"shutdown"}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use pressfeat_shared::{PressfeatError, Result, TaggerCommand};

/// Tags an ordered token sequence. Implementations return one tag per token,
/// in input order.
pub trait Tagger: Send + Sync {
    fn pos_tags(&self, tokens: &[String]) -> Result<Vec<String>>;
    fn ner_tags(&self, tokens: &[String]) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to a tagger process.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type")]
enum RequestMessage<'a> {
    #[serde(rename = "tag")]
    Tag { id: String, tokens: &'a [String] },
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response message received from a tagger process.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type")]
enum ResponseMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "result")]
    Result {
        id: String,
        /// `(word, tag)` pairs.
        tags: Vec<(String, String)>,
    },
    #[serde(rename = "error")]
    Error {
        #[allow(dead_code)]
        id: String,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Tagger process
// ---------------------------------------------------------------------------

/// Handle to one spawned tagger subprocess.
struct TaggerProcess {
    name: &'static str,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
}

impl TaggerProcess {
    /// Spawn the process and wait for its ready message.
    fn spawn(name: &'static str, cmd: &TaggerCommand) -> Result<Self> {
        info!(tagger = name, cmd = %cmd.command, args = ?cmd.args, "spawning tagger");

        let mut command = Command::new(&cmd.command);
        command
            .args(&cmd.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()); // Tagger logs go to parent stderr
        if let Some(dir) = &cmd.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            PressfeatError::Tagger(format!(
                "failed to spawn {name} tagger: {e}. Is `{}` installed?",
                cmd.command
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            PressfeatError::Tagger(format!("failed to capture {name} tagger stdin"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            PressfeatError::Tagger(format!("failed to capture {name} tagger stdout"))
        })?;

        let mut process = Self {
            name,
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
        };
        process.wait_for_ready()?;
        Ok(process)
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        self.reader.read_line(&mut line).map_err(|e| {
            PressfeatError::Tagger(format!("{} tagger read error: {e}", self.name))
        })?;

        if line.is_empty() {
            return Err(PressfeatError::Tagger(format!(
                "{} tagger closed stdout unexpectedly",
                self.name
            )));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            let excerpt: String = line.trim_end().chars().take(200).collect();
            PressfeatError::Tagger(format!(
                "invalid {} tagger message: {e} (got: {excerpt})",
                self.name
            ))
        })
    }

    fn wait_for_ready(&mut self) -> Result<()> {
        match self.read_message()? {
            ResponseMessage::Ready => {
                info!(tagger = self.name, "tagger is ready");
                Ok(())
            }
            other => Err(PressfeatError::Tagger(format!(
                "expected ready message from {} tagger, got: {other:?}",
                self.name
            ))),
        }
    }

    /// Tag `tokens`, returning the tag column of the response.
    fn tag(&mut self, tokens: &[String]) -> Result<Vec<String>> {
        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        let request = RequestMessage::Tag {
            id: id.clone(),
            tokens,
        };
        let json = serde_json::to_string(&request).map_err(|e| {
            PressfeatError::Tagger(format!("failed to serialize request: {e}"))
        })?;

        writeln!(self.stdin, "{json}").map_err(|e| {
            PressfeatError::Tagger(format!("failed to write to {} tagger stdin: {e}", self.name))
        })?;
        self.stdin.flush().map_err(|e| {
            PressfeatError::Tagger(format!("failed to flush {} tagger stdin: {e}", self.name))
        })?;

        match self.read_message()? {
            ResponseMessage::Result { id: resp_id, tags } => {
                if resp_id != id {
                    return Err(PressfeatError::Tagger(format!(
                        "{} tagger answered {resp_id} while {id} was pending",
                        self.name
                    )));
                }
                debug!(tagger = self.name, %id, tokens = tokens.len(), tags = tags.len(), "tagged");
                Ok(tags.into_iter().map(|(_, tag)| tag).collect())
            }
            ResponseMessage::Error { error, .. } => Err(PressfeatError::TaggerRejected {
                tagger: self.name,
                message: error,
            }),
            ResponseMessage::Ready => Err(PressfeatError::Tagger(format!(
                "unexpected ready message from {} tagger",
                self.name
            ))),
        }
    }

    /// Send shutdown and wait for the process to exit.
    fn shutdown(&mut self) {
        if let Ok(json) = serde_json::to_string(&RequestMessage::Shutdown) {
            let _ = writeln!(self.stdin, "{json}");
            let _ = self.stdin.flush();
        }

        match self.child.wait() {
            Ok(status) => info!(tagger = self.name, ?status, "tagger exited"),
            Err(e) => warn!(tagger = self.name, "tagger wait error: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeTagger
// ---------------------------------------------------------------------------

/// [`Tagger`] backed by one POS and one NER subprocess, started once and
/// reused for every document of a pass.
pub struct BridgeTagger {
    pos: Mutex<TaggerProcess>,
    ner: Mutex<TaggerProcess>,
}

impl BridgeTagger {
    /// Spawn both taggers and wait until each reports ready.
    pub fn spawn(pos: &TaggerCommand, ner: &TaggerCommand) -> Result<Self> {
        let mut pos = TaggerProcess::spawn("pos", pos)?;
        let ner = match TaggerProcess::spawn("ner", ner) {
            Ok(ner) => ner,
            Err(e) => {
                pos.shutdown();
                return Err(e);
            }
        };
        Ok(Self {
            pos: Mutex::new(pos),
            ner: Mutex::new(ner),
        })
    }

    /// Ask both taggers to exit and wait for them.
    pub fn shutdown(self) {
        for process in [self.pos, self.ner] {
            match process.into_inner() {
                Ok(mut p) => p.shutdown(),
                Err(poisoned) => poisoned.into_inner().shutdown(),
            }
        }
    }
}

fn with_process(
    process: &Mutex<TaggerProcess>,
    tokens: &[String],
) -> Result<Vec<String>> {
    let mut guard = process
        .lock()
        .map_err(|_| PressfeatError::Tagger("tagger lock poisoned".into()))?;
    guard.tag(tokens)
}

impl Tagger for BridgeTagger {
    fn pos_tags(&self, tokens: &[String]) -> Result<Vec<String>> {
        with_process(&self.pos, tokens)
    }

    fn ner_tags(&self, tokens: &[String]) -> Result<Vec<String>> {
        with_process(&self.ner, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_request_serializes_correctly() {
        let tokens = vec!["Jane".to_string(), "Doe".to_string()];
        let msg = RequestMessage::Tag {
            id: "req-1".into(),
            tokens: &tokens,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"tag","id":"req-1","tokens":["Jane","Doe"]}"#);
    }

    #[test]
    fn shutdown_message_serializes_correctly() {
        let json = serde_json::to_string(&RequestMessage::Shutdown).unwrap();
        assert_eq!(json, r#"{"type":"shutdown"}"#);
    }

    #[test]
    fn response_message_deserializes_result() {
        let json = r#"{"type":"result","id":"req-3","tags":[["Jane","NNP"],["Doe","NNP"]]}"#;
        match serde_json::from_str::<ResponseMessage>(json).unwrap() {
            ResponseMessage::Result { id, tags } => {
                assert_eq!(id, "req-3");
                assert_eq!(tags[1], ("Doe".to_string(), "NNP".to_string()));
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn response_message_deserializes_error() {
        let json = r#"{"type":"error","id":"req-2","error":"model not loaded"}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ResponseMessage::Error { error, .. } if error == "model not loaded"));
    }

    #[test]
    fn spawn_missing_command_fails() {
        let cmd = TaggerCommand {
            command: "pressfeat-no-such-tagger-binary".into(),
            args: vec![],
            working_dir: None,
        };
        let err = TaggerProcess::spawn("pos", &cmd).err().expect("spawn should fail");
        assert!(matches!(err, PressfeatError::Tagger(_)));
    }

    fn sh(script: &str) -> TaggerCommand {
        TaggerCommand {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_dir: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn bridge_round_trip_over_stdio() {
        let pos = sh(r#"echo '{"type":"ready"}'; read req; echo '{"type":"result","id":"req-1","tags":[["Jane","NNP"],["Doe","NNP"]]}'; read bye"#);
        let ner = sh(r#"echo '{"type":"ready"}'; read req; echo '{"type":"result","id":"req-1","tags":[["Jane","PERSON"],["Doe","PERSON"]]}'; read bye"#);

        let tagger = BridgeTagger::spawn(&pos, &ner).expect("spawn");
        let tokens = vec!["Jane".to_string(), "Doe".to_string()];
        assert_eq!(tagger.pos_tags(&tokens).unwrap(), vec!["NNP", "NNP"]);
        assert_eq!(tagger.ner_tags(&tokens).unwrap(), vec!["PERSON", "PERSON"]);
        tagger.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn bridge_surfaces_tagger_errors() {
        let pos = sh(r#"echo '{"type":"ready"}'; read req; echo '{"type":"error","id":"req-1","error":"boom"}'; read bye"#);
        let ner = sh(r#"echo '{"type":"ready"}'; read bye"#);

        let tagger = BridgeTagger::spawn(&pos, &ner).expect("spawn");
        let err = tagger.pos_tags(&["x".to_string()]).unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(matches!(err, PressfeatError::TaggerRejected { tagger: "pos", .. }));
        assert!(err.is_document_level());
        tagger.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn bridge_reports_closed_stdout_as_fatal() {
        let pos = sh(r#"echo '{"type":"ready"}'"#);
        let ner = sh(r#"echo '{"type":"ready"}'; read bye"#);

        let tagger = BridgeTagger::spawn(&pos, &ner).expect("spawn");
        let err = tagger.pos_tags(&["x".to_string()]).unwrap_err();
        assert!(matches!(err, PressfeatError::Tagger(_)));
        assert!(!err.is_document_level());
        tagger.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn invalid_message_excerpt_respects_char_boundaries() {
        // 199 ASCII bytes, then a two-byte character straddling byte 200.
        let garbage = format!("{}é tail", "x".repeat(199));
        let pos = sh(&format!(r#"echo '{{"type":"ready"}}'; read req; echo '{garbage}'; read bye"#));
        let ner = sh(r#"echo '{"type":"ready"}'; read bye"#);

        let tagger = BridgeTagger::spawn(&pos, &ner).expect("spawn");
        let err = tagger.pos_tags(&["x".to_string()]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("invalid pos tagger message"));
        assert!(message.contains(&format!("{}é", "x".repeat(199))));
        assert!(!message.contains("tail"));
        assert!(!err.is_document_level());

        // The lock is not poisoned; the process can still be shut down cleanly.
        tagger.shutdown();
    }

    #[cfg(unix)]
    #[test]
    fn bridge_requires_ready_message() {
        let pos = sh(r#"echo '{"type":"error","id":"","error":"no model"}'"#);
        let ner = sh(r#"echo '{"type":"ready"}'; read bye"#);
        let err = BridgeTagger::spawn(&pos, &ner).err().expect("spawn should fail");
        assert!(err.to_string().contains("expected ready"));
    }
}
