//! The interactive shell, plus script and single-command modes.
//!
//! By default we use `rustyline` for line editing and tab completion.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

use anyhow::{anyhow, Result};
use colored::Colorize;
use dbadmin_core::tokenize::split_command_line;
use dbadmin_core::{CommandExecutor, ControlPlane, Outcome};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;

use crate::render::render;

pub const PROMPT: &str = "dbadmin> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Run one tokenized command and render its outcome.
pub fn dispatch<A: ControlPlane, S: AsRef<str>>(
    executor: &CommandExecutor<A>,
    tokens: &[S],
    out: &mut impl Write,
) -> Result<Control> {
    let outcome = executor.execute(tokens)?;
    render(out, &outcome)?;
    Ok(match outcome {
        Outcome::Exit => Control::Exit,
        _ => Control::Continue,
    })
}

pub fn dispatch_line<A: ControlPlane>(
    executor: &CommandExecutor<A>,
    line: &str,
    out: &mut impl Write,
) -> Result<Control> {
    dispatch(executor, &split_command_line(line), out)
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {err}", "error:".red().bold());
}

pub fn run_single<A: ControlPlane>(executor: &CommandExecutor<A>, words: &[String]) -> Result<()> {
    let stdout = io::stdout();
    dispatch(executor, words, &mut stdout.lock())?;
    Ok(())
}

/// Lines from `path` (or stdin for `-`); blank lines and `#` comments are
/// skipped.
pub fn run_script<A: ControlPlane>(
    executor: &CommandExecutor<A>,
    path: &Path,
    continue_on_error: bool,
) -> Result<()> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path).map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?
    };
    let stdout = io::stdout();
    run_lines(executor, &text, continue_on_error, &mut stdout.lock())
}

pub fn run_lines<A: ControlPlane>(
    executor: &CommandExecutor<A>,
    text: &str,
    continue_on_error: bool,
    out: &mut impl Write,
) -> Result<()> {
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        debug!(line = idx + 1, command = line, "script command");

        match dispatch_line(executor, line, out) {
            Ok(Control::Continue) => {}
            Ok(Control::Exit) => break,
            Err(e) => {
                if continue_on_error {
                    report(&e);
                } else {
                    return Err(anyhow!("script failed at line {}: {e}", idx + 1));
                }
            }
        }
    }
    Ok(())
}

pub fn run_interactive<A: ControlPlane>(executor: &CommandExecutor<A>) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        run_rustyline(executor)
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        run_simple(executor)
    }
}

#[cfg(not(feature = "repl-rustyline"))]
fn run_simple<A: ControlPlane>(executor: &CommandExecutor<A>) -> Result<()> {
    println!("{}", "dbadmin".green().bold());
    println!("Type `help` for commands. Type `quit` to exit.\n");

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let stdout = io::stdout();
        match dispatch_line(executor, line, &mut stdout.lock()) {
            Ok(Control::Continue) => {}
            Ok(Control::Exit) => break,
            Err(e) => report(&e),
        }
    }
    println!("Goodbye");
    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn run_rustyline<A: ControlPlane>(executor: &CommandExecutor<A>) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::Editor;

    println!("{}", "dbadmin".green().bold());
    println!("Tab-completion enabled. Type `help` for commands. Type `quit` to exit.\n");

    let helper = ShellHelper::new(dbadmin_core::CompletionEngine::new(
        executor.registry().clone(),
    ));
    let mut rl: Editor<ShellHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    rl.set_helper(Some(helper));

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        let stdout = io::stdout();
        match dispatch_line(executor, line, &mut stdout.lock()) {
            Ok(Control::Continue) => {}
            Ok(Control::Exit) => break,
            Err(e) => report(&e),
        }
    }
    println!("Goodbye");
    Ok(())
}

// =============================================================================
// Tab completion (rustyline)
// =============================================================================

#[cfg(feature = "repl-rustyline")]
pub struct ShellHelper {
    engine: dbadmin_core::CompletionEngine,
}

#[cfg(feature = "repl-rustyline")]
impl ShellHelper {
    pub fn new(engine: dbadmin_core::CompletionEngine) -> Self {
        Self { engine }
    }

    fn pairs(&self, line: &str, pos: usize) -> (usize, Vec<rustyline::completion::Pair>) {
        let completion = self.engine.complete(line, pos);
        let pairs = completion
            .candidates
            .into_iter()
            .map(|c| rustyline::completion::Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();
        (completion.start, pairs)
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::Helper for ShellHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::highlight::Highlighter for ShellHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::hint::Hinter for ShellHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::validate::Validator for ShellHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::completion::Completer for ShellHelper {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        Ok(self.pairs(line, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbadmin_core::model::Endpoint;
    use dbadmin_core::{ClusterInfo, Database, EntityRegistry, RemoteError, RequestBody, Shard};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Plane {
        updates: RefCell<Vec<(u64, String)>>,
    }

    impl ControlPlane for Plane {
        fn list_databases(&self) -> Result<Vec<Database>, RemoteError> {
            Ok(vec![Database {
                uid: 1,
                name: "orders".into(),
                memory_size: 1 << 32,
                endpoints: vec![Endpoint {
                    dns_name: "orders.local".into(),
                    addr: vec![],
                    port: 12001,
                }],
                ..Database::default()
            }])
        }

        fn get_database(&self, uid: u64) -> Result<Database, RemoteError> {
            self.list_databases()?
                .into_iter()
                .find(|d| d.uid == uid)
                .ok_or(RemoteError::Status {
                    status: 404,
                    reason: "Not Found".into(),
                })
        }

        fn list_shards(&self, _database: Option<u64>) -> Result<Vec<Shard>, RemoteError> {
            Ok(Vec::new())
        }

        fn cluster_info(&self) -> Result<ClusterInfo, RemoteError> {
            Ok(ClusterInfo::default())
        }

        fn create_database(&self, _body: &RequestBody) -> Result<Database, RemoteError> {
            Err(RemoteError::Status {
                status: 409,
                reason: "Conflict".into(),
            })
        }

        fn update_database(&self, uid: u64, body: &RequestBody) -> Result<(), RemoteError> {
            self.updates.borrow_mut().push((uid, body.to_json_string()));
            Ok(())
        }

        fn delete_database(&self, _uid: u64) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn executor() -> CommandExecutor<Plane> {
        let plane = Plane::default();
        let registry = EntityRegistry::new();
        registry.refresh(&plane).unwrap();
        CommandExecutor::new(plane, registry)
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> (Result<()>, String) {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        let result = f(&mut buf);
        (result, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn quit_aliases_stop_the_loop() {
        let ex = executor();
        let mut sink = Vec::new();
        for word in ["quit", "EXIT", "bye"] {
            assert_eq!(dispatch_line(&ex, word, &mut sink).unwrap(), Control::Exit);
        }
        assert_eq!(dispatch_line(&ex, "list db", &mut sink).unwrap(), Control::Continue);
    }

    #[test]
    fn remote_errors_carry_reason_and_status() {
        let ex = executor();
        let err = dispatch_line(&ex, "create fresh memory 1", &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "Conflict, 409");
    }

    #[test]
    fn script_stops_at_first_error_with_line_number() {
        let ex = executor();
        let script = "# setup\n\nchange orders memory 2\n\
                      change orders eviction nope\nchange orders memory 3\n";
        let (result, _) = output(|out| run_lines(&ex, script, false, out));
        let err = result.unwrap_err().to_string();
        assert!(err.starts_with("script failed at line 4:"), "{err}");
        assert_eq!(ex.api().updates.borrow().len(), 1);
    }

    #[test]
    fn script_can_continue_past_errors_and_stops_at_quit() {
        let ex = executor();
        let script = "change orders eviction nope\nchange orders memory 3\n\
                      quit\nchange orders memory 4\n";
        let (result, text) = output(|out| run_lines(&ex, script, true, out));
        result.unwrap();
        assert!(text.contains("OK updated database 1"));
        assert_eq!(
            *ex.api().updates.borrow(),
            vec![(1, r#"{"memory_size":3221225472}"#.to_string())]
        );
    }

    #[cfg(feature = "repl-rustyline")]
    #[test]
    fn helper_delegates_to_the_completion_engine() {
        let ex = executor();
        let helper = ShellHelper::new(dbadmin_core::CompletionEngine::new(ex.registry().clone()));
        let (start, pairs) = helper.pairs("change or", 9);
        assert_eq!(start, 7);
        let words: Vec<_> = pairs.into_iter().map(|p| p.replacement).collect();
        assert_eq!(words, vec!["orders"]);
    }
}
