//! Codepad - console shell for the editing core.
//!
//! Usage: codepad [--config PATH] [--lang NAME] [STATE_FILE]
//!
//! Reads line commands from stdin. If STATE_FILE exists, content and undo
//! history are restored from it at start and written back on exit.

mod commands;

use codepad_core::{Editor, EditorConfig, EditorState, Language};
use commands::{execute_command, parse_command};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Parsed command line. The state file is editor state JSON, not a source
/// file, so it never implies a language.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    lang: Option<String>,
    state_file: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--lang" => {
                parsed.lang = Some(args.next().ok_or("--lang needs a name")?);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
            _ if parsed.state_file.is_none() => parsed.state_file = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument '{arg}'")),
        }
    }
    Ok(parsed)
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\nusage: codepad [--config PATH] [--lang NAME] [STATE_FILE]");
            return ExitCode::from(2);
        }
    };

    log::info!("Starting Codepad");

    let config = match &args.config {
        Some(path) => match EditorConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EditorConfig::default(),
    };

    let mut editor = Editor::new(config);

    if let Some(path) = args.state_file.as_ref().filter(|p| p.exists()) {
        match EditorState::load(path) {
            Ok(state) => editor.restore_state(state),
            Err(e) => log::error!("Failed to restore '{}': {}", path.display(), e),
        }
    }

    let language = args.lang.as_deref().map(Language::from_name).unwrap_or_default();
    editor.set_language(language);

    if let Err(e) = editor.start() {
        log::error!("Failed to start editor: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = run_shell(&editor) {
        log::error!("Shell I/O failed: {}", e);
    }

    editor.shutdown();

    if let Some(path) = &args.state_file {
        match editor.save_state().save(path) {
            Ok(()) => log::info!("Saved state to {}", path.display()),
            Err(e) => log::error!("Failed to save '{}': {}", path.display(), e),
        }
    }

    log::info!("Codepad exited");
    ExitCode::SUCCESS
}

/// Reads and executes commands until `quit` or end of input.
fn run_shell(editor: &Editor) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        // Results posted by the highlight loop land between commands.
        editor.run_ui_tasks();

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        match parse_command(&line) {
            Ok(Some(command)) => {
                if execute_command(editor, command, &mut stdout)? {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) => writeln!(stdout, "{e}")?,
        }
        stdout.flush()?;
    }
}
