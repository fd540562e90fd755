//! Line commands for the console shell.

use codepad_core::{Editor, Language};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Represents a shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommand {
    // Text input
    Type(String),
    Newline,
    Backspace(usize),

    // Selection
    Select(usize, usize),

    // Undo/Redo
    Undo(usize),
    Redo(usize),

    // Highlighting
    Highlight(bool),
    Lang(String),

    // Inspection
    Wait(u64),
    Show,
    Spans,
    Help,

    Quit,
}

pub const HELP: &str = "\
commands:
  type TEXT          insert TEXT at the selection
  newline            insert a line break
  backspace [N]      delete the selection or N chars before the caret
  select START END   set the selection (char offsets)
  undo [N] | redo [N]
  highlight on|off   toggle highlighting
  lang NAME          highlight as NAME (rust, py, json, ...)
  wait MS            let background work run for MS milliseconds
  show | spans       print text and selection, or style spans
  quit";

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<EditorCommand>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match trimmed.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (trimmed, ""),
    };

    let command = match word {
        // Text after `type ` is taken verbatim, spaces included.
        "type" => EditorCommand::Type(rest.to_string()),
        "newline" => EditorCommand::Newline,
        "backspace" => EditorCommand::Backspace(count_arg(rest)?),
        "select" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(start), Some(end), None) => {
                    EditorCommand::Select(number(start)?, number(end)?)
                }
                _ => return Err("usage: select START END".into()),
            }
        }
        "undo" => EditorCommand::Undo(count_arg(rest)?),
        "redo" => EditorCommand::Redo(count_arg(rest)?),
        "highlight" => match rest.trim() {
            "on" => EditorCommand::Highlight(true),
            "off" => EditorCommand::Highlight(false),
            _ => return Err("usage: highlight on|off".into()),
        },
        "lang" => match rest.trim() {
            "" => return Err("usage: lang NAME".into()),
            name => EditorCommand::Lang(name.to_string()),
        },
        "wait" => EditorCommand::Wait(number(rest.trim())? as u64),
        "show" => EditorCommand::Show,
        "spans" => EditorCommand::Spans,
        "help" => EditorCommand::Help,
        "quit" | "exit" => EditorCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

fn count_arg(rest: &str) -> Result<usize, String> {
    match rest.trim() {
        "" => Ok(1),
        n => number(n),
    }
}

fn number(s: &str) -> Result<usize, String> {
    s.parse().map_err(|_| format!("expected a number, got '{s}'"))
}

/// Executes a command. Returns true if the shell should quit.
pub fn execute_command(
    editor: &Editor,
    command: EditorCommand,
    out: &mut impl Write,
) -> io::Result<bool> {
    match command {
        EditorCommand::Type(text) => {
            editor.type_text(&text);
        }
        EditorCommand::Newline => {
            editor.type_text("\n");
        }
        EditorCommand::Backspace(n) => {
            editor.backspace(n);
        }
        EditorCommand::Select(start, end) => {
            editor.set_selection(start, end);
        }
        EditorCommand::Undo(n) => {
            if !editor.undo(n) {
                writeln!(out, "nothing to undo")?;
            }
        }
        EditorCommand::Redo(n) => {
            if !editor.redo(n) {
                writeln!(out, "nothing to redo")?;
            }
        }
        EditorCommand::Highlight(enabled) => editor.set_highlighting_enabled(enabled),
        EditorCommand::Lang(name) => editor.set_language(Language::from_name(&name)),
        EditorCommand::Wait(ms) => wait(editor, Duration::from_millis(ms)),
        EditorCommand::Show => {
            let selection = editor.selection();
            writeln!(out, "{:?}", editor.text())?;
            writeln!(
                out,
                "selection {}..{}  undo {}{}  redo {}",
                selection.start,
                selection.end,
                editor.undo_depth(),
                if editor.is_undo_settled() { "" } else { "+" },
                editor.redo_depth()
            )?;
        }
        EditorCommand::Spans => {
            let text: Vec<char> = editor.text().chars().collect();
            for span in editor.spans() {
                let slice: String = text
                    .get(span.start..span.end)
                    .map(|chars| chars.iter().collect())
                    .unwrap_or_default();
                writeln!(out, "{:>5}..{:<5} {:<14} {:?}", span.start, span.end, span.style, slice)?;
            }
        }
        EditorCommand::Help => writeln!(out, "{HELP}")?,
        EditorCommand::Quit => return Ok(true),
    }
    Ok(false)
}

/// Lets background loops run, applying their results as they arrive.
fn wait(editor: &Editor, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        editor.run_ui_tasks_within(deadline - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codepad_core::EditorConfig;

    fn run(editor: &Editor, lines: &[&str]) -> String {
        let mut out = Vec::new();
        for line in lines {
            if let Some(command) = parse_command(line).unwrap() {
                execute_command(editor, command, &mut out).unwrap();
            }
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("type hello world\n").unwrap(),
            Some(EditorCommand::Type("hello world".into()))
        );
        assert_eq!(parse_command("type ").unwrap(), Some(EditorCommand::Type(String::new())));
        assert_eq!(parse_command("undo").unwrap(), Some(EditorCommand::Undo(1)));
        assert_eq!(parse_command("redo 3").unwrap(), Some(EditorCommand::Redo(3)));
        assert_eq!(parse_command("select 2 5").unwrap(), Some(EditorCommand::Select(2, 5)));
        assert_eq!(
            parse_command("highlight off").unwrap(),
            Some(EditorCommand::Highlight(false))
        );
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("select 1").is_err());
        assert!(parse_command("backspace many").is_err());
        assert!(parse_command("highlight maybe").is_err());
        assert!(parse_command("fly").is_err());
    }

    #[test]
    fn test_execute_edit_session() {
        let editor = Editor::new(EditorConfig::default());
        let out = run(&editor, &["type fn", "newline", "type x", "backspace", "show"]);
        assert_eq!(editor.text(), "fn\n");
        assert!(out.starts_with("\"fn\\n\""));

        let out = run(&editor, &["undo", "undo"]);
        assert_eq!(editor.text(), "");
        assert_eq!(out, "nothing to undo\n");
    }

    #[test]
    fn test_quit() {
        let editor = Editor::new(EditorConfig::default());
        let quit = execute_command(&editor, EditorCommand::Quit, &mut io::sink()).unwrap();
        assert!(quit);
    }
}
