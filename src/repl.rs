//! Line-oriented front-end over the `Assistant` boundary operations.
//!
//! Reads commands from any async reader and writes replies to any async
//! writer, so the binary wires it to stdin/stdout and tests to buffers.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::error;

use crate::assistant::Assistant;
use crate::pipeline::types::Category;

pub const HELP: &str = "\
Commands:
  list                   show the inbox (with categories after processing)
  process                process the inbox
  select <id>            select an email
  ask <question>         ask about the selected email or the inbox
  draft                  show the draft for the selected email
  edit <body>            save an edited draft for the selected email
  clear                  drop the edited draft for the selected email
  send                   send the effective draft (simulated)
  templates              list template names
  template <name> [text] show a template, or replace its text
  help                   show this help
  quit                   exit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Process,
    Select(String),
    Ask(String),
    Draft,
    Edit(String),
    Clear,
    Send,
    Templates,
    Template { name: String, text: Option<String> },
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let arg = || (!rest.is_empty()).then(|| rest.to_string());

        match head.to_lowercase().as_str() {
            "" => Self::Empty,
            "list" | "ls" if rest.is_empty() => Self::List,
            "process" => Self::Process,
            "select" => arg().map(Self::Select).unwrap_or_else(|| usage("select <id>")),
            "ask" => arg().map(Self::Ask).unwrap_or_else(|| usage("ask <question>")),
            "draft" => Self::Draft,
            "edit" => arg().map(Self::Edit).unwrap_or_else(|| usage("edit <body>")),
            "clear" => Self::Clear,
            "send" => Self::Send,
            "templates" => Self::Templates,
            "template" => match rest.split_once(char::is_whitespace) {
                Some((name, text)) => Self::Template {
                    name: name.to_string(),
                    text: Some(text.trim().to_string()),
                },
                None if !rest.is_empty() => Self::Template {
                    name: rest.to_string(),
                    text: None,
                },
                None => usage("template <name> [text]"),
            },
            "help" | "?" => Self::Help,
            "quit" | "exit" | "/quit" => Self::Quit,
            // Anything else is treated as a question.
            _ => Self::Ask(line.to_string()),
        }
    }
}

fn usage(form: &str) -> Command {
    Command::Invalid(format!("Usage: {form}"))
}

/// Session state: just the current selection.
#[derive(Debug, Default)]
pub struct Session {
    pub selected: Option<String>,
}

impl Session {
    /// Run one command. Returns `None` when the session should end.
    pub async fn execute(&mut self, assistant: &Assistant, command: Command) -> Option<String> {
        let reply = match command {
            Command::Quit => return None,
            Command::Empty => String::new(),
            Command::Help => HELP.to_string(),
            Command::Invalid(message) => message,
            Command::List => list(assistant).await,
            Command::Process => match assistant.process_inbox().await {
                Ok(state) => {
                    let urgent = state.ids_in_category(Category::Urgent).len();
                    format!(
                        "Processed {} emails ({} urgent).",
                        state.entries.len(),
                        urgent
                    )
                }
                Err(e) => {
                    error!(error = %e, "Processing failed");
                    format!("Processing failed, previous results kept: {e}")
                }
            },
            Command::Select(id) => {
                let id = id.trim_start_matches('#').to_string();
                match assistant.inbox().get(&id) {
                    Some(email) => {
                        let reply = format!("Selected #{} {}", email.id, email.subject);
                        self.selected = Some(id);
                        reply
                    }
                    None => format!("Email {id} is not in the inbox."),
                }
            }
            Command::Ask(question) => assistant.ask(&question, self.selected.as_deref()).await,
            Command::Draft => match self.selected.as_deref() {
                None => NO_SELECTION.to_string(),
                Some(id) => match assistant.effective_draft(id).await {
                    Ok(draft) => draft.body,
                    Err(e) if e.is_not_found() => NO_DRAFT.to_string(),
                    Err(e) => format!("Couldn't read draft: {e}"),
                },
            },
            Command::Edit(body) => match self.selected.as_deref() {
                None => NO_SELECTION.to_string(),
                Some(id) => match assistant.save_draft(id, &body).await {
                    Ok(_) => "Draft saved.".to_string(),
                    Err(e) => format!("Couldn't save draft: {e}"),
                },
            },
            Command::Clear => match self.selected.as_deref() {
                None => NO_SELECTION.to_string(),
                Some(id) => match assistant.clear_draft(id).await {
                    Ok(true) => "Edited draft cleared; the generated draft applies again.".to_string(),
                    Ok(false) => "There is no edited draft for this email.".to_string(),
                    Err(e) => format!("Couldn't clear draft: {e}"),
                },
            },
            Command::Send => match self.selected.as_deref() {
                None => NO_SELECTION.to_string(),
                Some(id) => match assistant.send_draft(id).await {
                    Ok(_) => format!("Reply to #{id} sent (simulated)."),
                    Err(e) if e.is_not_found() => NO_DRAFT.to_string(),
                    Err(e) => format!("Couldn't send draft: {e}"),
                },
            },
            Command::Templates => assistant.list_templates().await.join("\n"),
            Command::Template { name, text: None } => match assistant.get_template(&name).await {
                Ok(template) => format!("[{}] {}\n{}", template.target_use, template.name, template.text),
                Err(e) => e.to_string(),
            },
            Command::Template {
                name,
                text: Some(text),
            } => match assistant.upsert_template(&name, &text).await {
                Ok(template) => format!("Template {} saved.", template.name),
                Err(e) => format!("Couldn't save template: {e}"),
            },
        };
        Some(reply)
    }
}

const NO_SELECTION: &str = "Select an email first (select <id>).";
const NO_DRAFT: &str = "No draft yet. Process the inbox or write one with edit <body>.";

async fn list(assistant: &Assistant) -> String {
    if assistant.inbox().is_empty() {
        return "The inbox is empty.".to_string();
    }
    let mut lines = Vec::with_capacity(assistant.inbox().len());
    for email in assistant.inbox().emails() {
        let category = match assistant.processed_entry(&email.id).await {
            Ok(entry) => entry.category.label().to_string(),
            Err(_) => "-".to_string(),
        };
        lines.push(format!(
            "#{:<4} [{}] {} | {}",
            email.id, category, email.sender, email.subject
        ));
    }
    lines.join("\n")
}

/// Drive a session until `quit` or end of input.
pub async fn run<R, W>(assistant: &Assistant, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(reply) = session.execute(assistant, Command::parse(&line)).await else {
            break;
        };
        if !reply.is_empty() {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tempfile::TempDir;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("  list "), Command::List);
        assert_eq!(
            Command::parse("list all action items"),
            Command::Ask("list all action items".into())
        );
        assert_eq!(Command::parse("select 3"), Command::Select("3".into()));
        assert_eq!(
            Command::parse("ask Summarize this email"),
            Command::Ask("Summarize this email".into())
        );
        assert_eq!(
            Command::parse("edit Thanks,  will do"),
            Command::Edit("Thanks,  will do".into())
        );
        assert_eq!(
            Command::parse("template reply.other Hi {{sender_name}}"),
            Command::Template {
                name: "reply.other".into(),
                text: Some("Hi {{sender_name}}".into())
            }
        );
        assert_eq!(
            Command::parse("template reply.urgent"),
            Command::Template {
                name: "reply.urgent".into(),
                text: None
            }
        );
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("QUIT"), Command::Quit);
        assert!(matches!(Command::parse("select"), Command::Invalid(_)));
        assert_eq!(
            Command::parse("Show me all urgent emails"),
            Command::Ask("Show me all urgent emails".into())
        );
    }

    #[tokio::test]
    async fn scripted_session() {
        let dir = TempDir::new().unwrap();
        let inbox_path = dir.path().join("inbox.json");
        std::fs::write(
            &inbox_path,
            r#"[{"id": 1, "from": "Dana Lee <dana@corp.com>", "subject": "Q3 report",
                 "body": "Please send the Q3 report by Friday, this is urgent",
                 "timestamp": "2024-05-01T09:30:00Z"}]"#,
        )
        .unwrap();
        let mut config = AppConfig::in_dir(dir.path().join("data"));
        config.inbox_path = inbox_path;
        let assistant = Assistant::open(&config).await.unwrap();

        let script = "ask summarize this email\nselect 1\nask summarize this email\n\
                      process\nask what are the tasks\nedit Sure thing\ndraft\nsend\nquit\nlist\n";
        let mut out = Vec::new();
        run(&assistant, script.as_bytes(), &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Select an email first, then ask again."));
        assert!(out.contains("Selected #1 Q3 report"));
        assert!(out.contains("Process the inbox first"));
        assert!(out.contains("Processed 1 emails (1 urgent)."));
        assert!(out.contains("- send the Q3 report (due Friday)"));
        assert!(out.contains("Draft saved.\nSure thing\n"));
        assert!(out.contains("Reply to #1 sent (simulated)."));
        // Nothing after quit runs.
        assert!(!out.contains("[Urgent]"));
    }
}
