//! Line-oriented terminal front end.
//!
//! Plain text goes to the assistant; lines starting with `/` are commands.

use crate::chat::TurnOutcome;
use crate::controller::{AppController, Screen};
use crate::session::{Interaction, SaveOutcome};
use crate::types::{ChatMessage, NewProject, Project, ProjectId, Role, SessionRecord, Timestamp};
use async_trait::async_trait;
use std::io::Write;
use time::{UtcOffset, format_description::FormatItem, macros::format_description};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

const HELP: &[(&str, &str)] = &[
    ("exit, quit", "End the conversation"),
    ("/help", "Show this help message"),
    ("/projects", "List all projects"),
    ("/open <number|id|name>", "Open an existing project"),
    ("/new <name> [path]", "Create a new project"),
    ("/temp", "Start a temporary session"),
    ("/save", "Save the current session"),
    ("/sessions", "Show saved sessions of the current project"),
    ("/convert <name>", "Make the temporary project permanent"),
    ("/switch", "Go back to project selection"),
    ("/back", "Return to the current project"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Empty,
    Quit,
    Help,
    Projects,
    Open(String),
    New { name: String, path: Option<String> },
    Temp,
    Save,
    Sessions,
    Convert(String),
    Switch,
    Back,
    Message(String),
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Command::Quit;
    }
    if !line.starts_with('/') {
        return Command::Message(line.to_string());
    }

    let mut parts = line.split_whitespace();
    let head = parts.next().unwrap_or_default();
    // `/project <sub>` and `/session <sub>` are accepted as aliases
    let (command, args): (String, Vec<&str>) = match head {
        "/project" | "/session" => match parts.next() {
            Some(sub) => (format!("/{}", alias(head, sub)), parts.collect()),
            None if head == "/project" => ("/projects".to_string(), Vec::new()),
            None => ("/save".to_string(), Vec::new()),
        },
        other => (other.to_string(), parts.collect()),
    };

    match command.as_str() {
        "/help" => Command::Help,
        "/projects" => Command::Projects,
        "/open" if args.is_empty() => Command::Usage("/open <number|id|name>"),
        "/open" => Command::Open(args.join(" ")),
        "/new" => match args.as_slice() {
            [] => Command::Usage("/new <name> [path]"),
            [name] => Command::New {
                name: name.to_string(),
                path: None,
            },
            [name, path @ ..] => Command::New {
                name: name.to_string(),
                path: Some(path.join(" ")),
            },
        },
        "/temp" => Command::Temp,
        "/save" => Command::Save,
        "/sessions" => Command::Sessions,
        "/convert" if args.is_empty() => Command::Usage("/convert <name>"),
        "/convert" => Command::Convert(args.join(" ")),
        "/switch" => Command::Switch,
        "/back" => Command::Back,
        _ => Command::Unknown(head.to_string()),
    }
}

fn alias(head: &str, sub: &str) -> String {
    match (head, sub) {
        ("/project", "list") => "projects".to_string(),
        ("/project", "select") => "open".to_string(),
        ("/session", "list") | ("/project", "sessions") => "sessions".to_string(),
        (_, other) => other.to_string(),
    }
}

/// Resolves a 1-based list position, a project id, or an exact name
/// (case-insensitive), in that order.
pub fn resolve_project<'a>(projects: &'a [Project], reference: &str) -> Option<&'a ProjectId> {
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>()
        && let Some(project) = position.checked_sub(1).and_then(|index| projects.get(index))
    {
        return Some(&project.id);
    }
    projects
        .iter()
        .find(|project| project.id.as_str() == reference)
        .or_else(|| {
            projects
                .iter()
                .find(|project| project.name.eq_ignore_ascii_case(reference))
        })
        .map(|project| &project.id)
}

fn format_message_timestamp(timestamp: &Timestamp, offset: UtcOffset) -> Option<String> {
    let datetime = timestamp.parse()?.to_offset(offset);
    datetime.format(MESSAGE_TIME_FORMAT).ok()
}

pub fn format_message(message: &ChatMessage, offset: UtcOffset) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => "Claude",
    };
    match format_message_timestamp(&message.timestamp, offset) {
        Some(time) => format!("{speaker} [{time}]: {}", message.content),
        None => format!("{speaker}: {}", message.content),
    }
}

pub fn format_project_line(position: usize, project: &Project) -> String {
    let mut line = format!("  {position}. {}", project.name);
    if project.is_temporary {
        line.push_str(" (temp)");
    }
    line.push_str(&format!(" - {} sessions", project.session_count));
    if let Some(path) = &project.path {
        line.push_str(&format!(" - {path}"));
    }
    line
}

pub fn format_session_line(position: usize, session: &SessionRecord) -> String {
    let created = session
        .created_at
        .as_ref()
        .map(Timestamp::as_str)
        .unwrap_or("unknown");
    format!(
        "  {position}. {created} - {} messages",
        session.messages.len()
    )
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Stdin/stdout front end. Shared between the REPL loop and the session
/// tracker's questions so both read from the same line buffer.
///
/// `local_offset` must be read before the async runtime starts; the local
/// offset cannot be queried reliably once other threads exist.
pub struct Terminal {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    local_offset: UtcOffset,
}

impl Terminal {
    pub fn new(local_offset: UtcOffset) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            local_offset,
        }
    }

    pub fn local_offset(&self) -> UtcOffset {
        self.local_offset
    }

    /// `None` on end of input.
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to read from stdin");
                None
            }
        }
    }
}

#[async_trait]
impl Interaction for Terminal {
    async fn confirm(&self, question: &str) -> bool {
        loop {
            let Some(answer) = self.read_line(&format!("{question} (y/n): ")).await else {
                return false;
            };
            if let Some(yes) = parse_yes_no(&answer) {
                return yes;
            }
        }
    }

    async fn prompt_text(&self, question: &str, default: &str) -> Option<String> {
        let answer = self.read_line(&format!("{question} [{default}] ")).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            Some(default.to_string())
        } else {
            Some(answer.to_string())
        }
    }

    async fn notify(&self, message: &str) {
        println!("{message}");
    }
}

fn print_help() {
    println!("\nCommands:");
    for (command, description) in HELP {
        println!("  {command:<26} {description}");
    }
}

fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found. Use '/new <name>' or '/temp' to start one.");
        return;
    }
    println!("\nAvailable projects:");
    for (index, project) in projects.iter().enumerate() {
        println!("{}", format_project_line(index + 1, project));
    }
    println!("Use '/open <number>' to choose a project.");
}

fn prompt_for(app: &AppController) -> String {
    match (app.screen(), app.current_project()) {
        (Screen::Chatting, Some(project)) if project.is_temporary => {
            format!("\n{} [temp]> ", project.name)
        }
        (Screen::Chatting, Some(project)) => format!("\n{}> ", project.name),
        _ => "\nselect> ".to_string(),
    }
}

async fn leave_chat(app: &mut AppController) {
    if app.screen() == Screen::Chatting {
        app.change_project().await;
    }
}

fn announce_project(project: &Project) {
    println!("Welcome to {}!", project.name);
    if project.is_temporary {
        println!("This is a temporary session. Use /save to keep your work.");
    }
}

pub async fn run(app: &mut AppController, terminal: &Terminal) {
    println!("chatdesk - type /help for commands, 'exit' to quit");

    match app.initialize().await {
        Screen::Chatting => {
            if let Some(project) = app.current_project() {
                announce_project(project);
            }
        }
        Screen::SelectingProject => print_projects(app.known_projects()),
    }

    while let Some(line) = terminal.read_line(&prompt_for(app)).await {
        match parse_command(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => print_help(),
            Command::Projects => {
                let projects = app.available_projects().await;
                print_projects(&projects);
            }
            Command::Open(reference) => {
                leave_chat(app).await;
                let projects = app.available_projects().await;
                match resolve_project(&projects, &reference).cloned() {
                    Some(id) => {
                        if let Ok(project) = app.open_project(&id).await {
                            announce_project(&project);
                        }
                    }
                    None => println!("No project matches '{reference}'."),
                }
            }
            Command::New { name, path } => {
                leave_chat(app).await;
                if let Ok(project) = app
                    .create_project(NewProject::named(name, path))
                    .await
                {
                    announce_project(&project);
                }
            }
            Command::Temp => {
                leave_chat(app).await;
                if let Ok(project) = app
                    .create_project(NewProject::temporary())
                    .await
                {
                    announce_project(&project);
                }
            }
            Command::Save => match app.save_session().await {
                Ok(SaveOutcome::NothingToSave) => println!("No unsaved changes."),
                Ok(SaveOutcome::Saved { converted: true, .. }) => {
                    if let Some(project) = app.current_project() {
                        println!("Project is now permanent as '{}'.", project.name);
                    }
                }
                // failures and successes were already reported by the tracker
                Ok(SaveOutcome::Saved { .. }) | Err(_) => {}
            },
            Command::Sessions => match app.list_sessions().await {
                Ok(sessions) if sessions.is_empty() => println!("No sessions found for this project."),
                Ok(sessions) => {
                    for (index, session) in sessions.iter().enumerate() {
                        println!("{}", format_session_line(index + 1, session));
                    }
                }
                Err(err) => println!("Could not list sessions: {err}"),
            },
            Command::Convert(name) => match app.convert_project(&name).await {
                Ok(()) => println!("Converted to permanent project '{}'.", name.trim()),
                Err(err) => println!("Could not convert project: {err}"),
            },
            Command::Switch => {
                leave_chat(app).await;
                let projects = app.available_projects().await;
                print_projects(&projects);
            }
            Command::Back => {
                if app.cancel_project_switch() == Screen::SelectingProject {
                    println!("No project to return to.");
                }
            }
            Command::Message(text) => {
                if app.screen() != Screen::Chatting {
                    println!("Select or create a project first (/help).");
                    continue;
                }
                println!("Claude is thinking...");
                match app.send_message(&text).await {
                    TurnOutcome::Replied | TurnOutcome::Fallback(_) => {
                        if let Some(reply) = app.conversation().messages().last() {
                            println!("{}", format_message(reply, terminal.local_offset()));
                        }
                    }
                    TurnOutcome::Rejected(reason) => println!("Message not sent: {reason}"),
                    TurnOutcome::Discarded { .. } => {}
                }
            }
            Command::Usage(usage) => println!("Usage: {usage}"),
            Command::Unknown(command) => println!("Unknown command: {command}"),
        }
    }

    if app.conversation().has_unsaved_changes()
        && terminal.confirm("Save current session?").await
        && let Err(err) = app.save_session().await
    {
        warn!(error = %err, "final save failed; unsaved messages are lost");
    }
    println!("Goodbye!");
}
