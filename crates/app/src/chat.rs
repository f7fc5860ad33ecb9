use anyhow::Result;
use rag_qa_core::{ChatSession, ChatTurn, QueryPipeline, Role, MODEL_OPTIONS};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "commands: /model <name>, /k <1-10>, /status, /history, /clear, /quit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Ask(&'a str),
    Model(&'a str),
    TopK(&'a str),
    Status,
    History,
    Clear,
    Quit,
    Help,
    Unknown(&'a str),
    Empty,
}

pub fn parse_line(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line);
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "model" => Command::Model(arg),
        "k" => Command::TopK(arg),
        "status" => Command::Status,
        "history" => Command::History,
        "clear" => Command::Clear,
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        _ => Command::Unknown(name),
    }
}

pub fn render_turn(turn: &ChatTurn) -> String {
    let speaker = match turn.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("{speaker}> {}", turn.content);
    if let Some(sources) = &turn.sources {
        for (position, source) in sources.iter().enumerate() {
            out.push_str(&format!("\n  [source {}] {}", position + 1, source));
        }
    }
    out
}

fn status_line(session: &ChatSession, pipeline: &QueryPipeline) -> String {
    let index = if pipeline.retriever().index_present() {
        "loaded"
    } else {
        "missing (run `rag-qa ingest`)"
    };
    format!(
        "model={} k={} index={} turns={}",
        session.model(),
        session.k(),
        index,
        session.transcript().len()
    )
}

/// Reads lines from stdin until `/quit` or end of input.
pub async fn run_chat(pipeline: &QueryPipeline) -> Result<()> {
    let mut session = ChatSession::for_pipeline(pipeline);
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    stdout
        .write_all(format!("{}\n{HELP}\n", status_line(&session, pipeline)).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match parse_line(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => HELP.to_string(),
            Command::Status => status_line(&session, pipeline),
            Command::Clear => {
                session.clear();
                "history cleared".to_string()
            }
            Command::History => session
                .transcript()
                .iter()
                .map(render_turn)
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Model("") => format!(
                "model={} (options: {})",
                session.model(),
                MODEL_OPTIONS.join(", ")
            ),
            Command::Model(name) => match session.set_model(name) {
                Ok(()) => format!("model set to {}", session.model()),
                Err(error) => error.to_string(),
            },
            Command::TopK(raw) => match raw.parse::<usize>() {
                Ok(k) => match session.set_k(k) {
                    Ok(()) => format!("k set to {}", session.k()),
                    Err(error) => error.to_string(),
                },
                Err(_) => format!("k must be a number, got {raw:?}"),
            },
            Command::Unknown(name) => format!("unknown command /{name}. {HELP}"),
            Command::Ask(question) => render_turn(session.ask(pipeline, question).await),
        };

        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
    }

    Ok(())
}
