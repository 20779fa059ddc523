pub mod config;
pub mod error;
pub mod repository;
pub mod script;

use std::io::{BufRead, Write};

use construe_core::{
    corpus_totals, AttemptSink, Excerpt, FinalizeReport, LoadReport, MasteryRepository, PracticeSession, Progress,
    Verdict,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{read_json, Config};
use crate::error::Result;
use crate::repository::{JsonMasteryRepository, LogSink};
use crate::script::{parse_line, Command};

/// One line of driver output.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Loaded(LoadReport),
    Verdict(Verdict),
    Progress(Progress),
    Finalized(FinalizeReport),
    Error { message: String },
}

pub fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    let settings = config.load_settings()?;
    let excerpt: Excerpt = read_json(&config.excerpt_path)?;

    tracing::info!(path = %config.mastery_path.display(), "Opening mastery file...");
    let repository = JsonMasteryRepository::open(&config.mastery_path)?;

    let totals = corpus_totals([&excerpt], settings.global.unmarked_pairing);
    let mut session = PracticeSession::new(repository, LogSink::new(), settings.global, config.mode)
        .with_mode_settings(settings.modes)
        .with_totals(totals);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    drive(&mut session, excerpt, stdin.lock(), stdout.lock())?;
    Ok(())
}

/// Run learner commands from `input` against `session`, one JSON reply per line.
///
/// The session is finalized on `quit` and at end of input.
pub fn drive<R, S, I, O>(session: &mut PracticeSession<R, S>, excerpt: Excerpt, input: I, mut output: O) -> Result<()>
where
    R: MasteryRepository,
    S: AttemptSink,
    I: BufRead,
    O: Write,
{
    let loaded = session.load_excerpt(excerpt)?;
    emit(&mut output, &Reply::Loaded(loaded))?;

    for line in input.lines() {
        let line = line?;
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring line");
                emit(&mut output, &Reply::Error { message: e.to_string() })?;
                continue;
            }
        };

        let reply = match command {
            Command::Select(submission) => Reply::Verdict(session.submit(&submission)),
            Command::Label {
                pair_key,
                label,
                hinted,
            } => Reply::Verdict(session.classify(&pair_key, &label, hinted)),
            Command::Reveal => Reply::Verdict(session.reveal()),
            Command::Mode(mode) => match session.switch_mode(mode)? {
                Some(report) => Reply::Loaded(report),
                None => continue,
            },
            Command::Next => match session.reload()? {
                Some(report) => Reply::Loaded(report),
                None => continue,
            },
            Command::Progress => match session.progress() {
                Some(progress) => Reply::Progress(progress),
                None => continue,
            },
            Command::Quit => break,
        };
        emit(&mut output, &reply)?;
    }

    let report = session.teardown()?;
    emit(&mut output, &Reply::Finalized(report))?;
    Ok(())
}

fn emit<O: Write>(output: &mut O, reply: &Reply) -> Result<()> {
    serde_json::to_writer(&mut *output, reply)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
