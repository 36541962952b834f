mod clip;
mod config;

use crate::clip::ClipFile;
use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use interview_core::interview::{AnswerOutcome, InterviewCoach, MAX_QUESTIONS, progress};
use interview_core::practice::{AssistantReply, TurnOutcome, UserInput};
use interview_core::recording::Recorder;
use interview_core::session::PracticeSession;
use interview_core::storage::{FileStore, SessionHistory};
use interview_core::{
    GeminiModel, GenerativeModel, InterviewSession, PracticeConfig, PracticeFeedback, PromptLibrary, Scenario,
    SessionError, Setting, UserNotice, Voice,
};
use interview_native_utils::data_uri;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(name = "mock-interview", version, about = "Rehearse interviews with an AI coach")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Spoken role-play with an AI partner. Replies are saved as WAV files.
    Practice {
        /// behavioral-interview, technical-interview or random
        #[arg(long, default_value = "behavioral-interview")]
        scenario: Scenario,
        /// What to talk about. Required unless the scenario is random.
        #[arg(long)]
        topic: Option<String>,
        /// Formal or Informal
        #[arg(long)]
        setting: Option<Setting>,
        /// Algenib, Charon, Kore or Zephyr
        #[arg(long, default_value = "Algenib")]
        voice: Voice,
        #[arg(long, default_value = "practice-audio")]
        out_dir: PathBuf,
    },
    /// Text interview for a job role, with written feedback at the end.
    Interview {
        #[arg(long)]
        role: String,
        /// Resume a stored interview instead of starting a new one.
        #[arg(long)]
        id: Option<String>,
    },
    /// List past interviews, newest first.
    History,
    /// Print the transcript and feedback of one interview.
    Show { id: String },
    /// Read text aloud in the coach's voice.
    Speak {
        text: String,
        #[arg(long, default_value = "speech.wav")]
        out: PathBuf,
    },
}

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // --- 3. Prompts, model and storage ---
    let prompts = config.gemini.prompts().context("Failed to load prompt templates")?;
    let model = GeminiModel::from_settings(&config.gemini, &prompts);
    let history = SessionHistory::new(FileStore::new(&config.data_dir));
    tracing::debug!("Interview history kept in {}", config.data_dir.display());

    match cli.command {
        Command::Practice {
            scenario,
            topic,
            setting,
            voice,
            out_dir,
        } => {
            if scenario.needs_topic() && topic.as_deref().is_none_or(|t| t.trim().is_empty()) {
                anyhow::bail!("--topic is required for the {scenario} scenario");
            }
            let practice = PracticeConfig {
                scenario,
                topic,
                setting,
                voice,
            };
            run_practice(&model, &prompts, practice, &out_dir).await
        }
        Command::Interview { role, id } => {
            let coach = InterviewCoach::new(&model, &prompts, &history);
            run_interview(&coach, &role, id).await
        }
        Command::History => {
            let sessions = history.list();
            if sessions.is_empty() {
                println!("No interviews yet.");
            }
            for session in sessions {
                println!(
                    "{}  {}  {}  ({} questions{})",
                    session.id,
                    format_time(session.start_time),
                    session.job_role,
                    session.questions_asked(),
                    if session.is_finished() { ", finished" } else { "" }
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            let session = history
                .find(&id)
                .with_context(|| format!("No interview with id {id}"))?;
            print_interview(&session);
            Ok(())
        }
        Command::Speak { text, out } => {
            let coach = InterviewCoach::new(&model, &prompts, &history);
            match coach.speak(&text).await {
                Ok(uri) => {
                    write_audio(&uri, &out)?;
                    println!("Saved {}", out.display());
                }
                Err(e) => notify(&e),
            }
            Ok(())
        }
    }
}

async fn run_practice<M>(
    model: &M,
    prompts: &PromptLibrary,
    config: PracticeConfig,
    out_dir: &Path,
) -> Result<()>
where
    M: GenerativeModel + ?Sized,
{
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    println!("{}: {}", config.scenario.title(), config.scenario.description());
    println!("Partner voice: {} ({})", config.voice.name(), config.voice.label());

    let mut session = PracticeSession::new(config);
    let mut turn = 0;
    match session.start(model, prompts).await {
        Ok(reply) => play(&mut session, &reply, out_dir, turn)?,
        Err(e) => {
            notify(&e);
            return Ok(());
        }
    }

    println!("Type your answer, or @path/to/clip to send a recording. /quit ends the session.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = read_line(&mut lines).await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        let input = match line.strip_prefix('@') {
            Some(path) => match record_clip(path.trim()) {
                Ok(Some(uri)) => UserInput::Audio(uri),
                Ok(None) => {
                    eprintln!("The recording is empty.");
                    continue;
                }
                Err(e) => {
                    eprintln!("{e:#}");
                    continue;
                }
            },
            None => UserInput::Text(line.to_string()),
        };

        session.listening_started();
        match session.respond(model, prompts, &input).await {
            Ok(TurnOutcome::Reply(reply)) => {
                if let (UserInput::Audio(_), Some(heard)) = (&input, &reply.transcribed_user_text) {
                    println!("you: {heard}");
                }
                turn += 1;
                play(&mut session, &reply, out_dir, turn)?;
            }
            Ok(TurnOutcome::Complete { feedback }) => {
                print_practice_feedback(&feedback);
                return Ok(());
            }
            Err(e) => notify(&e),
        }
    }

    session.end();
    Ok(())
}

fn record_clip(path: &str) -> Result<Option<String>> {
    let mut recorder = Recorder::new(ClipFile::new(path));
    recorder.start()?;
    recorder.stop()
}

/// Saves the reply audio and shows the text. Playback itself is left to the user.
fn play(session: &mut PracticeSession, reply: &AssistantReply, out_dir: &Path, turn: usize) -> Result<()> {
    let path = out_dir.join(format!("turn-{turn:02}.wav"));
    session.playback_started();
    write_audio(&reply.audio_data_uri, &path)?;
    println!("partner: {}", reply.display_response);
    println!("         (audio: {})", path.display());
    session.playback_finished();
    Ok(())
}

async fn run_interview<M>(
    coach: &InterviewCoach<'_, M, FileStore>,
    role: &str,
    id: Option<String>,
) -> Result<()>
where
    M: GenerativeModel + ?Sized,
{
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut session = match coach.begin(&id, role).await {
        Ok(session) => session,
        Err(e) => {
            notify(&e);
            return Ok(());
        }
    };

    if session.is_finished() {
        print_interview(&session);
        return Ok(());
    }

    println!("Interview {} for {}", session.id, session.job_role);
    if let Some(question) = session.messages.last() {
        let (asked, total) = progress(&session);
        println!("Question {asked}/{total}: {}", question.text);
    }
    println!("Type your answer. /finish ends the interview early.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = read_line(&mut lines).await? {
        if line.trim() == "/finish" {
            if let Err(e) = coach.finish(&mut session).await {
                notify(&e);
            }
            break;
        }

        match coach.answer(&mut session, &line).await {
            Ok(AnswerOutcome::Ignored) => continue,
            Ok(AnswerOutcome::NextQuestion(question)) => {
                let (asked, total) = progress(&session);
                println!("Question {asked}/{total}: {question}");
            }
            Ok(AnswerOutcome::Finished) => break,
            Err(e) => {
                notify(&e);
                if session.is_finished() {
                    break;
                }
            }
        }
    }

    if session.is_finished() {
        print_interview(&session);
    } else {
        println!(
            "Interview saved after {} of {} questions. Resume with --id {}",
            session.questions_asked(),
            MAX_QUESTIONS,
            session.id
        );
    }
    Ok(())
}

async fn read_line(lines: &mut InputLines) -> Result<Option<String>> {
    print!("> ");
    std::io::stdout().flush()?;
    lines.next_line().await.context("Failed to read from stdin")
}

fn write_audio(uri: &str, path: &Path) -> Result<()> {
    let audio = data_uri::decode(uri)?;
    std::fs::write(path, audio.bytes).with_context(|| format!("Failed to write {}", path.display()))
}

fn notify(err: &anyhow::Error) {
    if let Some(session_err) = err.downcast_ref::<SessionError>() {
        eprintln!("{session_err}");
        return;
    }
    tracing::error!("{:#}", err);
    eprintln!("{}", UserNotice::classify(err));
}

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_interview(session: &InterviewSession) {
    println!("{} ({})", session.job_role, format_time(session.start_time));
    println!();
    for message in &session.messages {
        println!("{}: {}", message.role.as_str(), message.text);
    }
    println!();
    match &session.feedback {
        Some(feedback) => {
            println!("Communication skills: {}", feedback.communication_skills);
            println!("Technical knowledge: {}", feedback.technical_knowledge);
            println!("Areas for improvement: {}", feedback.areas_for_improvement);
            println!("Overall: {}", feedback.overall_feedback);
        }
        None if session.is_finished() => println!("Feedback is not available for this interview."),
        None => println!("This interview is still in progress."),
    }
}

fn print_practice_feedback(feedback: &PracticeFeedback) {
    println!();
    println!("Session complete.");
    println!("Summary: {}", feedback.overall_summary);
    println!("Clarity: {}", feedback.clarity);
    println!("Relevance: {}", feedback.relevance);
    println!("Problem solving: {}", feedback.problem_solving);
}
