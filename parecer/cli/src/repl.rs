//! Interactive loop
//!
//! Reads lines from stdin. Before the first analysis a subject is loaded and
//! analyzed; afterwards every plain line is a follow-up. Operation failures
//! are reported by the analyst as notices, so the loop only logs them and
//! keeps going.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parecer_core::{Analyst, AnalystError, Document, ModelBackend, SessionState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

const HELP: &str = "\
Comandos:
  /load ARQUIVO    carrega o procedimento (PDF ou texto) para a análise inicial
  /analyze         executa a análise inicial do procedimento carregado
  /attach ARQUIVO  anexa um PDF à próxima mensagem
  /copy [ARQUIVO]  mostra ou grava o texto da última resposta
  /save [ARQUIVO]  exporta a conversa em HTML
  /help            mostra esta ajuda
  /quit            encerra

Depois da análise inicial, qualquer outra linha é enviada como pergunta.";

/// One parsed input line
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Load(PathBuf),
    Analyze,
    Attach(PathBuf),
    Copy(Option<PathBuf>),
    Save(Option<PathBuf>),
    Help,
    Quit,
    /// A slash command that needs an argument it did not get
    MissingArgument(&'static str),
    Unknown(String),
    /// Anything that is not a command
    Message(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (command, None),
        };
        let path = arg.map(PathBuf::from);

        match name {
            "load" => path.map_or(Self::MissingArgument("/load"), Self::Load),
            "attach" => path.map_or(Self::MissingArgument("/attach"), Self::Attach),
            "analyze" => Self::Analyze,
            "copy" => Self::Copy(path),
            "save" => Self::Save(path),
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Terminal driver for one analyst
pub struct Repl {
    analyst: Analyst<ModelBackend>,
    subject: Option<String>,
    staged: Option<Document>,
    html_out: Option<PathBuf>,
}

impl Repl {
    pub fn new(analyst: Analyst<ModelBackend>, html_out: Option<PathBuf>) -> Self {
        Self {
            analyst,
            subject: None,
            staged: None,
            html_out,
        }
    }

    /// Run until `/quit` or end of input
    ///
    /// With `initial`, loads that file and runs the analysis first.
    pub async fn run(mut self, initial: Option<PathBuf>) -> Result<()> {
        if let Some(path) = initial {
            if report(self.load(&path).await) {
                report(self.analyze().await);
            }
        } else {
            eprintln!("{HELP}\n");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
        {
            let outcome = match Command::parse(&line) {
                Command::Quit => break,
                Command::Help => {
                    eprintln!("{HELP}");
                    Ok(())
                }
                Command::Load(path) => self.load(&path).await,
                Command::Analyze => self.analyze().await,
                Command::Attach(path) => self.attach(&path).await,
                Command::Copy(path) => self.copy(path.as_deref()).await,
                Command::Save(path) => self.save(path).await,
                Command::Message(text) => self.send(&text).await,
                Command::MissingArgument(name) => {
                    Err(anyhow::anyhow!("{name} precisa de um arquivo"))
                }
                Command::Unknown(name) => {
                    Err(anyhow::anyhow!("comando desconhecido: /{name} (veja /help)"))
                }
            };
            report(outcome);
        }

        Ok(())
    }

    async fn load(&mut self, path: &Path) -> Result<()> {
        if self.analyst.session_state().await == SessionState::Active {
            anyhow::bail!("a análise inicial já foi feita; envie uma pergunta ou use /attach");
        }

        let document = Document::read(path).await?;
        let subject = if document.looks_like_pdf() {
            self.analyst.extract(&document).await?.as_str().to_string()
        } else {
            String::from_utf8(document.bytes().to_vec())
                .with_context(|| format!("{} não é um PDF nem texto UTF-8", path.display()))?
        };

        if subject.trim().is_empty() {
            warn!(path = %path.display(), "Loaded subject has no text");
        }
        eprintln!(
            "Procedimento carregado: {} ({} caracteres). Use /analyze.",
            document.file_name(),
            subject.chars().count()
        );
        self.subject = Some(subject);
        Ok(())
    }

    async fn analyze(&self) -> Result<()> {
        let subject = self.subject.as_deref().unwrap_or_default();
        match self.analyst.analyze(subject).await {
            Ok(outcome) => {
                debug!(turn_id = %outcome.turn_id, fragments = outcome.summary.fragments, "Analysis finished");
                eprintln!("Envie perguntas de acompanhamento ou /attach para anexar um PDF.");
            }
            Err(e) => debug!(error = %e, "Analysis did not complete"),
        }
        Ok(())
    }

    async fn attach(&mut self, path: &Path) -> Result<()> {
        let document = Document::read(path).await?;
        eprintln!(
            "Anexo pronto: {} (será enviado com a próxima mensagem)",
            document.file_name()
        );
        self.staged = Some(document);
        Ok(())
    }

    /// Send a follow-up with the staged attachment, if any
    ///
    /// The attachment stays staged until a request carrying it reaches the
    /// model, so a rejected or failed send can simply be retried.
    async fn send(&mut self, text: &str) -> Result<()> {
        match self.analyst.follow_up(text, self.staged.clone()).await {
            Ok(_) | Err(AnalystError::StreamInterrupted(_)) => self.staged = None,
            Err(e) => {
                debug!(error = %e, "Follow-up did not complete");
                if let Some(document) = &self.staged {
                    eprintln!("Anexo mantido: {}", document.file_name());
                }
            }
        }
        Ok(())
    }

    async fn copy(&self, path: Option<&Path>) -> Result<()> {
        let Some(text) = self.analyst.copy_text(None) else {
            anyhow::bail!("ainda não há resposta para copiar");
        };

        match path {
            Some(path) => {
                tokio::fs::write(path, text)
                    .await
                    .with_context(|| format!("falha ao gravar {}", path.display()))?;
                eprintln!("Texto gravado em {}", path.display());
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(text.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }

    async fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let Some(path) = path.or_else(|| self.html_out.clone()) else {
            anyhow::bail!("informe o arquivo: /save ARQUIVO");
        };

        let html = self.analyst.transcript().to_html();
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("falha ao gravar {}", path.display()))?;
        eprintln!("Conversa exportada para {}", path.display());
        Ok(())
    }
}

/// Print a local failure; returns whether the step succeeded
fn report(outcome: Result<()>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[erro] {e:#}");
            false
        }
    }
}
