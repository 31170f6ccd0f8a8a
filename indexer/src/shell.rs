//! Interactive operator shell.

use crate::classify::Classifier;
use crate::export::{export, ExportKind};
use crate::query::QueryService;
use crate::training::Trainer;
use anyhow::{bail, Context, Result};
use lemmadex_core::queue::{JobQueues, QueueName};
use lemmadex_core::{Settings, Store};
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub const HELP: &str = "\
commands:
  query <terms..>     lemmas containing any term, postings by weight
  test                run the query benchmark
  train <path>        rebuild the classifier corpus from <path>/<category>/<file>
  classify <file>     category of the nearest training document
  drain               drop every pending job
  export <type>       article | lemma | stem | document | xml
  help                this text
  clear               clear the screen
  exit                stop workers and quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(Vec<String>),
    Test,
    Train(PathBuf),
    Classify(PathBuf),
    Drain,
    Export(ExportKind),
    Help,
    Clear,
    Exit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else { bail!("empty command") };
        let rest: Vec<String> = parts.map(str::to_string).collect();
        let path = |what: &str| -> Result<PathBuf> {
            if rest.is_empty() {
                bail!("usage: {head} <{what}>");
            }
            Ok(PathBuf::from(rest.join(" ")))
        };
        Ok(match head.to_ascii_lowercase().as_str() {
            "query" if rest.is_empty() => bail!("usage: query <terms..>"),
            "query" => Command::Query(rest),
            "test" => Command::Test,
            "train" => Command::Train(path("path")?),
            "classify" => Command::Classify(path("file")?),
            "drain" => Command::Drain,
            "export" => match rest.first() {
                Some(kind) => Command::Export(kind.parse()?),
                None => bail!("usage: export <article|lemma|stem|document|xml>"),
            },
            "help" => Command::Help,
            "clear" => Command::Clear,
            "exit" | "quit" => Command::Exit,
            other => bail!("unknown command `{other}`, try `help`"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    store: Store,
    queues: Arc<JobQueues>,
    query: QueryService,
    classifier: Classifier,
    trainer: Trainer,
    export_dir: PathBuf,
}

impl Shell {
    pub fn new(store: Store, queues: Arc<JobQueues>, settings: &Settings, export_dir: PathBuf) -> Self {
        Self {
            query: QueryService::new(store.clone()),
            classifier: Classifier::new(store.clone(), settings.idf_variant()),
            trainer: Trainer::new(store.clone(), settings.max_sample_space),
            store,
            queues,
            export_dir,
        }
    }

    pub fn execute<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        match command {
            Command::Query(terms) => {
                let matches = self.query.search(&terms)?;
                if matches.is_empty() {
                    writeln!(out, "no lemma matches {}", terms.join(" "))?;
                }
                for m in matches {
                    writeln!(out, "{} ({} appearances)", m.term, m.total_appearances)?;
                    for hit in m.hits {
                        writeln!(out, "  {:>8.4}  x{:<3} {}  <{}>", hit.weight, hit.appearances, hit.header, hit.url)?;
                    }
                }
            }
            Command::Test => {
                let bench = self.query.benchmark()?;
                writeln!(out, "{} queries, mean {:.3} ms", bench.queries, bench.mean.as_secs_f64() * 1000.0)?;
            }
            Command::Train(root) => {
                let report = self.trainer.train(&root, &self.queues.get(QueueName::Training))?;
                writeln!(
                    out,
                    "generation {}: {} documents in {} categories, {} stems, {} skipped; vectorizing",
                    report.generation, report.documents, report.categories, report.stems, report.skipped
                )?;
            }
            Command::Classify(file) => {
                let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
                match self.classifier.classify(&text)? {
                    Some(c) => writeln!(out, "{} (nearest: {}, similarity {:.4})", c.category, c.document, c.similarity)?,
                    None => writeln!(out, "no trained corpus, run `train <path>` first")?,
                }
            }
            Command::Drain => {
                let removed = self.queues.drain_all()?;
                writeln!(out, "removed {removed} pending jobs")?;
            }
            Command::Export(kind) => {
                let path = export(&self.store, kind, &self.export_dir)?;
                writeln!(out, "wrote {}", path.display())?;
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Clear => write!(out, "\x1B[2J\x1B[1;1H")?,
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    /// Runs `command` from async code without stalling the worker thread;
    /// training and classification walk the whole corpus on disk. Needs the
    /// multi-threaded runtime.
    pub fn dispatch<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        tokio::task::block_in_place(|| self.execute(command, out))
    }

    /// Reads commands from stdin until `exit`, end of input or Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = std::io::stdout();
        loop {
            write!(stdout, "> ")?;
            stdout.flush()?;
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<Command>() {
                Ok(c) => c,
                Err(e) => {
                    writeln!(stdout, "{e}")?;
                    continue;
                }
            };
            match self.dispatch(command, &mut stdout) {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => {
                    warn!(error = %e, "command failed");
                    writeln!(stdout, "error: {e:#}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("query black lives".parse::<Command>().unwrap(), Command::Query(vec!["black".into(), "lives".into()]));
        assert_eq!("EXPORT xml".parse::<Command>().unwrap(), Command::Export(ExportKind::Xml));
        assert_eq!("train ./corpus".parse::<Command>().unwrap(), Command::Train(PathBuf::from("./corpus")));
        assert!("query".parse::<Command>().is_err());
        assert!("export".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn drain_and_exit() {
        let store = Store::temporary().unwrap();
        let queues = Arc::new(JobQueues::open(store.db(), 3).unwrap());
        queues.get(QueueName::Tags).add(lemmadex_core::NewJob::new("1", &1).unwrap()).unwrap();
        let shell = Shell::new(store, queues.clone(), &Settings::default(), std::env::temp_dir());
        let mut out = Vec::new();
        assert_eq!(shell.execute(Command::Drain, &mut out).unwrap(), Flow::Continue);
        assert_eq!(String::from_utf8(out).unwrap(), "removed 1 pending jobs\n");
        assert!(queues.get(QueueName::Tags).is_empty());
        assert_eq!(shell.execute(Command::Exit, &mut Vec::new()).unwrap(), Flow::Exit);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn training_runs_off_the_async_workers() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sport")).unwrap();
        std::fs::write(root.path().join("sport").join("1.txt"), "late goal wins the derby").unwrap();
        let store = Store::temporary().unwrap();
        let queues = Arc::new(JobQueues::open(store.db(), 3).unwrap());
        let shell = Shell::new(store.clone(), queues.clone(), &Settings::default(), std::env::temp_dir());

        let mut out = Vec::new();
        let flow = shell.dispatch(Command::Train(root.path().to_path_buf()), &mut out).unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(String::from_utf8(out).unwrap().starts_with("generation 1: 1 documents"));
        assert_eq!(queues.get(QueueName::Training).len(), 1);
    }
}
