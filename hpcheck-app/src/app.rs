use crate::settings::AppSettings;
use anyhow::{Context, Result, bail};
use hpcheck_cache::{FileStorage, SessionStorage};
use hpcheck_core::CheckPhase;
use hpcheck_experiment::{
    ChannelObserver, CheckEvent, JsonFileSource, PageView, StimulusSource, TrialStateMachine,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::{BufRead, Write};
use std::process;
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, info, warn};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `p` alone plays the calibration sound.
    Play(Option<usize>),
    Respond { trial: usize, answer: String },
    Continue,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Err("empty command; `h` lists commands".to_string()),
        ["p" | "play"] => Ok(Command::Play(None)),
        ["p" | "play", n] => n
            .parse()
            .map(|trial| Command::Play(Some(trial)))
            .map_err(|_| format!("not a trial number: {n}")),
        ["c" | "continue"] => Ok(Command::Continue),
        ["h" | "help" | "?"] => Ok(Command::Help),
        ["q" | "quit"] => Ok(Command::Quit),
        [n, answer] => match n.parse() {
            Ok(trial) => Ok(Command::Respond {
                trial,
                answer: answer.to_string(),
            }),
            Err(_) => Err(format!("unrecognized command: {}", line.trim())),
        },
        _ => Err(format!("unrecognized command: {}", line.trim())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub did_pass: bool,
    pub total_correct: u32,
    pub trial_count: usize,
}

/// Terminal host: reads commands from `input`, drives the engine, and
/// writes prompts and results to `output`.
pub struct App<I, O> {
    engine: TrialStateMachine<StdRng>,
    source: Box<dyn StimulusSource>,
    events: Receiver<CheckEvent>,
    player: Option<String>,
    input: I,
    output: O,
}

impl<I: BufRead, O: Write> App<I, O> {
    pub fn new(settings: &AppSettings, input: I, output: O) -> Result<Self> {
        let config = settings.check_config()?;
        let stimuli = settings
            .stimuli
            .clone()
            .context("no stimulus pool given; pass --stimuli or set `stimuli` in the settings file")?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let engine = TrialStateMachine::new(config, rng);
        let mut engine = match &settings.cache_dir {
            Some(dir) => engine.with_cache(FileStorage::new(dir)),
            None => engine.with_cache(SessionStorage),
        };
        let (tx, events) = mpsc::channel();
        engine.subscribe(ChannelObserver::new(tx));

        Ok(Self {
            engine,
            source: Box::new(JsonFileSource::new(stimuli)),
            events,
            player: settings.player.clone(),
            input,
            output,
        })
    }

    pub fn run(&mut self) -> Result<Outcome> {
        writeln!(self.output, "=== HEADPHONE CHECK ===")?;
        self.engine.start()?;
        if self.engine.phase() == CheckPhase::AwaitingStimuli {
            self.engine.load_stimuli(self.source.as_mut())?;
        }
        self.report_events()?;
        if self.engine.phase() == CheckPhase::AwaitingStimuli {
            bail!("stimulus pool could not be loaded");
        }

        loop {
            match self.engine.phase() {
                CheckPhase::Calibrating => self.calibration_step()?,
                CheckPhase::Paging { .. } => {
                    let view = self.engine.present_page()?;
                    self.show_page(&view)?;
                }
                CheckPhase::AwaitingResponses { .. } => self.page_step()?,
                CheckPhase::Complete => break,
                phase => bail!("check stalled while {phase}"),
            }
            self.report_events()?;
        }

        let session = self.engine.session();
        let outcome = Outcome {
            did_pass: session.did_pass().unwrap_or(false),
            total_correct: session.total_correct().unwrap_or(0),
            trial_count: session.trial_count(),
        };
        writeln!(
            self.output,
            "\n{}: {} of {} correct",
            if outcome.did_pass { "PASS" } else { "FAIL" },
            outcome.total_correct,
            outcome.trial_count
        )?;
        Ok(outcome)
    }

    fn calibration_step(&mut self) -> Result<()> {
        let Some(command) = self.next_command("calibration")? else {
            return Ok(());
        };
        match command {
            Command::Play(None) => match self.engine.start_calibration_playback() {
                Ok(src) => self.play(&src)?,
                Err(refused) => writeln!(self.output, "{refused}")?,
            },
            Command::Continue => {
                self.engine.complete_calibration()?;
            }
            Command::Quit => bail!("check aborted"),
            _ => self.help()?,
        }
        Ok(())
    }

    fn page_step(&mut self) -> Result<()> {
        let Some(command) = self.next_command("answer")? else {
            return Ok(());
        };
        match command {
            Command::Play(Some(trial)) => match self.engine.start_playback(trial) {
                Ok(src) => self.play(&src)?,
                Err(refused) => writeln!(self.output, "{refused}")?,
            },
            Command::Respond { trial, answer } => {
                if let Err(refused) = self.engine.record_response(trial, answer) {
                    writeln!(self.output, "{refused}")?;
                }
            }
            Command::Continue => {
                self.engine.continue_page()?;
            }
            Command::Quit => bail!("check aborted"),
            Command::Play(None) | Command::Help => self.help()?,
        }
        Ok(())
    }

    fn next_command(&mut self, prompt: &str) -> Result<Option<Command>> {
        write!(self.output, "{prompt}> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input closed before the check completed");
        }
        match parse_command(&line) {
            Ok(command) => Ok(Some(command)),
            Err(message) => {
                writeln!(self.output, "{message}")?;
                Ok(None)
            }
        }
    }

    /// Plays through the external player when one is configured; otherwise
    /// only names the file.
    fn play(&mut self, src: &str) -> Result<()> {
        let mut player = self.player.as_deref().unwrap_or_default().split_whitespace();
        match player.next() {
            Some(program) => {
                info!(%src, program, "playing");
                match process::Command::new(program).args(player).arg(src).status() {
                    Ok(status) if status.success() => {}
                    Ok(status) => warn!(%status, "player exited unsuccessfully"),
                    Err(err) => warn!(error = %err, program, "player could not be started"),
                }
            }
            None => writeln!(self.output, "(playing {src})")?,
        }
        self.engine.finish_playback();
        Ok(())
    }

    fn show_page(&mut self, view: &PageView) -> Result<()> {
        writeln!(self.output, "\nPage {} of {}", view.page + 1, view.last_page)?;
        for trial in &view.trials {
            writeln!(self.output, "  [{}] {}", trial.index, trial.id)?;
        }
        writeln!(
            self.output,
            "`p <n>` plays trial n, `<n> <answer>` records an answer, `c` continues"
        )?;
        Ok(())
    }

    fn help(&mut self) -> Result<()> {
        writeln!(
            self.output,
            "commands: p [n] (play), <n> <answer> (respond), c (continue), q (quit)"
        )?;
        Ok(())
    }

    fn report_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                CheckEvent::StimuliLoadFailed { reason } => {
                    writeln!(self.output, "Could not load stimuli: {reason}")?
                }
                CheckEvent::CalibrationStarted { .. } => writeln!(
                    self.output,
                    "Calibration: `p` plays a noise, set a comfortable volume, then `c` to begin."
                )?,
                CheckEvent::ProgressRestored { page } => {
                    writeln!(self.output, "Resuming saved progress on page {}.", page + 1)?
                }
                CheckEvent::ResponsesMissing { missing, .. } => {
                    writeln!(self.output, "Answer trials {missing:?} before continuing.")?
                }
                CheckEvent::StorageUnavailable => writeln!(
                    self.output,
                    "Progress storage is unavailable; this run will not be saved."
                )?,
                CheckEvent::StoreFailed { reason } => warn!(%reason, "progress not saved"),
                other => debug!(event = other.name(), "check event"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    const POOL: &str = r#"{
        "stimuli": [
            {"id": 1, "src": "a.wav", "correct": 1},
            {"id": 2, "src": "b.wav", "correct": 1},
            {"id": 3, "src": "c.wav", "correct": 1},
            {"id": 4, "src": "d.wav", "correct": 1}
        ],
        "calibration": {"src": "calib.wav"}
    }"#;

    fn settings(pool: &Path) -> AppSettings {
        let mut settings = AppSettings {
            stimuli: Some(pool.to_path_buf()),
            seed: Some(3),
            ..AppSettings::default()
        };
        settings.check.total_trials = Some(3);
        settings.check.correct_threshold = Some(2.0);
        settings
    }

    fn run_script(settings: &AppSettings, script: &str) -> (Result<Outcome>, String) {
        let mut output = Vec::new();
        let result = App::new(settings, Cursor::new(script.to_string()), &mut output)
            .and_then(|mut app| app.run());
        (result, String::from_utf8(output).unwrap())
    }

    fn pool_file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        std::fs::write(&path, POOL).unwrap();
        (dir, path)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("p"), Ok(Command::Play(None)));
        assert_eq!(parse_command(" p 2 \n"), Ok(Command::Play(Some(2))));
        assert_eq!(
            parse_command("1 3"),
            Ok(Command::Respond {
                trial: 1,
                answer: "3".into()
            })
        );
        assert_eq!(parse_command("continue"), Ok(Command::Continue));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert!(parse_command("").is_err());
        assert!(parse_command("p x").is_err());
        assert!(parse_command("x y").is_err());
    }

    #[test]
    fn scripted_run_passes() {
        let (_dir, pool) = pool_file();
        let script = "p\nc\np 0\n0 1\np 1\n1 1\np 2\n2 1\nc\n";
        let (result, output) = run_script(&settings(&pool), script);

        assert_eq!(
            result.unwrap(),
            Outcome {
                did_pass: true,
                total_correct: 3,
                trial_count: 3
            }
        );
        assert!(output.contains("(playing calib.wav)"));
        assert!(output.contains("Page 1 of 1"));
        assert!(output.contains("PASS: 3 of 3 correct"));
    }

    #[test]
    fn wrong_answers_fail() {
        let (_dir, pool) = pool_file();
        let script = "c\np 0\n0 2\np 1\n1 1\np 2\n2 2\nc\n";
        let (result, output) = run_script(&settings(&pool), script);

        assert!(!result.unwrap().did_pass);
        assert!(output.contains("FAIL: 1 of 3 correct"));
    }

    #[test]
    fn refusals_are_shown_and_the_run_continues() {
        let (_dir, pool) = pool_file();
        let script = "c\nc\np 1\n0 1\np 0\n0 1\np 1\n1 1\np 2\n2 1\nc\n";
        let (result, output) = run_script(&settings(&pool), script);

        assert!(result.unwrap().did_pass);
        assert!(output.contains("Answer trials [0, 1, 2] before continuing."));
        assert!(output.contains("trial 0 must be answered before trial 1 can play"));
        assert!(output.contains("trial 0 must be played before it can be answered"));
    }

    #[test]
    fn closed_input_is_an_error() {
        let (_dir, pool) = pool_file();
        let (result, _) = run_script(&settings(&pool), "c\np 0\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("input closed"));
    }

    #[test]
    fn missing_pool_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (result, output) = run_script(&settings(&dir.path().join("absent.json")), "");
        assert!(result.is_err());
        assert!(output.contains("Could not load stimuli"));
    }

    #[test]
    fn progress_is_resumed_from_the_cache_dir() {
        let (dir, pool) = pool_file();
        let mut settings = settings(&pool);
        settings.cache_dir = Some(dir.path().join("cache"));
        settings.check.use_cache = Some(true);
        settings.check.total_trials = Some(4);
        settings.check.trials_per_page = Some(2);

        let first = "c\np 0\n0 1\np 1\n1 1\nc\n";
        let (result, _) = run_script(&settings, first);
        assert!(result.is_err());

        let second = "p 2\n2 1\np 3\n3 1\nc\n";
        let (result, output) = run_script(&settings, second);
        assert!(output.contains("Resuming saved progress on page 2."));
        assert_eq!(result.unwrap().total_correct, 4);
    }
}
