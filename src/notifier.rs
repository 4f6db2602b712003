//! Logging and progress output for a conversion run.
//!
//! [`Notifier`] puts `env_logger` (text logs) and an `indicatif` spinner behind one
//! verbosity switch:
//! - [`VerbosityLevel::Quiet`] → a live spinner showing the current stage; warnings
//!   are printed above it.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] →
//!   plain log lines, no spinner.

use env_logger::Env;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Record};
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Spinner, warnings only
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    logger: env_logger::Logger,
    multi_progress: Option<MultiProgress>,
    active_spinner: RefCell<Option<ProgressBar>>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);

        let logger = env_logger::Builder::from_env(Env::default())
            .filter_level(verbosity.to_log_level())
            .build();

        let multi_progress = if verbosity == VerbosityLevel::Quiet {
            Some(MultiProgress::new())
        } else {
            None
        };

        Self {
            verbosity,
            logger,
            multi_progress,
            active_spinner: RefCell::new(None),
        }
    }

    fn log(&self, level: Level, message: &str) {
        self.logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target(module_path!())
                .build(),
        );
    }

    /// Reports the stage the run is in.
    pub fn info(&self, message: &str) {
        match &self.multi_progress {
            Some(multi_progress) => {
                if self.active_spinner.borrow().is_none() {
                    let spinner = multi_progress.add(ProgressBar::new_spinner());
                    if let Ok(style) =
                        ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
                    {
                        spinner.set_style(style);
                    }
                    spinner.enable_steady_tick(Duration::from_millis(100));
                    *self.active_spinner.borrow_mut() = Some(spinner);
                }

                if let Some(spinner) = self.active_spinner.borrow().as_ref() {
                    spinner.set_message(message.to_string());
                }
            }
            None => self.log(Level::Info, message),
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.log(Level::Debug, message);
        }
    }

    pub fn trace(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.log(Level::Trace, message);
        }
    }

    /// Warnings are shown at every verbosity.
    pub fn warn(&self, message: &str) {
        match &self.multi_progress {
            Some(multi_progress) => {
                let _ = multi_progress.println(format!("warning: {}", message));
            }
            None => self.log(Level::Warn, message),
        }
    }

    /// Stops the spinner, leaving `message` as its last line.
    pub fn finish(&self, message: &str) {
        match self.active_spinner.borrow_mut().take() {
            Some(spinner) => spinner.finish_with_message(message.to_string()),
            None => self.log(Level::Info, message),
        }
    }

    /// Removes the spinner without a closing message, e.g. when the run failed.
    pub fn abandon(&self) {
        if let Some(spinner) = self.active_spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        self.verbosity
    }
}
