//! Option configuration. Resolves without talking to the engine.

use crate::engine::options::ConfigMapping;
use crate::session::{Command, Completion, Effects, Session};

#[derive(Debug)]
pub struct ConfigureCommand {
    options: ConfigMapping,
    finished: bool,
    completion: Completion<()>,
}

impl ConfigureCommand {
    #[must_use]
    pub fn new(options: ConfigMapping) -> Self {
        ConfigureCommand {
            options,
            finished: false,
            completion: Completion::Pending,
        }
    }
}

impl Command for ConfigureCommand {
    type Output = ();

    fn start(&mut self, session: &mut Session, _fx: &mut Effects) {
        match session.configure(&self.options) {
            Ok(()) => self.completion.set_result(()),
            Err(err) => self.completion.set_error(err),
        };
        self.finished = true;
    }

    fn line_received(&mut self, _session: &mut Session, _line: &str, _fx: &mut Effects) {}

    fn completion(&mut self) -> &mut Completion<()> {
        &mut self.completion
    }

    fn finish(&mut self) {
        self.finished = true;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
