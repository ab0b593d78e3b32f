//! Crate-level behaviour tests.
//!
//! The engine is replaced by [`ScriptedEngine`], which replays records queued
//! by the scenario and optionally fails afterwards.

use lintbridge_engine::{
    AnalysisRequest, DiagnosticRecord, EngineError, RunReport, TextSpan,
};

use crate::sensor::EngineExecutor;


/// Executor replaying a fixed record sequence.
#[derive(Debug, Default)]
pub(crate) struct ScriptedEngine {
    records: Vec<DiagnosticRecord>,
    failure: Option<String>,
}

impl ScriptedEngine {
    pub(crate) fn push(&mut self, rule: &str, file: &str, line: u32) {
        self.records.push(DiagnosticRecord::new(
            rule,
            file,
            TextSpan::new(line, 0, line, 4),
            format!("{rule} on line {line}"),
        ));
    }

    pub(crate) fn fail_with(&mut self, stderr: &str) {
        self.failure = Some(stderr.to_owned());
    }
}

impl EngineExecutor for ScriptedEngine {
    fn execute(
        &self,
        _request: &AnalysisRequest,
        on_record: &mut dyn FnMut(DiagnosticRecord),
    ) -> Result<RunReport, EngineError> {
        self.records.iter().cloned().for_each(on_record);
        match &self.failure {
            Some(line) => Err(EngineError::NonZeroExit {
                status: 1,
                stderr: vec![line.clone()],
            }),
            None => Ok(RunReport::new(self.records.len(), Vec::new())),
        }
    }
}
