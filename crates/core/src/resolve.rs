use crate::record::ColumnRole;

/// A column proposed to the resolution channel, with the score it earned
/// during sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleCandidate {
    pub column: usize,
    pub name: String,
    pub confidence: f32,
}

/// A decision the pipeline cannot make on its own. The core emits these as
/// data and blocks on the answer; rendering them is the caller's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionRequest {
    /// No column scored above the role's confidence threshold.
    Role {
        role: ColumnRole,
        candidates: Vec<RoleCandidate>,
    },
    /// The target sheet already holds data and no write policy was given.
    WritePolicy { sheet: String, existing_rows: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Assign the role to this column.
    Column(usize),
    /// Leave the role unassigned.
    Skip,
    Overwrite,
    Append,
}

/// Answers resolution requests. The CLI provides a stdin implementation;
/// tests script the answers.
pub trait Resolver {
    fn resolve(&mut self, request: &ResolutionRequest) -> Resolution;
}

/// Replays a fixed list of answers in order, then skips. Useful for tests
/// and non-interactive runs.
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    answers: std::collections::VecDeque<Resolution>,
}

impl ScriptedResolver {
    pub fn new(answers: impl IntoIterator<Item = Resolution>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    /// Resolver that skips every role request and appends on write-policy
    /// requests; the conservative unattended default.
    pub fn unattended() -> Self {
        Self::default()
    }
}

impl Resolver for ScriptedResolver {
    fn resolve(&mut self, request: &ResolutionRequest) -> Resolution {
        match self.answers.pop_front() {
            Some(answer) => answer,
            None => match request {
                ResolutionRequest::Role { .. } => Resolution::Skip,
                ResolutionRequest::WritePolicy { .. } => Resolution::Append,
            },
        }
    }
}
