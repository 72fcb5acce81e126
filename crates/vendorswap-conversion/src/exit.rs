/// Process exit codes; automation tells "did not start" apart from "started
/// and was undone" by these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Failure,
    Inhibited,
    RolledBack,
    FatalConfiguration,
    PartialRollback,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Inhibited => 2,
            Self::RolledBack => 3,
            Self::FatalConfiguration => 4,
            Self::PartialRollback => 5,
        }
    }
}
