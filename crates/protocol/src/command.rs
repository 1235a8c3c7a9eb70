//! Control-plane command vocabulary
//!
//! Commands are a closed set; a subtype that is not recognised is kept
//! as [`CommandKind::Unknown`] so the dispatcher can ignore it without
//! failing (rolling upgrades may introduce commands this build does not
//! know).

/// A parsed command subtype
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Shutdown,
    CleanedShutdown,
    GetStatus,
    Start,
    Stop,
    StartProcessing,
    StopProcessing,
    StartData,
    StopData,
    Reset,
    /// Unrecognised subtype, preserved for logging
    Unknown(String),
}

impl CommandKind {
    /// Parse a wire subtype
    pub fn parse(subtype: &str) -> Self {
        match subtype {
            "shutdown" => CommandKind::Shutdown,
            "cleanedshutdown" => CommandKind::CleanedShutdown,
            "getstatus" => CommandKind::GetStatus,
            "start" => CommandKind::Start,
            "stop" => CommandKind::Stop,
            "startprocessing" => CommandKind::StartProcessing,
            "stopprocessing" => CommandKind::StopProcessing,
            "startdata" => CommandKind::StartData,
            "stopdata" => CommandKind::StopData,
            "reset" => CommandKind::Reset,
            other => CommandKind::Unknown(other.to_string()),
        }
    }

    /// Wire name of the command
    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Shutdown => "shutdown",
            CommandKind::CleanedShutdown => "cleanedshutdown",
            CommandKind::GetStatus => "getstatus",
            CommandKind::Start => "start",
            CommandKind::Stop => "stop",
            CommandKind::StartProcessing => "startprocessing",
            CommandKind::StopProcessing => "stopprocessing",
            CommandKind::StartData => "startdata",
            CommandKind::StopData => "stopdata",
            CommandKind::Reset => "reset",
            CommandKind::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
