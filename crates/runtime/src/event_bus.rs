use foundation::Generation;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    /// Recoverable failure of a single action (query, fetch).
    Error,
    /// Failure that blocks further interaction until reload.
    Fatal,
}

/// User-facing notice emitted by a state transition.
///
/// The UI collaborator drains these after every action; nothing in the core
/// reads them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub generation: Generation,
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct NoticeBus {
    notices: Vec<Notice>,
}

impl NoticeBus {
    pub fn new() -> Self {
        Self {
            notices: Vec::new(),
        }
    }

    pub fn emit(&mut self, generation: Generation, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(Notice {
            generation,
            kind,
            message: message.into(),
        });
    }

    pub fn info(&mut self, generation: Generation, message: impl Into<String>) {
        self.emit(generation, NoticeKind::Info, message);
    }

    pub fn error(&mut self, generation: Generation, message: impl Into<String>) {
        self.emit(generation, NoticeKind::Error, message);
    }

    pub fn fatal(&mut self, generation: Generation, message: impl Into<String>) {
        self.emit(generation, NoticeKind::Fatal, message);
    }

    pub fn has_fatal(&self) -> bool {
        self.notices.iter().any(|n| n.kind == NoticeKind::Fatal)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn has_errors(&self) -> bool {
        self.notices
            .iter()
            .any(|n| matches!(n.kind, NoticeKind::Error | NoticeKind::Fatal))
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
