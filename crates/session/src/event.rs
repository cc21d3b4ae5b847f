/// Input the UI collaborator forwards to a session's `handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Country selector changed; `None` clears the selection.
    CountryChanged(Option<String>),
    LevelToggled(u8),
    LevelSelected(u8),
    Reset,
}
