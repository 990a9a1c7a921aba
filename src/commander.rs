//! Maps one-character keystrokes to Spy actions (§4.9). Pure translation:
//! the event loop is the one that actually sends commands, toggles sinks,
//! or exits.

const ESC: u8 = 0x1B;

/// Which named sink an `o/s/b/m/g` keystroke toggles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// `o`: the text output sink.
    Text,
    /// `s`: the raw binary capture sink.
    Binary,
    /// `b`: the back-end UDP socket.
    BackEnd,
    /// `m`: the Matlab numeric-row sink.
    Matlab,
    /// `g`: the sequence-diagram sink.
    Sequence,
}

/// The action one keystroke maps to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// `h`: print the help banner.
    Help,
    /// `c`: clear the screen.
    Clear,
    /// `q`: cycle quiet mode.
    ToggleQuiet,
    /// `r`: send a RESET command.
    SendReset,
    /// `i`: send an INFO command.
    SendInfo,
    /// `t`/`u`: send a TICK command at the given rate (0 or 1).
    SendTick(u8),
    /// `d`: persist the dictionaries to disk.
    PersistDictionaries,
    /// `o/s/b/m/g`: toggle the named sink.
    ToggleSink(SinkKind),
    /// `x`/`X`/Esc: quit.
    Quit,
    /// Any other byte: print the help banner, same as `h`.
    Unknown,
}

/// Translates one keystroke byte into an [`Action`].
pub fn action_for(key: u8) -> Action {
    match key {
        b'h' => Action::Help,
        b'c' => Action::Clear,
        b'q' => Action::ToggleQuiet,
        b'r' => Action::SendReset,
        b'i' => Action::SendInfo,
        b't' => Action::SendTick(0),
        b'u' => Action::SendTick(1),
        b'd' => Action::PersistDictionaries,
        b'o' => Action::ToggleSink(SinkKind::Text),
        b's' => Action::ToggleSink(SinkKind::Binary),
        b'b' => Action::ToggleSink(SinkKind::BackEnd),
        b'm' => Action::ToggleSink(SinkKind::Matlab),
        b'g' => Action::ToggleSink(SinkKind::Sequence),
        b'x' | b'X' | ESC => Action::Quit,
        _ => Action::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_keys() {
        for k in [b'x', b'X', ESC] {
            assert_eq!(action_for(k), Action::Quit);
        }
    }

    #[test]
    fn tick_rates() {
        assert_eq!(action_for(b't'), Action::SendTick(0));
        assert_eq!(action_for(b'u'), Action::SendTick(1));
    }

    #[test]
    fn sink_toggles() {
        assert_eq!(action_for(b'o'), Action::ToggleSink(SinkKind::Text));
        assert_eq!(action_for(b's'), Action::ToggleSink(SinkKind::Binary));
        assert_eq!(action_for(b'b'), Action::ToggleSink(SinkKind::BackEnd));
        assert_eq!(action_for(b'm'), Action::ToggleSink(SinkKind::Matlab));
        assert_eq!(action_for(b'g'), Action::ToggleSink(SinkKind::Sequence));
    }

    #[test]
    fn unknown_key_prints_help() {
        assert_eq!(action_for(b'z'), Action::Unknown);
    }
}
