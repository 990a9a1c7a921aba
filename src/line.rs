//! Formatted trace lines and the stdout throttling policy ("quiet mode").

/// The kind of a decoded line, controlling downstream routing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// An ordinary trace record line.
    Reg,
    /// Informational; never forwarded to the back-end.
    Inf,
    /// An error; always visible regardless of quiet mode.
    Err,
    /// An application user-record line.
    Usr,
    /// A warning (bad checksum, lost records, ...); always visible.
    Warn,
    /// An acknowledgement of a command sent to the target.
    Ack,
}

impl LineKind {
    /// ERR/WARN/INF/USR always print; only REG is subject to quiet mode.
    pub fn always_visible(self) -> bool {
        !matches!(self, LineKind::Reg)
    }
}

/// One formatted output line, ready for fan-out to sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    /// Routing-relevant kind.
    pub kind: LineKind,
    /// The full formatted text, including the leading timestamp field.
    pub text: String,
}

impl DecodedLine {
    /// Builds a new decoded line.
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        DecodedLine {
            kind,
            text: text.into(),
        }
    }
}

/// Stdout throttling policy. `-1` is off (print everything); `0` suppresses
/// all REG lines, printing a dot per dropped line instead; `n > 0` prints
/// one REG line every `n` and suppresses the rest with dots. ERR/WARN/INF/
/// USR always print regardless of this setting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuietMode {
    current: i32,
    saved: i32,
    reg_count: u64,
}

impl Default for QuietMode {
    fn default() -> Self {
        QuietMode {
            current: -1,
            saved: 0,
            reg_count: 0,
        }
    }
}

/// What to do with a REG line under the current quiet-mode setting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegAction {
    /// Print the line in full.
    Print,
    /// Print a single dot in its place.
    Dot,
}

impl QuietMode {
    /// Builds quiet mode at the given starting value (`-1` means off).
    pub fn new(n: i32) -> Self {
        QuietMode {
            current: n,
            saved: if n > 0 { n } else { 0 },
            reg_count: 0,
        }
    }

    /// The current numeric setting.
    pub fn value(&self) -> i32 {
        self.current
    }

    /// Decides whether a REG line should print or become a dot, and
    /// advances the internal counter. Non-REG lines never call this.
    pub fn classify_reg(&mut self) -> RegAction {
        match self.current {
            -1 => RegAction::Print,
            0 => RegAction::Dot,
            n => {
                self.reg_count += 1;
                if self.reg_count % n as u64 == 1 {
                    RegAction::Print
                } else {
                    RegAction::Dot
                }
            }
        }
    }

    /// `q` keystroke: cycles `-1 -> 0 -> saved value -> -1`.
    pub fn toggle(&mut self) {
        self.current = match self.current {
            -1 => 0,
            0 => {
                if self.saved > 0 {
                    self.saved
                } else {
                    -1
                }
            }
            n => {
                self.saved = n;
                -1
            }
        };
        self.reg_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_always_prints() {
        let mut q = QuietMode::new(-1);
        for _ in 0..5 {
            assert_eq!(q.classify_reg(), RegAction::Print);
        }
    }

    #[test]
    fn zero_always_dots() {
        let mut q = QuietMode::new(0);
        for _ in 0..5 {
            assert_eq!(q.classify_reg(), RegAction::Dot);
        }
    }

    #[test]
    fn n_prints_every_nth() {
        let mut q = QuietMode::new(3);
        let got: Vec<RegAction> = (0..10).map(|_| q.classify_reg()).collect();
        // records 1,4,7,10 (1-indexed) print; the rest dot.
        let expected = vec![
            RegAction::Print,
            RegAction::Dot,
            RegAction::Dot,
            RegAction::Print,
            RegAction::Dot,
            RegAction::Dot,
            RegAction::Print,
            RegAction::Dot,
            RegAction::Dot,
            RegAction::Print,
        ];
        assert_eq!(got, expected);
    }

    #[test]
    fn toggle_round_trips() {
        let mut q = QuietMode::new(-1);
        q.toggle();
        assert_eq!(q.value(), 0);

        // 0 -> saved value; with nothing saved yet, falls back to -1.
        q.toggle();
        assert_eq!(q.value(), -1);
    }

    #[test]
    fn toggle_remembers_saved_value() {
        let mut q = QuietMode::new(3);
        q.toggle(); // 3 -> -1, saved becomes 3
        assert_eq!(q.value(), -1);
        q.toggle(); // -1 -> 0
        assert_eq!(q.value(), 0);
        q.toggle(); // 0 -> saved (3)
        assert_eq!(q.value(), 3);
    }

    #[test]
    fn err_and_warn_always_visible() {
        assert!(LineKind::Err.always_visible());
        assert!(LineKind::Warn.always_visible());
        assert!(LineKind::Inf.always_visible());
        assert!(LineKind::Usr.always_visible());
        assert!(!LineKind::Reg.always_visible());
    }
}
