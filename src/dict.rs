//! Five independent maps translating numeric identifiers into symbolic
//! names. Mutated only by the Interpreter, from inside the event loop.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use log::warn;

use crate::error::SpyError;

/// Which of the five dictionaries a key belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DictKind {
    /// Active-object (or generic) pointer.
    Object,
    /// State-handler function pointer.
    Function,
    /// A signal, scoped to the active object it was posted to.
    Signal,
    /// An application-defined user record id.
    UserRecord,
    /// A value within a named enum group.
    EnumGroup(u8),
}

/// The key within a dictionary kind. Objects and functions are keyed by a
/// target-width pointer widened to `u64`; signals by `(signal, object)`;
/// user records by a single byte; enum values by `(group, value)` (the
/// group is folded into [`DictKind::EnumGroup`], so the key here is just
/// the value).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    /// A pointer-sized key, for [`DictKind::Object`]/[`DictKind::Function`].
    Ptr(u64),
    /// `(signal id, active-object pointer)`, for [`DictKind::Signal`].
    Signal(u16, u64),
    /// A record id, for [`DictKind::UserRecord`].
    Record(u8),
    /// A value within an enum group, for [`DictKind::EnumGroup`].
    EnumValue(u8),
}

/// One dictionary entry, as round-tripped through the text serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// Which dictionary this entry belongs to.
    pub kind: DictKind,
    /// The key within that dictionary.
    pub key: DictKey,
    /// The symbolic name.
    pub name: String,
}

/// The five dictionaries, process-wide state for one Spy session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionaries {
    objects: HashMap<u64, String>,
    functions: HashMap<u64, String>,
    signals: HashMap<(u16, u64), String>,
    user_records: HashMap<u8, String>,
    enums: HashMap<(u8, u8), String>,
}

impl Dictionaries {
    /// An empty set of dictionaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry.
    pub fn set(&mut self, kind: DictKind, key: DictKey, name: impl Into<String>) {
        let name = name.into();
        match (kind, key) {
            (DictKind::Object, DictKey::Ptr(p)) => {
                self.objects.insert(p, name);
            }
            (DictKind::Function, DictKey::Ptr(p)) => {
                self.functions.insert(p, name);
            }
            (DictKind::Signal, DictKey::Signal(sig, obj)) => {
                self.signals.insert((sig, obj), name);
            }
            (DictKind::UserRecord, DictKey::Record(id)) => {
                self.user_records.insert(id, name);
            }
            (DictKind::EnumGroup(group), DictKey::EnumValue(value)) => {
                self.enums.insert((group, value), name);
            }
            (kind, key) => {
                warn!("dictionary set: key {key:?} does not match kind {kind:?}, ignored");
            }
        }
    }

    /// Looks up a name. There is never a lookup failure that aborts
    /// processing: callers render the hex literal on `None`.
    pub fn lookup(&self, kind: DictKind, key: DictKey) -> Option<&str> {
        match (kind, key) {
            (DictKind::Object, DictKey::Ptr(p)) => self.objects.get(&p),
            (DictKind::Function, DictKey::Ptr(p)) => self.functions.get(&p),
            (DictKind::Signal, DictKey::Signal(sig, obj)) => self.signals.get(&(sig, obj)),
            (DictKind::UserRecord, DictKey::Record(id)) => self.user_records.get(&id),
            (DictKind::EnumGroup(group), DictKey::EnumValue(value)) => {
                self.enums.get(&(group, value))
            }
            _ => None,
        }
        .map(String::as_str)
    }

    /// Clears every map. Triggered by a dictionary-reset trace record.
    pub fn reset(&mut self) {
        self.objects.clear();
        self.functions.clear();
        self.signals.clear();
        self.user_records.clear();
        self.enums.clear();
    }

    /// Iterates every entry, in an unspecified but stable-within-a-call
    /// order, for serialization.
    fn entries(&self) -> Vec<DictionaryEntry> {
        let mut out = Vec::new();
        for (&p, name) in &self.objects {
            out.push(DictionaryEntry {
                kind: DictKind::Object,
                key: DictKey::Ptr(p),
                name: name.clone(),
            });
        }
        for (&p, name) in &self.functions {
            out.push(DictionaryEntry {
                kind: DictKind::Function,
                key: DictKey::Ptr(p),
                name: name.clone(),
            });
        }
        for (&(sig, obj), name) in &self.signals {
            out.push(DictionaryEntry {
                kind: DictKind::Signal,
                key: DictKey::Signal(sig, obj),
                name: name.clone(),
            });
        }
        for (&id, name) in &self.user_records {
            out.push(DictionaryEntry {
                kind: DictKind::UserRecord,
                key: DictKey::Record(id),
                name: name.clone(),
            });
        }
        for (&(group, value), name) in &self.enums {
            out.push(DictionaryEntry {
                kind: DictKind::EnumGroup(group),
                key: DictKey::EnumValue(value),
                name: name.clone(),
            });
        }
        out
    }

    /// Writes every entry as one line per entry: `kind,key(hex),name`.
    pub fn serialize(&self, w: &mut impl Write) -> Result<(), SpyError> {
        writeln!(w, "# tracespy dictionary v1").map_err(SpyError::DictIo)?;
        for entry in self.entries() {
            let line = format_entry(&entry);
            writeln!(w, "{line}").map_err(SpyError::DictIo)?;
        }
        Ok(())
    }

    /// Reads entries previously written by [`Dictionaries::serialize`].
    /// Tolerant: malformed lines are skipped with a WARN, and the header
    /// line (if present) is ignored. Replaces the current contents of
    /// `self` with what was read, matching "dictionaries ... persisted on
    /// demand (write) and reloaded on demand (read)".
    pub fn deserialize(&mut self, r: &mut impl BufRead) -> Result<(), SpyError> {
        let mut fresh = Dictionaries::new();

        for line in r.lines() {
            let line = line.map_err(SpyError::DictIo)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_entry(line) {
                Some(entry) => fresh.set(entry.kind, entry.key, entry.name),
                None => warn!("skipping malformed dictionary line: {line:?}"),
            }
        }

        *self = fresh;
        Ok(())
    }
}

fn kind_tag(kind: DictKind) -> String {
    match kind {
        DictKind::Object => "object".to_string(),
        DictKind::Function => "function".to_string(),
        DictKind::Signal => "signal".to_string(),
        DictKind::UserRecord => "user_record".to_string(),
        DictKind::EnumGroup(g) => format!("enum_group:{g:02X}"),
    }
}

fn format_entry(entry: &DictionaryEntry) -> String {
    let kind = kind_tag(entry.kind);
    match entry.key {
        DictKey::Ptr(p) => format!("{kind},0x{p:X},{}", entry.name),
        DictKey::Signal(sig, obj) => format!("{kind},0x{sig:X}:0x{obj:X},{}", entry.name),
        DictKey::Record(id) => format!("{kind},0x{id:X},{}", entry.name),
        DictKey::EnumValue(v) => format!("{kind},0x{v:X},{}", entry.name),
    }
}

fn parse_entry(line: &str) -> Option<DictionaryEntry> {
    let mut parts = line.splitn(3, ',');
    let kind_str = parts.next()?;
    let key_str = parts.next()?;
    let name = parts.next()?.to_string();

    let kind = if kind_str == "object" {
        DictKind::Object
    } else if kind_str == "function" {
        DictKind::Function
    } else if kind_str == "signal" {
        DictKind::Signal
    } else if kind_str == "user_record" {
        DictKind::UserRecord
    } else if let Some(g) = kind_str.strip_prefix("enum_group:") {
        DictKind::EnumGroup(u8::from_str_radix(g, 16).ok()?)
    } else {
        return None; // unknown kind: skipped, per spec
    };

    let key = match kind {
        DictKind::Signal => {
            let (sig_str, obj_str) = key_str.split_once(':')?;
            let sig = u16::from_str_radix(sig_str.strip_prefix("0x")?, 16).ok()?;
            let obj = u64::from_str_radix(obj_str.strip_prefix("0x")?, 16).ok()?;
            DictKey::Signal(sig, obj)
        }
        DictKind::UserRecord => DictKey::Record(u8::from_str_radix(
            key_str.strip_prefix("0x")?,
            16,
        )
        .ok()?),
        DictKind::EnumGroup(_) => {
            DictKey::EnumValue(u8::from_str_radix(key_str.strip_prefix("0x")?, 16).ok()?)
        }
        DictKind::Object | DictKind::Function => {
            DictKey::Ptr(u64::from_str_radix(key_str.strip_prefix("0x")?, 16).ok()?)
        }
    };

    Some(DictionaryEntry { kind, key, name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{BufReader, Cursor};

    #[test]
    fn set_then_lookup() {
        let mut d = Dictionaries::new();
        d.set(DictKind::Object, DictKey::Ptr(0xDEADBEEF), "AO_Blinky");
        assert_eq!(
            d.lookup(DictKind::Object, DictKey::Ptr(0xDEADBEEF)),
            Some("AO_Blinky")
        );
    }

    #[test]
    fn lookup_miss_returns_none() {
        let d = Dictionaries::new();
        assert_eq!(d.lookup(DictKind::Object, DictKey::Ptr(1)), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut d = Dictionaries::new();
        d.set(DictKind::Object, DictKey::Ptr(1), "a");
        d.set(DictKind::Signal, DictKey::Signal(1, 2), "SIG");
        d.reset();
        assert_eq!(d.lookup(DictKind::Object, DictKey::Ptr(1)), None);
        assert_eq!(d.lookup(DictKind::Signal, DictKey::Signal(1, 2)), None);
    }

    #[test]
    fn round_trips_through_serialize_deserialize() {
        let mut d = Dictionaries::new();
        d.set(DictKind::Object, DictKey::Ptr(0xDEADBEEF), "AO_Blinky");
        d.set(DictKind::Function, DictKey::Ptr(0x0800_1234), "Blinky_on");
        d.set(DictKind::Signal, DictKey::Signal(10, 0xDEADBEEF), "TIMEOUT_SIG");
        d.set(DictKind::UserRecord, DictKey::Record(100), "APP_LOG");
        d.set(DictKind::EnumGroup(3), DictKey::EnumValue(1), "RUNNING");

        let mut buf = Vec::new();
        d.serialize(&mut buf).unwrap();

        let mut d2 = Dictionaries::new();
        let mut reader = BufReader::new(Cursor::new(buf));
        d2.deserialize(&mut reader).unwrap();

        assert_eq!(d, d2);
    }

    #[test_log::test]
    fn deserialize_skips_malformed_lines() {
        let text = "object,0xDEADBEEF,AO_Blinky\nthis is garbage\nfunction,0xAA,on\n";
        let mut d = Dictionaries::new();
        let mut reader = BufReader::new(Cursor::new(text.as_bytes()));
        d.deserialize(&mut reader).unwrap();

        assert_eq!(
            d.lookup(DictKind::Object, DictKey::Ptr(0xDEADBEEF)),
            Some("AO_Blinky")
        );
        assert_eq!(d.lookup(DictKind::Function, DictKey::Ptr(0xAA)), Some("on"));
    }

    #[test]
    fn deserialize_skips_unknown_kind() {
        let text = "mystery,0x1,thing\n";
        let mut d = Dictionaries::new();
        let mut reader = BufReader::new(Cursor::new(text.as_bytes()));
        d.deserialize(&mut reader).unwrap();
        assert_eq!(d, Dictionaries::new());
    }
}
