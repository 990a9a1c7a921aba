//! Consumes one decoded frame, updates [`Dictionaries`], and produces a
//! formatted [`DecodedLine`] plus the structured side effects the Matlab
//! and sequence-diagram sinks need.
//!
//! Dispatch is a table from record-type byte to group, built once (see
//! [`crate::record::classify`]); the per-group decode logic lives in the
//! methods below, one per group, which keeps each group's wire layout
//! testable on its own.

use std::collections::HashSet;
use std::time::SystemTime;

use log::warn;

use crate::config::{Config, Width, WidthField};
use crate::dict::{DictKey, DictKind, Dictionaries};
use crate::error::SpyError;
use crate::line::{DecodedLine, LineKind};
use crate::reader::RecordReader;
use crate::record::{
    self, ActiveObjectRecord, DictionaryRecord, MemoryPoolRecord, RecordGroup, SchedulerRecord,
    SessionRecord, StateMachineRecord, TimeEventRecord, ASSERTION_RECORD_ID,
};

const NAME_COLUMN_WIDTH: usize = 14;

/// Everything one call to [`Interpreter::process`] produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreted {
    /// The formatted line, ready for [`crate::router::OutputRouter`].
    pub line: DecodedLine,
    /// A numeric row for the Matlab sink, if one is open. Present for
    /// every successfully parsed record.
    pub matlab_row: Option<Vec<u64>>,
    /// A sequence-diagram line, if the sequence sink is open and the
    /// record's active object is in the configured `seq_list`.
    pub sequence_line: Option<String>,
}

/// Decodes trace records and maintains the running dictionaries, sequence
/// counter, and last-known target time.
#[derive(Debug)]
pub struct Interpreter {
    config: Config,
    dict: Dictionaries,
    expected_rx_seq: Option<u8>,
    records_lost: u64,
    last_target_time: u64,
    seq_list: HashSet<u64>,
}

impl Interpreter {
    /// Builds an interpreter over the given config and starting
    /// dictionaries.
    pub fn new(config: Config, dict: Dictionaries) -> Self {
        Interpreter {
            config,
            dict,
            expected_rx_seq: None,
            records_lost: 0,
            last_target_time: 0,
            seq_list: HashSet::new(),
        }
    }

    /// The active configuration (mutable, since a target-info record can
    /// override it).
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The live dictionaries (for persistence on the `d` keystroke).
    pub fn dictionaries(&self) -> &Dictionaries {
        &self.dict
    }

    /// Mutable access, e.g. to reload from a dictionary file at startup.
    pub fn dictionaries_mut(&mut self) -> &mut Dictionaries {
        &mut self.dict
    }

    /// Total count of records lost to sequence gaps so far.
    pub fn records_lost(&self) -> u64 {
        self.records_lost
    }

    /// Sets the set of active-object pointers the sequence sink cares
    /// about (the `-g` flag's object list).
    pub fn set_seq_list(&mut self, objs: impl IntoIterator<Item = u64>) {
        self.seq_list = objs.into_iter().collect();
    }

    /// Checks the frame's sequence number against the expected next value,
    /// returning a WARN line if a gap was detected. `None` on the very
    /// first record (nothing to compare against yet) or a gap of exactly
    /// one record (in-order delivery, the deltas match and it's silent).
    fn check_seq(&mut self, seq: u8) -> Option<DecodedLine> {
        let warn_line = match self.expected_rx_seq {
            None => None,
            Some(expected) => {
                let lost = seq.wrapping_sub(expected);
                if lost == 0 {
                    None
                } else {
                    self.records_lost += lost as u64;
                    Some(DecodedLine::new(
                        LineKind::Warn,
                        format!("Records lost: {lost}"),
                    ))
                }
            }
        };

        self.expected_rx_seq = Some(seq.wrapping_add(1));
        warn_line
    }

    /// Processes one decoded frame (type + seq + payload, checksum already
    /// stripped by the Framer). Returns the sequence-gap warning (if any)
    /// alongside the record's own interpretation, since both are side
    /// effects of receiving this one frame and must be emitted together,
    /// in order, before the next frame is processed.
    pub fn process(&mut self, frame: &[u8]) -> Result<(Option<DecodedLine>, Interpreted), SpyError> {
        if frame.len() < 2 {
            return Err(SpyError::Parse("frame shorter than type+seq header".into()));
        }

        let ty = frame[0];
        let seq = frame[1];
        let payload = &frame[2..];
        let seq_warning = self.check_seq(seq);

        let group = record::classify(ty);
        let interpreted = match group {
            RecordGroup::Session => self.decode_session(ty, payload)?,
            RecordGroup::Dictionary => self.decode_dictionary(ty, payload)?,
            RecordGroup::StateMachine => self.decode_state_machine(ty, payload)?,
            RecordGroup::ActiveObject => self.decode_active_object(ty, payload)?,
            RecordGroup::TimeEvent => self.decode_time_event(ty, payload)?,
            RecordGroup::MemoryPool => self.decode_memory_pool(ty, payload)?,
            RecordGroup::Scheduler => self.decode_scheduler(ty, payload)?,
            RecordGroup::User => self.decode_user(ty, payload)?,
            RecordGroup::Assertion => self.decode_assertion(payload)?,
            RecordGroup::Unknown => {
                return Err(SpyError::Parse(format!("unknown record type {ty}")));
            }
        };

        Ok((seq_warning, interpreted))
    }

    fn reader<'a>(&self, payload: &'a [u8]) -> RecordReader<'a> {
        RecordReader::new(payload, self.config.endianness)
    }

    fn fmt_ts(&mut self, ts: u64) -> String {
        self.last_target_time = ts;
        let digits = match self.config.timestamp_size {
            Width::W1 => 3,
            Width::W2 => 5,
            Width::W4 => 10,
            Width::W8 => 20,
        };
        format!("{ts:0digits$}")
    }

    fn fmt_name(name: &str) -> String {
        format!("{name:<NAME_COLUMN_WIDTH$}")
    }

    fn render_ptr(&self, kind: DictKind, key: DictKey, value: u64, width: Width) -> String {
        match self.dict.lookup(kind, key) {
            Some(name) => name.to_string(),
            None => format!("0x{value:0w$X}", w = width.bytes() * 2),
        }
    }

    fn render_signal(&self, sig: u16, obj: u64) -> String {
        match self.dict.lookup(DictKind::Signal, DictKey::Signal(sig, obj)) {
            Some(name) => name.to_string(),
            None => format!("0x{sig:04X}"),
        }
    }

    // ---- Session records (group 1) ----

    fn decode_session(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = SessionRecord::from_id(ty).expect("classified as Session");
        let ts = self.last_target_time;
        let ts_text = self.fmt_ts(ts);

        let text = match rec {
            SessionRecord::Empty => format!("{ts_text} {}", Self::fmt_name(rec.name())),
            SessionRecord::Reset => {
                self.dict.reset();
                format!("{ts_text} {}", Self::fmt_name(rec.name()))
            }
            SessionRecord::VersionAnnounce => {
                let mut r = self.reader(payload);
                let version = r.u16()?;
                self.config.protocol_version = version;
                format!("{ts_text} {}{version}", Self::fmt_name(rec.name()))
            }
            SessionRecord::TargetInfo => {
                let mut r = self.reader(payload);
                let ts_w = Width::from_bytes_for_field(WidthField::Timestamp, r.u8()?)?;
                let obj_w = Width::from_bytes_for_field(WidthField::ObjPtr, r.u8()?)?;
                let fun_w = Width::from_bytes_for_field(WidthField::FunPtr, r.u8()?)?;
                let sig_w = Width::from_bytes_for_field(WidthField::Sig, r.u8()?)?;
                self.config.timestamp_size = ts_w;
                self.config.obj_ptr_size = obj_w;
                self.config.fun_ptr_size = fun_w;
                self.config.sig_size = sig_w;
                format!(
                    "{ts_text} {}ts={} obj={} fun={} sig={}",
                    Self::fmt_name(rec.name()),
                    ts_w.bytes(),
                    obj_w.bytes(),
                    fun_w.bytes(),
                    sig_w.bytes()
                )
            }
            SessionRecord::TargetDone => format!("{ts_text} {}", Self::fmt_name(rec.name())),
        };

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Inf, text),
            matlab_row: Some(vec![ts, ty as u64]),
            sequence_line: None,
        })
    }

    // ---- Dictionary records (group 2) ----

    fn decode_dictionary(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = DictionaryRecord::from_id(ty).expect("classified as Dictionary");
        let ts = self.last_target_time;
        let ts_text = self.fmt_ts(ts);
        let mut r = self.reader(payload);

        let detail = match rec {
            DictionaryRecord::ObjectDict => {
                let key = r.width(self.config.obj_ptr_size)?;
                let name = r.cstr()?;
                self.dict.set(DictKind::Object, DictKey::Ptr(key), name.clone());
                format!("0x{key:X} -> {name}")
            }
            DictionaryRecord::FunctionDict => {
                let key = r.width(self.config.fun_ptr_size)?;
                let name = r.cstr()?;
                self.dict
                    .set(DictKind::Function, DictKey::Ptr(key), name.clone());
                format!("0x{key:X} -> {name}")
            }
            DictionaryRecord::SignalDict => {
                let sig = r.width(self.config.sig_size)? as u16;
                let obj = r.width(self.config.obj_ptr_size)?;
                let name = r.cstr()?;
                self.dict
                    .set(DictKind::Signal, DictKey::Signal(sig, obj), name.clone());
                format!("0x{sig:X}:0x{obj:X} -> {name}")
            }
            DictionaryRecord::UserRecordDict => {
                let id = r.u8()?;
                let name = r.cstr()?;
                self.dict
                    .set(DictKind::UserRecord, DictKey::Record(id), name.clone());
                format!("0x{id:X} -> {name}")
            }
            DictionaryRecord::EnumDict => {
                let group = r.u8()?;
                let value = r.u8()?;
                let name = r.cstr()?;
                self.dict.set(
                    DictKind::EnumGroup(group),
                    DictKey::EnumValue(value),
                    name.clone(),
                );
                format!("{group}:{value} -> {name}")
            }
            DictionaryRecord::DictReset => {
                self.dict.reset();
                "reset".to_string()
            }
        };

        Ok(Interpreted {
            line: DecodedLine::new(
                LineKind::Inf,
                format!("{ts_text} {}{detail}", Self::fmt_name(rec.name())),
            ),
            matlab_row: Some(vec![ts, ty as u64]),
            sequence_line: None,
        })
    }

    // ---- State-machine records (group 3) ----

    fn decode_state_machine(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = StateMachineRecord::from_id(ty).expect("classified as StateMachine");
        let mut r = self.reader(payload);

        let ts = r.width(self.config.timestamp_size)?;
        let ts_text = self.fmt_ts(ts);
        let obj = r.width(self.config.obj_ptr_size)?;
        let obj_text = self.render_ptr(DictKind::Object, DictKey::Ptr(obj), obj, self.config.obj_ptr_size);

        let (state_text, sig) = match rec {
            StateMachineRecord::Dispatch | StateMachineRecord::InternalTransition => {
                let src = r.width(self.config.fun_ptr_size)?;
                let dst = r.width(self.config.fun_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                let src_text =
                    self.render_ptr(DictKind::Function, DictKey::Ptr(src), src, self.config.fun_ptr_size);
                let dst_text =
                    self.render_ptr(DictKind::Function, DictKey::Ptr(dst), dst, self.config.fun_ptr_size);
                (format!("{src_text}->{dst_text}"), Some(sig))
            }
            _ => {
                let state = r.width(self.config.fun_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                let state_text = self.render_ptr(
                    DictKind::Function,
                    DictKey::Ptr(state),
                    state,
                    self.config.fun_ptr_size,
                );
                (state_text, Some(sig))
            }
        };

        let sig_text = sig.map(|s| self.render_signal(s, obj)).unwrap_or_default();
        let text = format!(
            "{ts_text} {}{obj_text} {state_text} {sig_text}",
            Self::fmt_name(rec.name())
        );

        let sequence_line = self.sequence_line_for(obj, ts, &format!("{obj_text} : {state_text}"));

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Reg, text),
            matlab_row: Some(vec![ts, ty as u64, obj, sig.unwrap_or(0) as u64]),
            sequence_line,
        })
    }

    // ---- Active-object records (group 4) ----

    fn decode_active_object(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = ActiveObjectRecord::from_id(ty).expect("classified as ActiveObject");
        let mut r = self.reader(payload);

        let ts = r.width(self.config.timestamp_size)?;
        let ts_text = self.fmt_ts(ts);

        let (sender, receiver, sig, extra) = match rec {
            ActiveObjectRecord::Subscribe | ActiveObjectRecord::Unsubscribe => {
                let obj = r.width(self.config.obj_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                (obj, obj, sig, String::new())
            }
            ActiveObjectRecord::Get | ActiveObjectRecord::GetLast => {
                let obj = r.width(self.config.obj_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                let queue_ctr = r.width(self.config.queue_ctr_size)?;
                (obj, obj, sig, format!(" queue={queue_ctr}"))
            }
            ActiveObjectRecord::Publish => {
                let sender = r.width(self.config.obj_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                (sender, sender, sig, String::new())
            }
            ActiveObjectRecord::PostFifo | ActiveObjectRecord::PostLifo => {
                let sender = r.width(self.config.obj_ptr_size)?;
                let receiver = r.width(self.config.obj_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                let queue_ctr = r.width(self.config.queue_ctr_size)?;
                let margin = r.width(self.config.queue_ctr_size)?;
                (sender, receiver, sig, format!(" queue={queue_ctr} margin={margin}"))
            }
            ActiveObjectRecord::AttemptQueue | ActiveObjectRecord::AttemptPost => {
                let sender = r.width(self.config.obj_ptr_size)?;
                let receiver = r.width(self.config.obj_ptr_size)?;
                let sig = r.width(self.config.sig_size)? as u16;
                let margin = r.width(self.config.queue_ctr_size)?;
                (sender, receiver, sig, format!(" margin={margin}"))
            }
        };

        let sender_text =
            self.render_ptr(DictKind::Object, DictKey::Ptr(sender), sender, self.config.obj_ptr_size);
        let receiver_text = self.render_ptr(
            DictKind::Object,
            DictKey::Ptr(receiver),
            receiver,
            self.config.obj_ptr_size,
        );
        let sig_text = self.render_signal(sig, receiver);

        let text = format!(
            "{ts_text} {}{sender_text} -> {receiver_text} {sig_text}{extra}",
            Self::fmt_name(rec.name())
        );

        let sequence_line = self.sequence_line_for(
            sender,
            ts,
            &format!("{sender_text} -> {receiver_text} : {sig_text}"),
        );

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Reg, text),
            matlab_row: Some(vec![ts, ty as u64, sender, receiver, sig as u64]),
            sequence_line,
        })
    }

    // ---- Time-event records (group 5) ----

    fn decode_time_event(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = TimeEventRecord::from_id(ty).expect("classified as TimeEvent");
        let mut r = self.reader(payload);

        let ts = r.width(self.config.timestamp_size)?;
        let ts_text = self.fmt_ts(ts);
        let timer = r.width(self.config.obj_ptr_size)?;
        let obj = r.width(self.config.obj_ptr_size)?;
        let sig = r.width(self.config.sig_size)? as u16;

        let extra = match rec {
            TimeEventRecord::Arm | TimeEventRecord::Rearm => {
                let rate = r.u8()?;
                let interval = r.width(self.config.tevt_ctr_size)?;
                format!(" rate={rate} interval={interval}")
            }
            _ => String::new(),
        };

        let timer_text =
            self.render_ptr(DictKind::Object, DictKey::Ptr(timer), timer, self.config.obj_ptr_size);
        let obj_text =
            self.render_ptr(DictKind::Object, DictKey::Ptr(obj), obj, self.config.obj_ptr_size);
        let sig_text = self.render_signal(sig, obj);

        let text = format!(
            "{ts_text} {}{timer_text} {obj_text} {sig_text}{extra}",
            Self::fmt_name(rec.name())
        );

        let sequence_line =
            self.sequence_line_for(obj, ts, &format!("{timer_text} -> {obj_text} : {sig_text}"));

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Reg, text),
            matlab_row: Some(vec![ts, ty as u64, timer, obj, sig as u64]),
            sequence_line,
        })
    }

    // ---- Memory-pool records (group 6) ----

    fn decode_memory_pool(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = MemoryPoolRecord::from_id(ty).expect("classified as MemoryPool");
        let mut r = self.reader(payload);

        let ts = r.width(self.config.timestamp_size)?;
        let ts_text = self.fmt_ts(ts);
        let pool = r.width(self.config.obj_ptr_size)?;
        let free = r.width(self.config.pool_ctr_size)?;

        let extra = match rec {
            MemoryPoolRecord::Put => String::new(),
            _ => {
                let min_free = r.width(self.config.pool_ctr_size)?;
                let blk_size = r.width(self.config.pool_blk_size)?;
                format!(" min_free={min_free} blk_size={blk_size}")
            }
        };

        let pool_text =
            self.render_ptr(DictKind::Object, DictKey::Ptr(pool), pool, self.config.obj_ptr_size);
        let text = format!(
            "{ts_text} {}{pool_text} free={free}{extra}",
            Self::fmt_name(rec.name())
        );

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Reg, text),
            matlab_row: Some(vec![ts, ty as u64, pool, free]),
            sequence_line: None,
        })
    }

    // ---- Mutex/scheduler records (group 7) ----

    fn decode_scheduler(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let rec = SchedulerRecord::from_id(ty).expect("classified as Scheduler");
        let mut r = self.reader(payload);

        let ts = r.width(self.config.timestamp_size)?;
        let ts_text = self.fmt_ts(ts);

        let (detail, nums) = match rec {
            SchedulerRecord::Lock | SchedulerRecord::Unlock => {
                let ceiling = r.u8()?;
                (format!("ceiling={ceiling}"), vec![ceiling as u64])
            }
            SchedulerRecord::ContextSwitch => {
                let prev = r.width(self.config.obj_ptr_size)?;
                let next = r.width(self.config.obj_ptr_size)?;
                let prev_text =
                    self.render_ptr(DictKind::Object, DictKey::Ptr(prev), prev, self.config.obj_ptr_size);
                let next_text =
                    self.render_ptr(DictKind::Object, DictKey::Ptr(next), next, self.config.obj_ptr_size);
                (format!("{prev_text} -> {next_text}"), vec![prev, next])
            }
            SchedulerRecord::Yield => {
                let obj = r.width(self.config.obj_ptr_size)?;
                let obj_text =
                    self.render_ptr(DictKind::Object, DictKey::Ptr(obj), obj, self.config.obj_ptr_size);
                (obj_text, vec![obj])
            }
            SchedulerRecord::Idle => (String::new(), vec![]),
            SchedulerRecord::IsrEnter | SchedulerRecord::IsrExit => {
                let nest = r.u8()?;
                let prio = r.u8()?;
                (format!("nest={nest} prio={prio}"), vec![nest as u64, prio as u64])
            }
        };

        let text = format!("{ts_text} {}{detail}", Self::fmt_name(rec.name()));
        let mut row = vec![ts, ty as u64];
        row.extend(nums);

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Reg, text),
            matlab_row: Some(row),
            sequence_line: None,
        })
    }

    // ---- User records (group 8) ----

    fn decode_user(&mut self, ty: u8, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let mut r = self.reader(payload);
        let ts = r.width(self.config.timestamp_size)?;
        let ts_text = self.fmt_ts(ts);

        let rest = &payload[payload.len() - r.remaining()..];
        let name = self
            .dict
            .lookup(DictKind::UserRecord, DictKey::Record(ty))
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("USR_{ty}"));

        let hex: Vec<String> = rest.iter().map(|b| format!("{b:02X}")).collect();
        let text = format!(
            "{ts_text} {}{}",
            Self::fmt_name(&name),
            hex.join(" ")
        );

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Usr, text),
            matlab_row: Some(vec![ts, ty as u64]),
            sequence_line: None,
        })
    }

    // ---- Assertion record (group 9) ----

    fn decode_assertion(&mut self, payload: &[u8]) -> Result<Interpreted, SpyError> {
        let mut r = self.reader(payload);
        let module = r.cstr()?;
        let line = r.u32()?;
        let ts = self.last_target_time;
        let ts_text = self.fmt_ts(ts);
        let wall = humantime_utc_now();

        let text = format!(
            "{ts_text} {}{module}:{line} at {wall}",
            Self::fmt_name("ASSERT")
        );

        warn!("target assertion failed: {module}:{line}");

        Ok(Interpreted {
            line: DecodedLine::new(LineKind::Err, text),
            matlab_row: Some(vec![ts, ASSERTION_RECORD_ID as u64, line as u64]),
            sequence_line: None,
        })
    }

    fn sequence_line_for(&self, obj: u64, ts: u64, body: &str) -> Option<String> {
        if self.seq_list.contains(&obj) {
            Some(format!("{ts} {body}"))
        } else {
            None
        }
    }
}

fn humantime_utc_now() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}s since epoch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endianness;

    fn test_config() -> Config {
        Config {
            protocol_version: 660,
            endianness: Endianness::Little,
            timestamp_size: Width::W4,
            obj_ptr_size: Width::W4,
            fun_ptr_size: Width::W4,
            sig_size: Width::W2,
            evt_size: Width::W1,
            queue_ctr_size: Width::W1,
            pool_ctr_size: Width::W1,
            pool_blk_size: Width::W2,
            tevt_ctr_size: Width::W2,
        }
    }

    #[test]
    fn decodes_state_entry_with_known_dictionary() {
        let mut dict = Dictionaries::new();
        dict.set(DictKind::Object, DictKey::Ptr(0xDEADBEEF), "AO_Blinky");
        dict.set(
            DictKind::Signal,
            DictKey::Signal(10, 0xDEADBEEF),
            "TIMEOUT_SIG",
        );

        let mut interp = Interpreter::new(test_config(), dict);

        // type=0x26(38) happens to not be our Entry id; use the real one.
        let ty = StateMachineRecord::Entry.id();
        let mut payload = vec![ty, 0x00]; // type, seq
        payload.extend_from_slice(&100u32.to_le_bytes()); // ts
        payload.extend_from_slice(&0xDEADBEEFu32.to_le_bytes()); // obj
        payload.extend_from_slice(&0xDEAD_0000u32.to_le_bytes()); // state ptr (unknown)
        payload.extend_from_slice(&10u16.to_le_bytes()); // sig

        let (warn, out) = interp.process(&payload).unwrap();
        assert!(warn.is_none());
        assert!(out.line.text.contains("AO_Blinky"));
        assert!(out.line.text.contains("TIMEOUT_SIG"));
        assert!(out.line.text.contains("100"));
    }

    #[test]
    fn unknown_pointer_renders_hex() {
        let dict = Dictionaries::new();
        let mut interp = Interpreter::new(test_config(), dict);

        let ty = StateMachineRecord::Entry.id();
        let mut payload = vec![ty, 0x00];
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&0x1234u32.to_le_bytes());
        payload.extend_from_slice(&0x5678u32.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());

        let (_, out) = interp.process(&payload).unwrap();
        assert!(out.line.text.contains("0x00001234"));
    }

    #[test]
    fn sequence_gap_of_one_is_silent() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = SchedulerRecord::Idle.id();

        let mut frame0 = vec![ty, 0];
        frame0.extend_from_slice(&1u32.to_le_bytes());
        let (warn0, _) = interp.process(&frame0).unwrap();
        assert!(warn0.is_none());

        let mut frame1 = vec![ty, 1];
        frame1.extend_from_slice(&2u32.to_le_bytes());
        let (warn1, _) = interp.process(&frame1).unwrap();
        assert!(warn1.is_none());
    }

    #[test]
    fn sequence_gap_over_one_warns_with_loss_count() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = SchedulerRecord::Idle.id();

        let mut frame0 = vec![ty, 0];
        frame0.extend_from_slice(&1u32.to_le_bytes());
        interp.process(&frame0).unwrap();

        // Jump straight to seq=4: expected was 1, so 3 records (1,2,3) lost.
        let mut frame1 = vec![ty, 4];
        frame1.extend_from_slice(&2u32.to_le_bytes());
        let (warn, _) = interp.process(&frame1).unwrap();
        assert_eq!(warn.unwrap().text, "Records lost: 3");
        assert_eq!(interp.records_lost(), 3);
    }

    #[test]
    fn dictionary_record_updates_dictionaries() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = DictionaryRecord::ObjectDict.id();

        let mut payload = vec![ty, 0];
        payload.extend_from_slice(&0xABCDu32.to_le_bytes());
        payload.extend_from_slice(b"AO_Thing\0");

        interp.process(&payload).unwrap();
        assert_eq!(
            interp
                .dictionaries()
                .lookup(DictKind::Object, DictKey::Ptr(0xABCD)),
            Some("AO_Thing")
        );
    }

    #[test]
    fn reset_record_clears_dictionaries() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        interp
            .dictionaries_mut()
            .set(DictKind::Object, DictKey::Ptr(1), "x");

        let ty = SessionRecord::Reset.id();
        let payload = vec![ty, 0];
        interp.process(&payload).unwrap();

        assert_eq!(
            interp.dictionaries().lookup(DictKind::Object, DictKey::Ptr(1)),
            None
        );
    }

    #[test]
    fn target_info_adopts_valid_widths() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = SessionRecord::TargetInfo.id();
        let payload = vec![ty, 0, 2, 8, 2, 1];

        let (_, out) = interp.process(&payload).unwrap();
        assert_eq!(interp.config().timestamp_size, Width::W2);
        assert_eq!(interp.config().obj_ptr_size, Width::W8);
        assert_eq!(interp.config().fun_ptr_size, Width::W2);
        assert_eq!(interp.config().sig_size, Width::W1);
        assert!(out.line.text.contains("ts=2"));
    }

    #[test]
    fn target_info_rejects_out_of_domain_pointer_width() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = SessionRecord::TargetInfo.id();
        // obj_ptr_size=1 is outside the pointer fields' {2,4,8} domain.
        let payload = vec![ty, 0, 4, 1, 4, 2];

        assert!(interp.process(&payload).is_err());
    }

    #[test]
    fn target_info_rejects_out_of_domain_timestamp_width() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = SessionRecord::TargetInfo.id();
        // timestamp_size=8 is outside the non-pointer fields' {1,2,4} domain.
        let payload = vec![ty, 0, 8, 4, 4, 2];

        assert!(interp.process(&payload).is_err());
    }

    #[test]
    fn assertion_record_is_always_err() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        let ty = ASSERTION_RECORD_ID;

        let mut payload = vec![ty, 0];
        payload.extend_from_slice(b"bsp.c\0");
        payload.extend_from_slice(&42u32.to_le_bytes());

        let (_, out) = interp.process(&payload).unwrap();
        assert_eq!(out.line.kind, LineKind::Err);
        assert!(out.line.text.contains("bsp.c:42"));
    }

    #[test]
    fn sequence_sink_only_emits_for_listed_objects() {
        let mut interp = Interpreter::new(test_config(), Dictionaries::new());
        interp.set_seq_list([0xDEADBEEFu64]);

        let ty = StateMachineRecord::Entry.id();
        let mut payload = vec![ty, 0];
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());

        let (_, out) = interp.process(&payload).unwrap();
        assert!(out.sequence_line.is_some());

        let mut payload2 = vec![ty, 1];
        payload2.extend_from_slice(&1u32.to_le_bytes());
        payload2.extend_from_slice(&0x1111u32.to_le_bytes());
        payload2.extend_from_slice(&1u32.to_le_bytes());
        payload2.extend_from_slice(&1u16.to_le_bytes());

        let (_, out2) = interp.process(&payload2).unwrap();
        assert!(out2.sequence_line.is_none());
    }
}
