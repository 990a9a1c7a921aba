//! The record-type catalogue: which group a record-type byte belongs to,
//! and the fixed-width name printed in every trace line.
//!
//! Exact numeric ids are this implementation's own compatibility contract
//! with an emitting target; no particular target toolchain is assumed.
//! Ids are assigned in contiguous per-group ranges so a new record can be
//! added to a group without renumbering its neighbors.

/// Which of the nine record groups a record-type byte belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordGroup {
    /// Session lifecycle: empty, reset, version-announce, target-info,
    /// target-done.
    Session,
    /// Dictionary records: object/function/signal/user-record/enum.
    Dictionary,
    /// State-machine trace records.
    StateMachine,
    /// Active-object records.
    ActiveObject,
    /// Time-event records.
    TimeEvent,
    /// Memory-pool records.
    MemoryPool,
    /// Mutex/scheduler records.
    Scheduler,
    /// Application-defined user records.
    User,
    /// The assertion-failure record.
    Assertion,
    /// Not a recognized record-type byte.
    Unknown,
}

macro_rules! record_ids {
    ($name:ident { $($variant:ident = $val:expr => $text:expr),+ $(,)? }) => {
        #[allow(missing_docs)]
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant = $val),+
        }

        impl $name {
            /// The raw record-type byte.
            pub fn id(self) -> u8 {
                self as u8
            }

            /// The fixed-width name printed in the record-name column.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Recovers a variant from a raw record-type byte.
            pub fn from_id(id: u8) -> Option<Self> {
                match id {
                    $($val => Some(Self::$variant)),+,
                    _ => None,
                }
            }
        }
    };
}

record_ids!(SessionRecord {
    Empty = 0 => "EMPTY",
    Reset = 1 => "RESET",
    VersionAnnounce = 2 => "VERSION",
    TargetInfo = 3 => "TARGET_INFO",
    TargetDone = 4 => "TARGET_DONE",
});

record_ids!(DictionaryRecord {
    ObjectDict = 10 => "OBJ_DICT",
    FunctionDict = 11 => "FUN_DICT",
    SignalDict = 12 => "SIG_DICT",
    UserRecordDict = 13 => "USR_DICT",
    EnumDict = 14 => "ENUM_DICT",
    DictReset = 15 => "DICT_RESET",
});

record_ids!(StateMachineRecord {
    Entry = 20 => "SM_ENTRY",
    Exit = 21 => "SM_EXIT",
    Init = 22 => "SM_INIT",
    Dispatch = 23 => "SM_DISPATCH",
    InternalTransition = 24 => "SM_INTERN",
    Ignored = 25 => "SM_IGNORED",
    Unhandled = 26 => "SM_UNHANDLED",
    TopMost = 27 => "SM_TOP",
});

record_ids!(ActiveObjectRecord {
    Subscribe = 40 => "AO_SUB",
    Unsubscribe = 41 => "AO_UNSUB",
    PostFifo = 42 => "AO_POST_FIFO",
    PostLifo = 43 => "AO_POST_LIFO",
    Get = 44 => "AO_GET",
    GetLast = 45 => "AO_GET_LAST",
    Publish = 46 => "AO_PUBLISH",
    AttemptQueue = 47 => "AO_ATT_QUEUE",
    AttemptPost = 48 => "AO_ATT_POST",
});

record_ids!(TimeEventRecord {
    Arm = 60 => "TE_ARM",
    Disarm = 61 => "TE_DISARM",
    AutoDisarm = 62 => "TE_AUTO_DISARM",
    Post = 63 => "TE_POST",
    Rearm = 64 => "TE_REARM",
});

record_ids!(MemoryPoolRecord {
    Get = 70 => "MP_GET",
    Put = 71 => "MP_PUT",
    GetAttempt = 72 => "MP_GET_ATT",
});

record_ids!(SchedulerRecord {
    Lock = 80 => "SCHED_LOCK",
    Unlock = 81 => "SCHED_UNLOCK",
    ContextSwitch = 82 => "SCHED_SWITCH",
    Yield = 83 => "SCHED_YIELD",
    Idle = 84 => "SCHED_IDLE",
    IsrEnter = 85 => "SCHED_ISR_IN",
    IsrExit = 86 => "SCHED_ISR_OUT",
});

/// The inclusive range of record-type ids reserved for application use.
pub const USER_RECORD_RANGE: std::ops::RangeInclusive<u8> = 100..=199;

/// The assertion-failure record-type id.
pub const ASSERTION_RECORD_ID: u8 = 200;

/// Classifies a raw record-type byte into its group.
pub fn classify(id: u8) -> RecordGroup {
    if SessionRecord::from_id(id).is_some() {
        RecordGroup::Session
    } else if DictionaryRecord::from_id(id).is_some() {
        RecordGroup::Dictionary
    } else if StateMachineRecord::from_id(id).is_some() {
        RecordGroup::StateMachine
    } else if ActiveObjectRecord::from_id(id).is_some() {
        RecordGroup::ActiveObject
    } else if TimeEventRecord::from_id(id).is_some() {
        RecordGroup::TimeEvent
    } else if MemoryPoolRecord::from_id(id).is_some() {
        RecordGroup::MemoryPool
    } else if SchedulerRecord::from_id(id).is_some() {
        RecordGroup::Scheduler
    } else if USER_RECORD_RANGE.contains(&id) {
        RecordGroup::User
    } else if id == ASSERTION_RECORD_ID {
        RecordGroup::Assertion
    } else {
        RecordGroup::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_groups() {
        assert_eq!(classify(SessionRecord::Reset.id()), RecordGroup::Session);
        assert_eq!(
            classify(DictionaryRecord::ObjectDict.id()),
            RecordGroup::Dictionary
        );
        assert_eq!(
            classify(StateMachineRecord::Entry.id()),
            RecordGroup::StateMachine
        );
        assert_eq!(
            classify(ActiveObjectRecord::PostFifo.id()),
            RecordGroup::ActiveObject
        );
        assert_eq!(classify(TimeEventRecord::Arm.id()), RecordGroup::TimeEvent);
        assert_eq!(classify(MemoryPoolRecord::Get.id()), RecordGroup::MemoryPool);
        assert_eq!(classify(SchedulerRecord::Lock.id()), RecordGroup::Scheduler);
        assert_eq!(classify(150), RecordGroup::User);
        assert_eq!(classify(ASSERTION_RECORD_ID), RecordGroup::Assertion);
        assert_eq!(classify(255), RecordGroup::Unknown);
    }

    #[test]
    fn name_round_trips_id() {
        assert_eq!(StateMachineRecord::from_id(20).unwrap().name(), "SM_ENTRY");
    }
}
