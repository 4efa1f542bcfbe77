mod memory;
mod raw;

pub use self::{
    memory::MemoryEventLog,
    raw::{EventLog, EventLogError, EventLogFactory, LogConsumer},
};
