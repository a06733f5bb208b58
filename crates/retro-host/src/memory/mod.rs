//! Memory-map reconstruction: from the descriptors a core declares to the
//! banks an external consumer reads and writes.

pub mod banks;
pub mod bits;
pub mod descriptor;
pub mod publish;
pub mod regions;
pub mod tracker;

pub use banks::{build_banks, signature, Bank, Signature, MAX_BANKS};
pub use descriptor::{canonicalize, canonicalize_all, top_address, DescriptorError, MemoryDescriptor};
pub use publish::{BankAccessor, BankReadFn, BankWriteFn, InstalledBank, LoggingConsumer, MemoryConsumer};
pub use regions::{regions_from_map, Region};
pub use tracker::{MemorySource, MemoryTracker, SNAPSHOT_INTERVAL};
