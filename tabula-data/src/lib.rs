pub mod condition;
pub mod descriptor;
pub mod params;
pub mod parse;
pub mod sql;
pub mod store;
pub mod value;

pub use condition::{Arity, Condition, ConditionValue, Operator};
pub use descriptor::{DescriptorBuilder, FieldDescriptor, Record, RecordDescriptor};
pub use params::{OutputFormat, SelectParams, TotalCount};
pub use sql::{BuiltSelect, TableSource};
pub use store::{ArchiveStore, BulkStore, MutateStore, SelectStore};
pub use value::{LogicalType, PkValue, SqlValue};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        LogicalType, Record, RecordDescriptor, SelectParams, SelectStore, TableSource,
    };
}
