use thiserror::Error;

use crate::record::RecordId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("heap discipline must be `min` or `max`, got `{0}`")]
    InvalidDiscipline(String),

    #[error("record {0:?} is already attached to a container")]
    AlreadyAttached(RecordId),

    #[error("record {0:?} is attached; its order can not be changed")]
    OrderLocked(RecordId),

    #[error("order must be a number, got NaN")]
    InvalidOrder,

    #[error("integer key {0} does not fit in an i64")]
    IntegerOutOfRange(i128),

    #[error("record {0:?} does not exist in this arena")]
    UnknownRecord(RecordId),
}
