pub mod frequency;
pub mod observation;
pub mod period;
pub mod records;
