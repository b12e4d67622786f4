pub mod contract;
pub mod contract_item;
pub mod injection;
pub mod order;
pub mod period;

pub use period::PeriodStatus;
