pub mod collection;
pub mod order;
pub mod quote;
