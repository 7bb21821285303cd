mod order_number;

pub use order_number::{new_order_id, new_order_number};
