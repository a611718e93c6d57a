pub mod encoding;
pub mod fields;
pub mod table;

pub use encoding::decode_bytes;
pub use fields::{parse_amount, parse_date};
pub use table::{parse_table, read_table};
