mod connection;
mod pool;
pub mod queries;
pub mod reader;
mod tables;
pub mod writer;

pub use queries::Error;
pub use reader::Reader;
pub use writer::Writer;
