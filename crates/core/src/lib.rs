pub mod config;
pub mod corpus;
pub mod envelope;
pub mod error;
pub mod item;

pub use config::{load_dotenv, BenchConfig};
pub use corpus::Corpus;
pub use envelope::Envelope;
pub use error::CoreError;
pub use item::{Item, Lease, OutstandingCounter};
