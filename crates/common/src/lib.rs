mod types;

pub use types::{EntityId, ParseEntityIdError};
