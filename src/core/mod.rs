pub mod error;
pub mod types;
pub mod value;

pub use error::{CollectionError, Result};
pub use types::{CollectionId, CollectionRow, SessionId, collection_info_string};
pub use value::{CollectionElement, Value};
