pub mod messages;
pub use messages::*;

pub mod documents;
pub use documents::*;

pub mod response;
pub use response::*;

pub mod tools;
pub use tools::*;

mod retrievers;
pub use retrievers::*;
