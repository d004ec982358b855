pub mod actor;
pub mod events;
pub mod messages;
pub mod resource;

pub use actor::*;
pub use events::*;
pub use messages::*;
pub use resource::*;
