pub mod errors;
pub mod events;
pub mod id;
pub mod view_state;

pub use errors::{ConfigError, TraqError};
pub use events::{Event, EventBus, Subscription, Topic};
pub use id::{new_id, ViewerKey};
pub use view_state::ViewState;

pub type Result<T> = std::result::Result<T, TraqError>;
