pub mod action_id;
pub mod action_status;
pub mod action_type;
pub mod geo_point;
pub mod payload;
pub mod school_id;
pub mod session_id;
pub mod user_id;

pub use action_id::ActionId;
pub use action_status::ActionStatus;
pub use action_type::ActionType;
pub use geo_point::GeoPoint;
pub use payload::ActionPayload;
pub use school_id::SchoolId;
pub use session_id::SessionId;
pub use user_id::UserId;
