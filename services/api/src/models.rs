//! Domain models shared by the stores, the lifecycle service and the routes

pub mod activity;
pub mod identity;
pub mod user;

pub use activity::{ActivityAction, ActivityEntry, NewActivity};
pub use identity::{Actor, Identity, IdentityView};
pub use user::{
    LoginSummary, NewUser, PublicUser, SearchHit, User, UserChanges, UserStatus, UserType,
};
