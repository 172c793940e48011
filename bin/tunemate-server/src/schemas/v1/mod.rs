pub mod conversations;
pub mod events;
pub mod matches;
pub mod profiles;
