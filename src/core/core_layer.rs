// The core module contains all business logic.
// It knows nothing about HTTP; collaborators are traits implemented in infra.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "organizer/mod.rs"]
pub mod organizer;
