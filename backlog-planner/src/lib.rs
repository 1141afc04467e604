// Issue/task planning pipeline
pub mod planner;

// SQLite persistence sink
pub mod database;

// Reasoning backend
pub mod reasoning;

// Repository checkout
pub mod repository;

// Bounded background queue for plan requests
pub mod queue;
