// Incident, agent and status types
pub mod agent;
pub mod incident;

// Persistence
pub mod store;

// Response-time and efficiency scoring
pub mod scoring;

// Agent selection, assignment and resolution
pub mod dispatch;

// Decision narratives from a chat-completions service
pub mod narrative;

// Address search
pub mod geocode;

// Aggregate statistics
pub mod stats;

// Configuration
pub mod config;

// HTTP API
pub mod api;
