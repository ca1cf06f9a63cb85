//! Global defaults for the application.

pub const HTTP_PORT: u16 = 8080; // Default HTTP port.
pub const DB_PATH: &str = "./data/clinic.json"; // Record store file.
pub const OUTBOX_PATH: &str = "./data/outbox.yaml"; // Simulated mail outbox.

pub const SENDER_ADDRESS: &str = "from@example.com";

/// Session key holding the authenticated user's id.
pub const SESSION_USER_KEY: &str = "user_id";
