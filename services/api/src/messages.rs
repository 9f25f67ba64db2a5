//! Response messages returned to API clients

pub const WELCOME: &str = "You're successfully connected to the Hospital Management System (API)";

pub const USER_REGISTERED: &str = "User registered successfully";
pub const LOGIN: &str = "Login successful";
pub const UPDATE: &str = "Update successful";
pub const DELETE: &str = "Delete successful";
pub const LOGOUT: &str = "Logout successful, token cleared.";

pub const REQUIRED_FIELDS: &str = "Both email and password are required.";
pub const INVALID_EMAIL: &str = "Invalid email format";
pub const INVALID_ID: &str = "Invalid user ID";
pub const ROUTE_NOT_FOUND: &str = "Not found";
pub const UNEXPECTED: &str = "An unexpected error occurred. Please try again later.";

pub const NO_USERS_TO_DEACTIVATE: &str = "No users to deactivate";
pub const NO_USERS_TO_ARCHIVE: &str = "No users to archive";
