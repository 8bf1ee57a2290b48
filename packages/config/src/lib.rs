// ABOUTME: Configuration and environment variable management for Agentdeck
// ABOUTME: Centralized definitions shared by the server binary and domain packages

pub mod constants;
