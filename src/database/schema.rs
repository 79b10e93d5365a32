// Database schema definitions and migrations
// Applied in order at startup; every statement is idempotent.

pub const INITIAL_SCHEMA: &str = include_str!("../../migrations/001_initial_schema.sql");

pub const MIGRATIONS: &[(&str, &str)] = &[("001_initial_schema", INITIAL_SCHEMA)];
