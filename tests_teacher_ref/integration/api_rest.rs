//! Integration tests for REST API endpoints
