//! Property-based tests for the tableau engine.

mod factorization_properties;
mod tableau_properties;
