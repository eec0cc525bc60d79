//! Postgres row types, queries and migrations backing the fieldsync stores.

pub mod checkpoints;
pub mod db;
pub mod entities;
pub mod migrations;
pub mod staging;
pub mod warehouse;
