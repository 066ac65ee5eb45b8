//! Backend-agnostic core of the docquery project.
//!
//! This crate provides:
//!
//! - **Document traits** ([`document`]) - Core traits for defining and serializing documents
//! - **Store backend abstraction** ([`backend`]) - The trait every storage backend implements
//! - **Filters and queries** ([`query`]) - Filter expressions, sort keys and `find` queries
//! - **Projections** ([`projection`]) - Field inclusion, exclusion and computed fields
//! - **Aggregation expressions** ([`expression`]) - `$concat`, `$substr` and friends
//! - **Aggregation pipelines** ([`pipeline`]) - `$match`, `$group`, `$sort`, `$skip`, `$limit`, `$project`
//! - **Updates** ([`update`]) - `$set`, `$unset` and `$inc`
//! - **Indexes** ([`index`]) - Index definitions and query explanations
//! - **Collections interface** ([`collection`]) - Handles for working with one collection
//! - **Document store** ([`store`]) - Main entry point owning a backend
//! - **Error handling** ([`error`]) - Error and result types
//! - **Pagination** ([`page`]) - Page results and pagination parameters
//!
//! Every query-language construct can either be built with typed constructors or
//! parsed from its BSON document form; parsing rejects malformed input before any
//! document is evaluated.

#[allow(unused_extern_crates)]
extern crate self as docquery_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod expression;
pub mod index;
pub mod page;
pub mod pipeline;
pub mod projection;
pub mod query;
pub mod store;
pub mod update;
