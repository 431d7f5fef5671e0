/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

pub mod predicate;
pub mod record;
pub mod schema;

pub use predicate::{CompareOp, Predicate};
pub use schema::{Field, FieldType, Relation};
