// src/catalog/mod.rs

//! Task model: courses, chapters, tasks and their predicates.
//!
//! Catalogs are read from TOML ([`loader`]), converted and checked
//! ([`validate`]) and then treated as immutable. Task `order` is assigned
//! from chapter nesting order and is contiguous from 1 within a course.

pub mod loader;
pub mod model;
pub mod validate;

pub use model::{
    Catalog, CatalogConfig, Chapter, ConfigSection, Course, Perk, RawCatalogFile, RawChapter,
    RawCourse, RawTask, Resource, SandboxSection, Task, TaskContext,
};
