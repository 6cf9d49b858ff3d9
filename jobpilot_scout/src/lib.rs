//! # jobpilot_scout
//!
//! Finds job listings on LinkedIn, Indeed and SimplyHired and hands them to
//! the jobpilot orchestrator as [`jobpilot::JobRecord`]s.
//!
//! ```rust,ignore
//! use jobpilot_scout::{Platform, Scout, ScoutConfig, ScoutContext};
//!
//! let scout = Scout::new(
//!     ScoutConfig::default()
//!         .with_keywords(["rust engineer"])
//!         .with_platforms(vec![Platform::Linkedin, Platform::Indeed]),
//! )?;
//! let mut ctx = ScoutContext::new();
//! let jobs = scout.discover(&mut ctx).await?;
//! ```

#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod fetch;
mod parse;
mod scout;
mod search;

pub use config::{ExperienceLevel, JobType, Platform, PostedWithin, ScoutConfig};
pub use context::ScoutContext;
pub use error::ScoutError;
pub use fetch::{HttpFetcher, PageFetcher};
pub use parse::{CardParser, ListingCard};
pub use scout::Scout;
pub use search::{canonical_url, indeed_job_url, plan, search_url, SearchPage};
